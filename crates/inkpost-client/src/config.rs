//! Client configuration.

/// Default backend API base URL, matching a local development backend.
pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";

/// Gateway client configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Backend API base URL, including the `/api` prefix.
    pub base_url: String,
}

impl ApiConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let base_url =
            std::env::var("INKPOST_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Self { base_url }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_URL.to_string(),
        }
    }
}
