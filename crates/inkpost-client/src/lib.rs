//! Inkpost client library
//!
//! Client-side core of the Inkpost blogging platform. Two pieces matter:
//!
//! - **Session manager**: owns the locally persisted bearer token and user
//!   record and decides, before every authenticated call, whether the
//!   session is still valid.
//! - **API gateway client**: wraps every REST operation the backend
//!   exposes, attaches the credential when present, and normalizes each
//!   failure mode into a single error type so callers branch on a result
//!   instead of catching anything.
//!
//! The backend owns authentication, persistence and token signatures; this
//! crate only inspects the expiry embedded in the token and keeps the
//! stored credential pair consistent with what it observes.
//!
//! ## Modules
//!
//! - [`config`]: API endpoint configuration from environment variables
//! - [`session`]: token expiry inspection and the stored credential pair
//! - [`client`]: one async method per backend operation
//! - [`types`]: wire payloads and the derived auth status
//! - [`error`]: the error taxonomy callers branch on
//!
//! ## Example
//!
//! ```ignore
//! use inkpost_client::session::store::FileStore;
//! use inkpost_client::{ApiClient, ApiConfig, SessionManager};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = FileStore::default_location()?;
//!     let session = SessionManager::new(Box::new(store));
//!     let client = ApiClient::new(ApiConfig::from_env(), session);
//!     let posts = client.list_blogs(&Default::default()).await?;
//!     println!("{}", serde_json::to_string_pretty(&posts)?);
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod session;
pub mod types;

pub use client::ApiClient;
pub use config::ApiConfig;
pub use error::ApiError;
pub use session::{is_token_expired, SessionManager};
pub use types::{AuthStatus, UserRecord};
