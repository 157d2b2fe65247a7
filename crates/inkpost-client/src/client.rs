//! API gateway client for the Inkpost backend.
//!
//! One async method per REST operation. Each method validates required
//! fields before any network call, attaches the bearer credential when one
//! is stored and still live, and normalizes every failure mode into
//! [`ApiError`]. Success returns the parsed response body verbatim; the
//! shape is operation-specific and opaque to this layer.
//!
//! No retries and no client-side timeouts: every failure is surfaced once
//! as a result value and the caller decides whether to re-invoke.

use reqwest::{RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::session::{is_token_expired, SessionManager};
use crate::types::{
    AdminCreateRequest, BlogPayload, ContactRequest, ListQuery, LoginRequest, ProfileUpdate,
    RegisterRequest, UserRecord,
};

/// Maximum accepted upload size (5 MiB), enforced before any request.
pub const MAX_UPLOAD_BYTES: u64 = 5 * 1024 * 1024;

type UnauthorizedHandler = Arc<dyn Fn() + Send + Sync>;

/// HTTP client for the Inkpost REST API.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    session: SessionManager,
    on_unauthorized: Option<UnauthorizedHandler>,
}

impl ApiClient {
    pub fn new(config: ApiConfig, session: SessionManager) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            session,
            on_unauthorized: None,
        }
    }

    /// The session manager backing this client.
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    /// Register a handler invoked when the backend answers 401. The
    /// presentation layer decides what "go to login" means; the client
    /// only raises the signal.
    pub fn on_unauthorized(&mut self, handler: impl Fn() + Send + Sync + 'static) {
        self.on_unauthorized = Some(Arc::new(handler));
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Bearer token for an authenticated call. An expired token is purged
    /// and rejected before the request goes out; an absent token is passed
    /// through so the backend's 401 stays authoritative.
    fn auth_token(&self) -> Result<Option<String>, ApiError> {
        match self.session.token() {
            Some(token) if is_token_expired(&token) => {
                tracing::debug!("Token expired before request, clearing auth data");
                self.session.clear_auth_data();
                Err(ApiError::SessionExpired)
            }
            other => Ok(other),
        }
    }

    fn with_auth(&self, req: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        match self.auth_token()? {
            Some(token) => Ok(req.bearer_auth(token)),
            None => Ok(req),
        }
    }

    /// Normalize a response into the parsed body or an [`ApiError`].
    async fn handle_response(&self, response: Response) -> Result<Value, ApiError> {
        let status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            tracing::debug!("Unauthorized response, clearing auth data");
            self.session.clear_auth_data();
            if let Some(handler) = &self.on_unauthorized {
                handler();
            }
            return Err(ApiError::SessionExpired);
        }
        if status == StatusCode::FORBIDDEN {
            return Err(ApiError::Forbidden);
        }
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound);
        }

        let is_json = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.contains("application/json"))
            .unwrap_or(false);
        if !is_json {
            return Err(ApiError::NonJsonResponse);
        }

        let body: Value = response
            .json()
            .await
            .map_err(|_| ApiError::NonJsonResponse)?;

        if !status.is_success() {
            let message = body
                .get("error")
                .or_else(|| body.get("message"))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
            return Err(ApiError::Status {
                status: status.as_u16(),
                message,
            });
        }

        Ok(body)
    }

    /// Record the session when an auth response carries both a token and a
    /// user record.
    fn record_auth_response(&self, body: &Value) -> Result<(), ApiError> {
        let token = body.get("token").and_then(|v| v.as_str());
        let user = body
            .get("user")
            .cloned()
            .and_then(|v| serde_json::from_value::<UserRecord>(v).ok());
        if let (Some(token), Some(user)) = (token, user) {
            self.session
                .record_session(token, &user)
                .map_err(|e| ApiError::Storage(e.to_string()))?;
            tracing::debug!("Session recorded after authentication");
        }
        Ok(())
    }

    // ---- auth ----

    /// POST /auth/login. Records the session on success.
    pub async fn login(&self, credentials: &LoginRequest) -> Result<Value, ApiError> {
        let response = self
            .http
            .post(self.url("/auth/login"))
            .json(credentials)
            .send()
            .await?;
        let body = self.handle_response(response).await?;
        self.record_auth_response(&body)?;
        Ok(body)
    }

    /// POST /auth/signup. Accepts either a display name or a handle and
    /// normalizes the payload to carry both. Records the session on
    /// success.
    pub async fn register(&self, request: &RegisterRequest) -> Result<Value, ApiError> {
        let username = request
            .username
            .clone()
            .or_else(|| request.name.clone())
            .filter(|s| !s.trim().is_empty());
        let username = match username {
            Some(u) => u,
            None => {
                return Err(ApiError::Validation(
                    "Username, email, and password are required".to_string(),
                ))
            }
        };
        if request.email.trim().is_empty() || request.password.is_empty() {
            return Err(ApiError::Validation(
                "Username, email, and password are required".to_string(),
            ));
        }

        let payload = serde_json::json!({
            "name": request.name.clone().unwrap_or_else(|| username.clone()),
            "username": username,
            "email": request.email,
            "password": request.password,
        });
        let response = self
            .http
            .post(self.url("/auth/signup"))
            .json(&payload)
            .send()
            .await?;
        let body = self.handle_response(response).await?;
        self.record_auth_response(&body)?;
        Ok(body)
    }

    /// Local logout. The backend holds no session state, so this only
    /// drops the stored credentials.
    pub fn logout(&self) {
        self.session.clear_auth_data();
        tracing::debug!("User logged out");
    }

    /// GET /auth/profile.
    pub async fn get_profile(&self) -> Result<Value, ApiError> {
        let req = self.with_auth(self.http.get(self.url("/auth/profile")))?;
        self.handle_response(req.send().await?).await
    }

    /// PUT /auth/profile.
    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<Value, ApiError> {
        let req = self.with_auth(self.http.put(self.url("/auth/profile")))?;
        self.handle_response(req.json(update).send().await?).await
    }

    // ---- uploads ----

    /// POST /upload/image as multipart form data.
    ///
    /// Validated locally first: the file must carry an image media type
    /// (judged by extension), exist, and stay under 5 MiB. Unlike the
    /// other authenticated operations this one refuses to run without a
    /// stored token.
    pub async fn upload_image(&self, path: &Path) -> Result<Value, ApiError> {
        let mime = image_mime(path)
            .ok_or_else(|| ApiError::Validation("Please select a valid image file".to_string()))?;
        let size = std::fs::metadata(path)
            .map_err(|_| ApiError::Validation("No image file provided".to_string()))?
            .len();
        if size > MAX_UPLOAD_BYTES {
            return Err(ApiError::Validation(
                "Image size should be less than 5MB".to_string(),
            ));
        }

        let token = self.auth_token()?.ok_or(ApiError::AuthRequired)?;

        let bytes = std::fs::read(path)
            .map_err(|e| ApiError::Validation(format!("Failed to read image file: {}", e)))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(mime)?;
        let form = reqwest::multipart::Form::new().part("image", part);

        let response = self
            .http
            .post(self.url("/upload/image"))
            .bearer_auth(token)
            .multipart(form)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// GET /uploads/test. Backend upload health probe.
    pub async fn test_upload(&self) -> Result<Value, ApiError> {
        let req = self.with_auth(self.http.get(self.url("/uploads/test")))?;
        self.handle_response(req.send().await?).await
    }

    // ---- blogs ----

    /// POST /blogs.
    pub async fn create_blog(&self, payload: &BlogPayload) -> Result<Value, ApiError> {
        validate_blog_payload(payload)?;
        let req = self.with_auth(self.http.post(self.url("/blogs")))?;
        self.handle_response(req.json(payload).send().await?).await
    }

    /// GET /blogs with optional tag/search/page/limit filters.
    pub async fn list_blogs(&self, query: &ListQuery) -> Result<Value, ApiError> {
        let response = self
            .http
            .get(self.url("/blogs"))
            .query(&query.to_pairs())
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// GET /blogs/:id.
    pub async fn get_blog(&self, id: &str) -> Result<Value, ApiError> {
        require_id(id, "Blog ID is required")?;
        let response = self
            .http
            .get(self.url(&format!("/blogs/{}", id)))
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// PUT /blogs/:id.
    pub async fn update_blog(&self, id: &str, payload: &BlogPayload) -> Result<Value, ApiError> {
        require_id(id, "Blog ID is required")?;
        validate_blog_payload(payload)?;
        let req = self.with_auth(self.http.put(self.url(&format!("/blogs/{}", id))))?;
        self.handle_response(req.json(payload).send().await?).await
    }

    /// DELETE /blogs/:id.
    pub async fn delete_blog(&self, id: &str) -> Result<Value, ApiError> {
        require_id(id, "Blog ID is required")?;
        let req = self.with_auth(self.http.delete(self.url(&format!("/blogs/{}", id))))?;
        self.handle_response(req.send().await?).await
    }

    /// GET /blogs/my. Posts owned by the authenticated user.
    pub async fn my_blogs(&self, query: &ListQuery) -> Result<Value, ApiError> {
        let req = self.with_auth(self.http.get(self.url("/blogs/my")))?;
        self.handle_response(req.query(&query.to_pairs()).send().await?)
            .await
    }

    /// POST /blogs/:id/like. Flips the caller's like on a post.
    pub async fn toggle_like(&self, id: &str) -> Result<Value, ApiError> {
        require_id(id, "Blog ID is required")?;
        let req = self.with_auth(self.http.post(self.url(&format!("/blogs/{}/like", id))))?;
        self.handle_response(req.send().await?).await
    }

    /// POST /blogs/:id/comments.
    pub async fn add_comment(&self, id: &str, content: &str) -> Result<Value, ApiError> {
        require_id(id, "Blog ID is required")?;
        let content = content.trim();
        if content.is_empty() {
            return Err(ApiError::Validation(
                "Comment content is required".to_string(),
            ));
        }
        let req = self.with_auth(self.http.post(self.url(&format!("/blogs/{}/comments", id))))?;
        self.handle_response(
            req.json(&serde_json::json!({ "content": content }))
                .send()
                .await?,
        )
        .await
    }

    /// DELETE /blogs/:id/comments/:commentId.
    pub async fn delete_comment(&self, id: &str, comment_id: &str) -> Result<Value, ApiError> {
        require_id(id, "Blog ID is required")?;
        require_id(comment_id, "Comment ID is required")?;
        let req = self.with_auth(
            self.http
                .delete(self.url(&format!("/blogs/{}/comments/{}", id, comment_id))),
        )?;
        self.handle_response(req.send().await?).await
    }

    /// GET /blogs/stats. Aggregate statistics for the authenticated user.
    pub async fn blog_stats(&self) -> Result<Value, ApiError> {
        let req = self.with_auth(self.http.get(self.url("/blogs/stats")))?;
        self.handle_response(req.send().await?).await
    }

    // ---- misc ----

    /// POST /contact.
    pub async fn submit_contact(&self, request: &ContactRequest) -> Result<Value, ApiError> {
        if request.name.trim().is_empty()
            || request.email.trim().is_empty()
            || request.message.trim().is_empty()
        {
            return Err(ApiError::Validation(
                "Name, email, and message are required".to_string(),
            ));
        }
        let response = self
            .http
            .post(self.url("/contact"))
            .json(request)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// POST /admin/create. Provision an admin account.
    pub async fn create_admin(&self, request: &AdminCreateRequest) -> Result<Value, ApiError> {
        if request.name.trim().is_empty()
            || request.email.trim().is_empty()
            || request.username.trim().is_empty()
            || request.password.is_empty()
        {
            return Err(ApiError::Validation(
                "Name, email, username, and password are required".to_string(),
            ));
        }
        let response = self
            .http
            .post(self.url("/admin/create"))
            .json(request)
            .send()
            .await?;
        self.handle_response(response).await
    }

    /// GET /health.
    pub async fn health(&self) -> Result<Value, ApiError> {
        let response = self.http.get(self.url("/health")).send().await?;
        self.handle_response(response).await
    }
}

fn require_id(id: &str, message: &str) -> Result<(), ApiError> {
    if id.trim().is_empty() {
        return Err(ApiError::Validation(message.to_string()));
    }
    Ok(())
}

fn validate_blog_payload(payload: &BlogPayload) -> Result<(), ApiError> {
    if payload.title.trim().is_empty() || payload.content.trim().is_empty() {
        return Err(ApiError::Validation(
            "Title and content are required".to_string(),
        ));
    }
    Ok(())
}

/// Media type for an image file, judged by extension. `None` for anything
/// that is not an image.
fn image_mime(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "gif" => Some("image/gif"),
        "webp" => Some("image/webp"),
        "svg" => Some("image/svg+xml"),
        "bmp" => Some("image/bmp"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::MemoryStore;
    use axum::extract::State;
    use axum::http::HeaderMap;
    use axum::response::IntoResponse;
    use axum::routing::{get, post};
    use axum::{Json, Router};
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use std::io::Write;
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn spawn_backend(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/api", addr)
    }

    fn client_with(base_url: String) -> ApiClient {
        ApiClient::new(
            ApiConfig::new(base_url),
            SessionManager::new(Box::new(MemoryStore::new())),
        )
    }

    fn make_token(exp_offset_secs: i64) -> String {
        let exp = chrono::Utc::now().timestamp() + exp_offset_secs;
        let claims = serde_json::json!({ "exp": exp }).to_string();
        format!("hdr.{}.sig", URL_SAFE_NO_PAD.encode(claims))
    }

    #[derive(Clone, Default)]
    struct Hits(Arc<AtomicUsize>);

    async fn counting_handler(State(hits): State<Hits>) -> impl IntoResponse {
        hits.0.fetch_add(1, Ordering::SeqCst);
        Json(serde_json::json!({}))
    }

    fn counting_backend(hits: Hits) -> Router {
        Router::new().fallback(counting_handler).with_state(hits)
    }

    #[tokio::test]
    async fn test_create_blog_requires_title_without_network() {
        let hits = Hits::default();
        let base = spawn_backend(counting_backend(hits.clone())).await;
        let client = client_with(base);
        client
            .session()
            .record_session(&make_token(3600), &UserRecord::default())
            .unwrap();

        let err = client
            .create_blog(&BlogPayload {
                title: String::new(),
                content: "body".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Title and content are required");
        assert!(matches!(err, ApiError::Validation(_)));
        assert_eq!(hits.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_login_records_session() {
        let token = make_token(3600);
        let body = serde_json::json!({ "token": token, "user": { "name": "A" } });
        let response_body = body.clone();
        let router = Router::new().route(
            "/api/auth/login",
            post(move || {
                let body = response_body.clone();
                async move { Json(body) }
            }),
        );
        let base = spawn_backend(router).await;
        let client = client_with(base);

        let result = client
            .login(&LoginRequest {
                username: "a".to_string(),
                password: "b".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(result, body);

        let user = client.session().current_user().unwrap();
        assert_eq!(user.name.as_deref(), Some("A"));
        assert_eq!(client.session().token(), Some(token));
    }

    #[tokio::test]
    async fn test_unauthorized_response_purges_session() {
        let router = Router::new().route(
            "/api/blogs/stats",
            get(|| async {
                (
                    axum::http::StatusCode::UNAUTHORIZED,
                    Json(serde_json::json!({ "error": "bad token" })),
                )
            }),
        );
        let base = spawn_backend(router).await;
        let mut client = client_with(base);
        let fired = Arc::new(AtomicUsize::new(0));
        let fired_in_handler = fired.clone();
        client.on_unauthorized(move || {
            fired_in_handler.fetch_add(1, Ordering::SeqCst);
        });
        client
            .session()
            .record_session(&make_token(3600), &UserRecord::default())
            .unwrap();

        let err = client.blog_stats().await.unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(client.session().token().is_none());
        assert!(client.session().current_user().is_none());
    }

    #[tokio::test]
    async fn test_expired_token_short_circuits_authenticated_calls() {
        let hits = Hits::default();
        let base = spawn_backend(counting_backend(hits.clone())).await;
        let client = client_with(base);
        client
            .session()
            .record_session(&make_token(-3600), &UserRecord::default())
            .unwrap();

        let err = client.my_blogs(&ListQuery::default()).await.unwrap_err();
        assert!(matches!(err, ApiError::SessionExpired));
        assert_eq!(hits.0.load(Ordering::SeqCst), 0);
        assert!(client.session().token().is_none());
    }

    #[tokio::test]
    async fn test_oversized_upload_rejected_locally() {
        let hits = Hits::default();
        let base = spawn_backend(counting_backend(hits.clone())).await;
        let client = client_with(base);
        client
            .session()
            .record_session(&make_token(3600), &UserRecord::default())
            .unwrap();

        let file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.as_file().set_len(6 * 1024 * 1024).unwrap();

        let err = client.upload_image(file.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "Image size should be less than 5MB");
        assert_eq!(hits.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_non_image_upload_rejected_locally() {
        let hits = Hits::default();
        let base = spawn_backend(counting_backend(hits.clone())).await;
        let client = client_with(base);

        let mut file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        file.write_all(b"not an image").unwrap();

        let err = client.upload_image(file.path()).await.unwrap_err();
        assert_eq!(err.to_string(), "Please select a valid image file");
        assert_eq!(hits.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upload_requires_stored_token() {
        let hits = Hits::default();
        let base = spawn_backend(counting_backend(hits.clone())).await;
        let client = client_with(base);

        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"png bytes").unwrap();

        let err = client.upload_image(file.path()).await.unwrap_err();
        assert!(matches!(err, ApiError::AuthRequired));
        assert_eq!(hits.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_register_requires_identity_fields() {
        let hits = Hits::default();
        let base = spawn_backend(counting_backend(hits.clone())).await;
        let client = client_with(base);

        let err = client
            .register(&RegisterRequest {
                email: "a@example.com".to_string(),
                password: "secret".to_string(),
                ..Default::default()
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Username, email, and password are required");
        assert_eq!(hits.0.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_bearer_header_attached_to_authenticated_calls() {
        let router = Router::new().route(
            "/api/blogs/my",
            get(|headers: HeaderMap| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("")
                    .to_string();
                Json(serde_json::json!({ "auth": auth }))
            }),
        );
        let base = spawn_backend(router).await;
        let client = client_with(base);
        let token = make_token(3600);
        client
            .session()
            .record_session(&token, &UserRecord::default())
            .unwrap();

        let body = client.my_blogs(&ListQuery::default()).await.unwrap();
        assert_eq!(body["auth"], format!("Bearer {}", token));
    }

    #[tokio::test]
    async fn test_non_json_response_is_normalized() {
        let router = Router::new().route("/api/health", get(|| async { "ok" }));
        let base = spawn_backend(router).await;
        let client = client_with(base);

        let err = client.health().await.unwrap_err();
        assert!(matches!(err, ApiError::NonJsonResponse));
    }

    #[tokio::test]
    async fn test_forbidden_and_missing_are_normalized() {
        let router = Router::new().route(
            "/api/blogs/stats",
            get(|| async {
                (
                    axum::http::StatusCode::FORBIDDEN,
                    Json(serde_json::json!({ "error": "no" })),
                )
            }),
        );
        let base = spawn_backend(router).await;
        let client = client_with(base);
        client
            .session()
            .record_session(&make_token(3600), &UserRecord::default())
            .unwrap();

        let err = client.blog_stats().await.unwrap_err();
        assert!(matches!(err, ApiError::Forbidden));

        // unrouted path answers 404
        let err = client.get_blog("missing").await.unwrap_err();
        assert!(matches!(err, ApiError::NotFound));
    }

    #[tokio::test]
    async fn test_error_body_message_is_surfaced() {
        let router = Router::new().route(
            "/api/contact",
            post(|| async {
                (
                    axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({ "error": "smtp down" })),
                )
            }),
        );
        let base = spawn_backend(router).await;
        let client = client_with(base);

        let err = client
            .submit_contact(&ContactRequest {
                name: "n".to_string(),
                email: "e@example.com".to_string(),
                message: "m".to_string(),
            })
            .await
            .unwrap_err();
        match err {
            ApiError::Status { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "smtp down");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_list_query_reaches_the_wire() {
        let router = Router::new().route(
            "/api/blogs",
            get(
                |axum::extract::RawQuery(query): axum::extract::RawQuery| async move {
                    Json(serde_json::json!({ "query": query.unwrap_or_default() }))
                },
            ),
        );
        let base = spawn_backend(router).await;
        let client = client_with(base);

        let body = client
            .list_blogs(&ListQuery {
                tag: Some("travel".to_string()),
                limit: Some(6),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(body["query"], "tag=travel&limit=6");
    }
}
