//! Session state: token expiry inspection and the stored credential pair.
//!
//! The session manager is the single source of truth for whether this
//! client is authenticated. It never verifies the token signature (the
//! backend owns that); it only inspects the embedded expiry and keeps the
//! stored token/user pair consistent with the answer.

pub mod store;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use serde::Deserialize;

use crate::types::{AuthStatus, UserRecord};
use store::{CredentialStore, TOKEN_KEY, USER_KEY};

/// Claims inspected in the token payload. Only `exp` matters here.
#[derive(Debug, Deserialize)]
struct Claims {
    exp: i64,
}

fn decode_exp(token: &str) -> Option<i64> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: Claims = serde_json::from_slice(&bytes).ok()?;
    Some(claims.exp)
}

/// Whether the token's embedded expiry has passed.
///
/// Fails closed: a token that cannot be decoded or parsed, or whose
/// payload lacks an `exp` claim, counts as expired.
pub fn is_token_expired(token: &str) -> bool {
    match decode_exp(token) {
        Some(exp) => exp * 1000 <= Utc::now().timestamp_millis(),
        None => true,
    }
}

/// Owner of the persisted token and user record.
pub struct SessionManager {
    store: Box<dyn CredentialStore>,
}

impl SessionManager {
    pub fn new(store: Box<dyn CredentialStore>) -> Self {
        Self { store }
    }

    /// The raw stored token, if any.
    pub fn token(&self) -> Option<String> {
        self.store.get(TOKEN_KEY)
    }

    /// Remove both stored entries. Safe to call when nothing is stored.
    pub fn clear_auth_data(&self) {
        if let Err(e) = self.store.remove(TOKEN_KEY) {
            tracing::warn!("Failed to remove stored token: {}", e);
        }
        if let Err(e) = self.store.remove(USER_KEY) {
            tracing::warn!("Failed to remove stored user record: {}", e);
        }
        tracing::debug!("Auth data cleared");
    }

    /// The cached user record, or `None` when the session is not usable.
    ///
    /// An expired token purges both entries. A stored record that no
    /// longer parses is treated as corrupted and also purged.
    pub fn current_user(&self) -> Option<UserRecord> {
        if let Some(token) = self.store.get(TOKEN_KEY) {
            if is_token_expired(&token) {
                tracing::debug!("Stored token expired, clearing auth data");
                self.clear_auth_data();
                return None;
            }
        }
        let raw = self.store.get(USER_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(user) => Some(user),
            Err(e) => {
                tracing::warn!("Stored user record is corrupted, clearing: {}", e);
                self.clear_auth_data();
                None
            }
        }
    }

    /// Derived session state. Authenticated only when a live token and a
    /// readable user record are both present.
    pub fn check_auth_status(&self) -> AuthStatus {
        if let Some(token) = self.store.get(TOKEN_KEY) {
            if is_token_expired(&token) {
                self.clear_auth_data();
                return AuthStatus {
                    is_authenticated: false,
                    user: None,
                    token: None,
                };
            }
        }
        let token = self.store.get(TOKEN_KEY);
        let user = self.current_user();
        AuthStatus {
            is_authenticated: token.is_some() && user.is_some(),
            user,
            token,
        }
    }

    /// Persist a fresh session. The user record is written before the
    /// token so a reader that observes a token always finds a user.
    pub fn record_session(&self, token: &str, user: &UserRecord) -> anyhow::Result<()> {
        let serialized = serde_json::to_string(user)?;
        self.store.set(USER_KEY, &serialized)?;
        self.store.set(TOKEN_KEY, token)?;
        tracing::debug!("Session recorded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::store::MemoryStore;
    use super::*;

    fn make_token(exp: i64) -> String {
        let claims = serde_json::json!({ "exp": exp }).to_string();
        format!("hdr.{}.sig", URL_SAFE_NO_PAD.encode(claims))
    }

    fn future_exp() -> i64 {
        Utc::now().timestamp() + 3600
    }

    fn past_exp() -> i64 {
        Utc::now().timestamp() - 3600
    }

    fn manager() -> SessionManager {
        SessionManager::new(Box::new(MemoryStore::new()))
    }

    fn sample_user() -> UserRecord {
        UserRecord {
            name: Some("A".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_token_expiry_truth_table() {
        assert!(!is_token_expired(&make_token(future_exp())));
        assert!(is_token_expired(&make_token(past_exp())));
        assert!(is_token_expired(""));
        assert!(is_token_expired("not-a-jwt"));
        assert!(is_token_expired("two.segments-with-bad-payload"));
    }

    #[test]
    fn test_missing_exp_counts_as_expired() {
        let payload = URL_SAFE_NO_PAD.encode("{}");
        assert!(is_token_expired(&format!("hdr.{}.sig", payload)));
    }

    #[test]
    fn test_padded_payload_still_decodes() {
        let claims = serde_json::json!({ "exp": future_exp() }).to_string();
        let mut payload = URL_SAFE_NO_PAD.encode(claims);
        while payload.len() % 4 != 0 {
            payload.push('=');
        }
        assert!(!is_token_expired(&format!("hdr.{}.sig", payload)));
    }

    #[test]
    fn test_clear_then_read_yields_none() {
        let mgr = manager();
        mgr.record_session(&make_token(future_exp()), &sample_user())
            .unwrap();
        mgr.clear_auth_data();
        assert!(mgr.current_user().is_none());
        assert!(mgr.token().is_none());
        // idempotent on an already-empty store
        mgr.clear_auth_data();
    }

    #[test]
    fn test_expired_token_purges_on_status_check() {
        let mgr = manager();
        mgr.record_session(&make_token(past_exp()), &sample_user())
            .unwrap();
        let status = mgr.check_auth_status();
        assert!(!status.is_authenticated);
        assert!(status.user.is_none());
        assert!(status.token.is_none());
        // nothing is left behind in storage
        assert!(mgr.token().is_none());
        assert!(mgr.current_user().is_none());
    }

    #[test]
    fn test_valid_session_reports_authenticated() {
        let mgr = manager();
        let token = make_token(future_exp());
        let user = sample_user();
        mgr.record_session(&token, &user).unwrap();
        let status = mgr.check_auth_status();
        assert!(status.is_authenticated);
        assert_eq!(status.user, Some(user));
        assert_eq!(status.token, Some(token));
    }

    #[test]
    fn test_corrupted_user_record_is_cleared() {
        let store = MemoryStore::new();
        store.set(USER_KEY, "{not json").unwrap();
        let mgr = SessionManager::new(Box::new(store));
        assert!(mgr.current_user().is_none());
        // the corrupted entry is gone on the second read as well
        assert!(mgr.current_user().is_none());
    }

    #[test]
    fn test_user_without_token_is_not_authenticated() {
        let store = MemoryStore::new();
        store.set(USER_KEY, r#"{"name":"A"}"#).unwrap();
        let mgr = SessionManager::new(Box::new(store));
        let status = mgr.check_auth_status();
        assert!(!status.is_authenticated);
        assert_eq!(status.user.and_then(|u| u.name).as_deref(), Some("A"));
        assert!(status.token.is_none());
    }

    #[test]
    fn test_record_session_roundtrip() {
        let mgr = manager();
        let token = make_token(future_exp());
        mgr.record_session(&token, &sample_user()).unwrap();
        let user = mgr.current_user().unwrap();
        assert_eq!(user.name.as_deref(), Some("A"));
        assert_eq!(mgr.token(), Some(token));
    }
}
