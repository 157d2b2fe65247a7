//! Wire types shared between the session manager and the gateway client.

use serde::{Deserialize, Serialize};

/// Snapshot of the authenticated principal, cached next to the token.
///
/// Every field is optional: the backend decides the shape and this layer
/// only displays it. A user record without a live token is stale and is
/// never consulted for authorization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserRecord {
    /// Backend identifier (Mongo-style `_id` accepted on input).
    #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Login handle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,

    /// Profile image URL.
    #[serde(
        default,
        rename = "profilePicture",
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_picture: Option<String>,
}

/// Derived session state reported by
/// [`SessionManager::check_auth_status`](crate::SessionManager::check_auth_status).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuthStatus {
    pub is_authenticated: bool,
    pub user: Option<UserRecord>,
    pub token: Option<String>,
}

/// Login credentials. Sent verbatim to POST /auth/login.
#[derive(Debug, Clone, Serialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Registration fields. Either `name` or `username` may be given; the
/// client normalizes the payload to carry both.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RegisterRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub email: String,
    pub password: String,
}

/// Fields for creating or updating a post.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BlogPayload {
    pub title: String,
    /// Short summary shown in listings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    /// Post body (markdown).
    pub content: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Cover image URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Filters for the post listing endpoints.
#[derive(Debug, Clone, Default)]
pub struct ListQuery {
    pub tag: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl ListQuery {
    /// Query-string pairs, skipping unset fields.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(tag) = &self.tag {
            pairs.push(("tag", tag.clone()));
        }
        if let Some(search) = &self.search {
            pairs.push(("search", search.clone()));
        }
        if let Some(page) = self.page {
            pairs.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}

/// Contact form submission.
#[derive(Debug, Clone, Serialize)]
pub struct ContactRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

/// Admin provisioning request.
#[derive(Debug, Clone, Serialize)]
pub struct AdminCreateRequest {
    pub name: String,
    pub email: String,
    pub username: String,
    pub password: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

/// Partial profile update. Unset fields are left untouched by the backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(
        rename = "profilePicture",
        skip_serializing_if = "Option::is_none"
    )]
    pub profile_picture: Option<String>,
}
