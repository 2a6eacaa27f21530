use serde::{Deserialize, Serialize};

pub const ADMIN_ROLE: &str = "Admin";
pub const REGULAR_ROLE: &str = "Regular";

/// The identity tuple asserted by every session token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub username: String,
    pub email: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Identity {
    pub fn new(username: impl Into<String>, email: impl Into<String>, role: impl Into<String>) -> Self {
        Self { username: username.into(), email: email.into(), role: role.into(), id: None }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

/// Decoded claims of a session token.
///
/// Identity fields default to empty when absent so that an incomplete token still decodes
/// and is rejected by the completeness check rather than by the decoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Issued at (Unix timestamp)
    pub iat: usize,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
}

impl SessionClaims {
    pub fn new(identity: &Identity, ttl: chrono::Duration) -> Self {
        let now = chrono::Utc::now();
        let exp = now + ttl;
        Self {
            username: identity.username.clone(),
            email: identity.email.clone(),
            role: identity.role.clone(),
            id: identity.id.clone(),
            iat: now.timestamp().max(0) as usize,
            exp: exp.timestamp().max(0) as usize,
        }
    }

    /// All of username, email and role are present and non-empty.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.email.is_empty() && !self.role.is_empty()
    }

    /// Both tokens assert the same user. `id` is not part of the comparison.
    pub fn same_user(&self, other: &SessionClaims) -> bool {
        self.username == other.username && self.email == other.email && self.role == other.role
    }

    pub fn is_admin(&self) -> bool { self.role == ADMIN_ROLE }

    pub fn identity(&self) -> Identity {
        Identity {
            username: self.username.clone(),
            email: self.email.clone(),
            role: self.role.clone(),
            id: self.id.clone(),
        }
    }
}
