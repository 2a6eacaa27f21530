use std::collections::HashSet;

use serde::Deserialize;

/// What a handler requires of the caller's session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthRequirement {
    /// Any valid authenticated session.
    Simple,
    /// The session must assert exactly this username.
    User { username: String },
    /// The session must assert the `Admin` role.
    Admin,
    /// The session email must belong to this set.
    Group { emails: HashSet<String> },
}

impl AuthRequirement {
    pub fn user(username: impl Into<String>) -> Self { AuthRequirement::User { username: username.into() } }

    pub fn group<I, S>(emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        AuthRequirement::Group { emails: emails.into_iter().map(Into::into).collect() }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            AuthRequirement::Simple => "Simple",
            AuthRequirement::User { .. } => "User",
            AuthRequirement::Admin => "Admin",
            AuthRequirement::Group { .. } => "Group",
        }
    }
}

/// Loosely typed requirement as it arrives from configuration or JSON, e.g.
/// `{"authType": "Group", "emails": ["a@x.com"]}`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequirementDescriptor {
    pub auth_type: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub emails: Option<Vec<String>>,
}

/// The descriptor named no known requirement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown requirement tag: {0:?}")]
pub struct UnknownRequirement(pub String);

impl TryFrom<&RequirementDescriptor> for AuthRequirement {
    type Error = UnknownRequirement;

    fn try_from(d: &RequirementDescriptor) -> Result<Self, Self::Error> {
        match d.auth_type.as_str() {
            "Simple" => Ok(AuthRequirement::Simple),
            "Admin" => Ok(AuthRequirement::Admin),
            // A missing username matches nobody; the tag itself is valid.
            "User" => Ok(AuthRequirement::user(d.username.clone().unwrap_or_default())),
            "Group" => Ok(AuthRequirement::group(d.emails.clone().unwrap_or_default())),
            other => Err(UnknownRequirement(other.to_string())),
        }
    }
}
