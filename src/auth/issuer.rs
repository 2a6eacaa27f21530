use serde::Serialize;

use super::claims::Identity;
use super::token::{TokenCodec, TokenError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Mints the access/refresh pair handed out at login.
#[derive(Debug, Clone)]
pub struct TokenIssuer {
    codec: TokenCodec,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
}

impl TokenIssuer {
    pub fn new(codec: TokenCodec, access_ttl: chrono::Duration, refresh_ttl: chrono::Duration) -> Self {
        Self { codec, access_ttl, refresh_ttl }
    }

    pub fn issue_pair(&self, identity: &Identity) -> Result<TokenPair, TokenError> {
        Ok(TokenPair {
            access_token: self.codec.sign(identity, self.access_ttl)?,
            refresh_token: self.codec.sign(identity, self.refresh_ttl)?,
        })
    }
}
