use super::claims::SessionClaims;

/// Notice attached to a successful response after the access token was renewed.
pub const RENEWAL_NOTICE: &str = "Access token has been expired. Remember to update it";

/// Why a session was refused. `cause()` is the user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Denial {
    /// One or both tokens absent.
    MissingCredentials,
    /// A token failed to decode for a reason other than an expired access token.
    Token(&'static str),
    IncompleteClaims,
    ClaimMismatch,
    DifferentUser,
    DifferentRole,
    NotInGroup,
    UnknownRequirement,
    /// Access and refresh tokens both expired.
    SessionExpired,
}

impl Denial {
    pub fn cause(&self) -> &'static str {
        match self {
            Denial::MissingCredentials => "Unauthorized",
            Denial::Token(kind) => kind,
            Denial::IncompleteClaims => "Token is missing information",
            Denial::ClaimMismatch => "Mismatched users",
            Denial::DifferentUser => "Requested auth for a different user",
            Denial::DifferentRole => "Requested auth for a different role",
            Denial::NotInGroup => "Mail of the token not present in the group",
            Denial::UnknownRequirement => "Wrong authType inserted",
            Denial::SessionExpired => "Perform login again",
        }
    }
}

impl std::fmt::Display for Denial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.cause()) }
}

/// Allow/deny decision. Deliberately not convertible to `bool`; callers match on it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthVerdict {
    Allowed,
    Denied(Denial),
}

impl AuthVerdict {
    pub fn cause(&self) -> &'static str {
        match self {
            AuthVerdict::Allowed => "Authorized",
            AuthVerdict::Denied(d) => d.cause(),
        }
    }
}

/// Replacement access token minted from a still-valid refresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renewal {
    pub access_token: String,
    pub notice: &'static str,
}

/// Result of one verification: the verdict, the claims it was evaluated against
/// (when decoding got that far) and the renewal to hand to the transport.
#[derive(Debug, Clone)]
pub struct AuthOutcome {
    pub verdict: AuthVerdict,
    pub claims: Option<SessionClaims>,
    pub renewal: Option<Renewal>,
}

impl AuthOutcome {
    pub(crate) fn denied(denial: Denial) -> Self {
        Self { verdict: AuthVerdict::Denied(denial), claims: None, renewal: None }
    }

    pub fn cause(&self) -> &'static str { self.verdict.cause() }
}
