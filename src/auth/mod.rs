//! Session authentication and authorization.
//! The public surface is the `SessionAuthority` verifier plus the token types it consumes;
//! implementation is split across sub-modules.

mod claims;
mod token;
mod requirement;
mod verdict;
mod authority;
mod issuer;

pub use claims::{Identity, SessionClaims, ADMIN_ROLE, REGULAR_ROLE};
pub use token::{TokenCodec, TokenError};
pub use requirement::{AuthRequirement, RequirementDescriptor, UnknownRequirement};
pub use verdict::{AuthOutcome, AuthVerdict, Denial, Renewal, RENEWAL_NOTICE};
pub use authority::{evaluate, SessionAuthority};
pub use issuer::{TokenIssuer, TokenPair};
