//! Dual-token session verification.
//!
//! A request carries a short-lived access token and a long-lived refresh token. Both are
//! decoded, checked for completeness and for agreement, and the access claims are matched
//! against the handler's requirement. When only the access token has expired, a new one is
//! minted from the refresh claims and handed back as a `Renewal`.

use tracing::{debug, error, info};

use super::claims::SessionClaims;
use super::requirement::{AuthRequirement, RequirementDescriptor};
use super::token::TokenCodec;
use super::verdict::{AuthOutcome, AuthVerdict, Denial, Renewal, RENEWAL_NOTICE};

/// Match a requirement against one set of claims.
///
/// Shared by the normal path (access claims) and the renewal path (refresh claims).
pub fn evaluate(requirement: &AuthRequirement, claims: &SessionClaims) -> AuthVerdict {
    match requirement {
        AuthRequirement::Simple => AuthVerdict::Allowed,
        AuthRequirement::User { username } => {
            if &claims.username == username { AuthVerdict::Allowed } else { AuthVerdict::Denied(Denial::DifferentUser) }
        }
        AuthRequirement::Admin => {
            if claims.is_admin() { AuthVerdict::Allowed } else { AuthVerdict::Denied(Denial::DifferentRole) }
        }
        AuthRequirement::Group { emails } => {
            if emails.contains(&claims.email) { AuthVerdict::Allowed } else { AuthVerdict::Denied(Denial::NotInGroup) }
        }
    }
}

/// Verifies session token pairs. Holds only the codec and the access TTL, so one instance
/// can be shared across concurrent requests.
#[derive(Debug, Clone)]
pub struct SessionAuthority {
    codec: TokenCodec,
    access_ttl: chrono::Duration,
}

impl SessionAuthority {
    pub fn new(codec: TokenCodec, access_ttl: chrono::Duration) -> Self {
        Self { codec, access_ttl }
    }

    pub fn access_ttl(&self) -> chrono::Duration { self.access_ttl }

    pub fn verify(&self, access: Option<&str>, refresh: Option<&str>, requirement: &AuthRequirement) -> AuthOutcome {
        let outcome = self.verify_inner(access, refresh, requirement);
        debug!(
            target: "auth",
            requirement = requirement.tag(),
            cause = outcome.cause(),
            renewed = outcome.renewal.is_some(),
            "session verified"
        );
        outcome
    }

    /// Like `verify`, for requirements that arrive untyped. An unknown tag is refused before
    /// the tokens are looked at.
    pub fn verify_descriptor(&self, access: Option<&str>, refresh: Option<&str>, descriptor: &RequirementDescriptor) -> AuthOutcome {
        match AuthRequirement::try_from(descriptor) {
            Ok(requirement) => self.verify(access, refresh, &requirement),
            Err(e) => {
                error!(target: "auth", "{e}");
                AuthOutcome::denied(Denial::UnknownRequirement)
            }
        }
    }

    fn verify_inner(&self, access: Option<&str>, refresh: Option<&str>, requirement: &AuthRequirement) -> AuthOutcome {
        let (Some(access), Some(refresh)) = (present(access), present(refresh)) else {
            return AuthOutcome::denied(Denial::MissingCredentials);
        };

        let access_claims = match self.codec.decode(access) {
            Ok(c) => c,
            Err(e) if e.is_expired() => return self.renew(refresh, requirement),
            Err(e) => return AuthOutcome::denied(Denial::Token(e.kind())),
        };
        let refresh_claims = match self.codec.decode(refresh) {
            Ok(c) => c,
            Err(e) => return AuthOutcome::denied(Denial::Token(e.kind())),
        };

        if !access_claims.is_complete() || !refresh_claims.is_complete() {
            return AuthOutcome::denied(Denial::IncompleteClaims);
        }
        if !access_claims.same_user(&refresh_claims) {
            return AuthOutcome::denied(Denial::ClaimMismatch);
        }

        let verdict = evaluate(requirement, &access_claims);
        AuthOutcome { verdict, claims: Some(access_claims), renewal: None }
    }

    fn renew(&self, refresh: &str, requirement: &AuthRequirement) -> AuthOutcome {
        let claims = match self.codec.decode(refresh) {
            Ok(c) => c,
            Err(e) if e.is_expired() => return AuthOutcome::denied(Denial::SessionExpired),
            Err(e) => return AuthOutcome::denied(Denial::Token(e.kind())),
        };
        // No access token is minted for an incomplete identity.
        if !claims.is_complete() {
            return AuthOutcome::denied(Denial::IncompleteClaims);
        }
        let access_token = match self.codec.sign(&claims.identity(), self.access_ttl) {
            Ok(t) => t,
            Err(e) => {
                error!(target: "auth", "access token renewal failed: {e}");
                return AuthOutcome::denied(Denial::Token(e.kind()));
            }
        };
        info!(target: "auth", username = %claims.username, "access token renewed from refresh token");

        let verdict = evaluate(requirement, &claims);
        AuthOutcome {
            verdict,
            claims: Some(claims),
            renewal: Some(Renewal { access_token, notice: RENEWAL_NOTICE }),
        }
    }
}

fn present(token: Option<&str>) -> Option<&str> {
    token.filter(|t| !t.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::{Identity, ADMIN_ROLE, REGULAR_ROLE};

    const SECRET: &str = "authority-test-secret";

    fn authority() -> SessionAuthority {
        SessionAuthority::new(TokenCodec::new(SECRET), chrono::Duration::hours(1))
    }

    fn token(identity: &Identity, ttl: chrono::Duration) -> String {
        TokenCodec::new(SECRET).sign(identity, ttl).unwrap()
    }

    fn tester() -> Identity { Identity::new("tester", "t@test.com", REGULAR_ROLE) }

    #[test]
    fn evaluate_dispatches_on_requirement() {
        let claims = SessionClaims::new(&tester(), chrono::Duration::hours(1));
        assert_eq!(evaluate(&AuthRequirement::Simple, &claims), AuthVerdict::Allowed);
        assert_eq!(evaluate(&AuthRequirement::user("tester"), &claims), AuthVerdict::Allowed);
        assert_eq!(evaluate(&AuthRequirement::user("other"), &claims), AuthVerdict::Denied(Denial::DifferentUser));
        assert_eq!(evaluate(&AuthRequirement::Admin, &claims), AuthVerdict::Denied(Denial::DifferentRole));
        assert_eq!(evaluate(&AuthRequirement::group(["t@test.com"]), &claims), AuthVerdict::Allowed);
        assert_eq!(evaluate(&AuthRequirement::group(["x@test.com"]), &claims), AuthVerdict::Denied(Denial::NotInGroup));
    }

    #[test]
    fn empty_cookie_counts_as_missing() {
        let refresh = token(&tester(), chrono::Duration::days(7));
        let out = authority().verify(Some(""), Some(&refresh), &AuthRequirement::Simple);
        assert_eq!(out.verdict, AuthVerdict::Denied(Denial::MissingCredentials));
        assert_eq!(out.cause(), "Unauthorized");
    }

    #[test]
    fn valid_pair_reports_access_claims() {
        let identity = tester().with_id("7");
        let access = token(&identity, chrono::Duration::hours(1));
        let refresh = token(&identity, chrono::Duration::days(7));
        let out = authority().verify(Some(&access), Some(&refresh), &AuthRequirement::Simple);
        assert_eq!(out.verdict, AuthVerdict::Allowed);
        assert_eq!(out.cause(), "Authorized");
        assert_eq!(out.claims.map(|c| c.identity()), Some(identity));
        assert!(out.renewal.is_none());
    }

    #[test]
    fn renewed_token_carries_refresh_identity() {
        let identity = Identity::new("boss", "boss@test.com", ADMIN_ROLE).with_id("1");
        let access = token(&identity, chrono::Duration::hours(-2));
        let refresh = token(&identity, chrono::Duration::days(7));
        let out = authority().verify(Some(&access), Some(&refresh), &AuthRequirement::Admin);
        assert_eq!(out.verdict, AuthVerdict::Allowed);
        let renewal = out.renewal.expect("renewal emitted");
        assert_eq!(renewal.notice, RENEWAL_NOTICE);
        let renewed = TokenCodec::new(SECRET).decode(&renewal.access_token).unwrap();
        assert_eq!(renewed.identity(), identity);
    }

    #[test]
    fn expired_refresh_with_valid_access_is_not_renewed() {
        let access = token(&tester(), chrono::Duration::hours(1));
        let refresh = token(&tester(), chrono::Duration::hours(-1));
        let out = authority().verify(Some(&access), Some(&refresh), &AuthRequirement::Simple);
        assert_eq!(out.cause(), "TokenExpiredError");
        assert!(out.renewal.is_none());
    }

    #[test]
    fn forged_refresh_during_renewal_is_refused() {
        let access = token(&tester(), chrono::Duration::hours(-1));
        let forged = TokenCodec::new("someone-else").sign(&tester(), chrono::Duration::days(7)).unwrap();
        let out = authority().verify(Some(&access), Some(&forged), &AuthRequirement::Simple);
        assert_eq!(out.cause(), "JsonWebTokenError");
        assert!(out.renewal.is_none());
    }

    #[test]
    fn renewal_requires_complete_refresh_claims() {
        let blank = Identity::new("", "", "");
        let access = token(&blank, chrono::Duration::hours(-1));
        let refresh = token(&blank, chrono::Duration::days(7));
        let out = authority().verify(Some(&access), Some(&refresh), &AuthRequirement::Simple);
        assert_eq!(out.verdict, AuthVerdict::Denied(Denial::IncompleteClaims));
        assert!(out.claims.is_none());
        assert!(out.renewal.is_none());
    }

    #[test]
    fn unknown_descriptor_wins_over_missing_cookies() {
        let d = RequirementDescriptor { auth_type: "Owner".into(), ..Default::default() };
        let out = authority().verify_descriptor(None, None, &d);
        assert_eq!(out.cause(), "Wrong authType inserted");
    }
}
