//! Cookie transport for session tokens.
//!
//! Tokens travel in the `accessToken` / `refreshToken` cookies, scoped to `/api`,
//! `HttpOnly`, `Secure` and `SameSite=None`.

use axum::http::{header, HeaderMap, HeaderValue};

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";
pub const COOKIE_PATH: &str = "/api";

/// Value of the cookie `name` from the request `Cookie` header(s).
pub fn parse_cookie(headers: &HeaderMap, name: &str) -> Option<String> {
    for value in headers.get_all(header::COOKIE) {
        let Ok(s) = value.to_str() else { continue };
        for part in s.split(';') {
            if let Some((k, v)) = part.trim().split_once('=') {
                if k == name { return Some(v.to_string()); }
            }
        }
    }
    None
}

/// The (access, refresh) pair as sent by the client; either may be absent.
pub fn session_tokens(headers: &HeaderMap) -> (Option<String>, Option<String>) {
    (parse_cookie(headers, ACCESS_COOKIE), parse_cookie(headers, REFRESH_COOKIE))
}

fn session_cookie(name: &str, value: &str, max_age_secs: i64) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; HttpOnly; Path={}; Max-Age={}; SameSite=None; Secure",
        name, value, COOKIE_PATH, max_age_secs.max(0)
    ))
    .ok()
}

pub fn access_cookie(token: &str, ttl: chrono::Duration) -> Option<HeaderValue> {
    session_cookie(ACCESS_COOKIE, token, ttl.num_seconds())
}

pub fn refresh_cookie(token: &str, ttl: chrono::Duration) -> Option<HeaderValue> {
    session_cookie(REFRESH_COOKIE, token, ttl.num_seconds())
}

/// Expire both session cookies.
pub fn clear_session_cookies(headers: &mut HeaderMap) {
    for name in [ACCESS_COOKIE, REFRESH_COOKIE] {
        if let Some(v) = session_cookie(name, "", 0) {
            headers.append(header::SET_COOKIE, v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_named_cookie_among_others() {
        let mut h = HeaderMap::new();
        h.insert(header::COOKIE, HeaderValue::from_static("theme=dark; accessToken=a.b.c; refreshToken=d.e.f"));
        assert_eq!(parse_cookie(&h, ACCESS_COOKIE).as_deref(), Some("a.b.c"));
        assert_eq!(session_tokens(&h), (Some("a.b.c".into()), Some("d.e.f".into())));
        assert_eq!(parse_cookie(&h, "missing"), None);
    }

    #[test]
    fn reads_cookies_split_across_headers() {
        let mut h = HeaderMap::new();
        h.append(header::COOKIE, HeaderValue::from_static("accessToken=x"));
        h.append(header::COOKIE, HeaderValue::from_static("refreshToken=y"));
        assert_eq!(session_tokens(&h), (Some("x".into()), Some("y".into())));
    }

    #[test]
    fn access_cookie_attributes() {
        let v = access_cookie("tok", chrono::Duration::hours(1)).unwrap();
        assert_eq!(v.to_str().unwrap(), "accessToken=tok; HttpOnly; Path=/api; Max-Age=3600; SameSite=None; Secure");
    }

    #[test]
    fn clearing_expires_both_cookies() {
        let mut h = HeaderMap::new();
        clear_session_cookies(&mut h);
        let values: Vec<_> = h.get_all(header::SET_COOKIE).iter().map(|v| v.to_str().unwrap().to_string()).collect();
        assert_eq!(values.len(), 2);
        assert!(values.iter().all(|v| v.contains("Max-Age=0")));
    }
}
