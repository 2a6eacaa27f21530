//! Runtime configuration from environment variables, with CLI flags taking precedence.
//!
//! - `EXPENSE_HTTP_PORT` / `--port`: HTTP port (default 3000)
//! - `ACCESS_KEY`: token signing secret (required)
//! - `EXPENSE_ACCESS_TTL_SECS`: access token lifetime (default 1 hour)
//! - `EXPENSE_REFRESH_TTL_SECS`: refresh token lifetime (default 7 days)

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_HTTP_PORT: u16 = 3000;
pub const DEFAULT_ACCESS_TTL_SECS: i64 = 60 * 60;
pub const DEFAULT_REFRESH_TTL_SECS: i64 = 7 * 24 * 60 * 60;

#[derive(Clone)]
pub struct AppConfig {
    pub http_port: u16,
    pub secret: String,
    pub access_ttl: chrono::Duration,
    pub refresh_ttl: chrono::Duration,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("http_port", &self.http_port)
            .field("secret", &"<redacted>")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish()
    }
}

impl AppConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            http_port: DEFAULT_HTTP_PORT,
            secret: secret.into(),
            access_ttl: chrono::Duration::seconds(DEFAULT_ACCESS_TTL_SECS),
            refresh_ttl: chrono::Duration::seconds(DEFAULT_REFRESH_TTL_SECS),
        }
    }

    pub fn from_env(args: &[String]) -> Result<Self> {
        Self::from_sources(|k| std::env::var(k).ok(), args)
    }

    pub fn from_sources(env: impl Fn(&str) -> Option<String>, args: &[String]) -> Result<Self> {
        let secret = env("ACCESS_KEY")
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| anyhow!("ACCESS_KEY must be set to a non-empty signing secret"))?;

        let env_port = match env("EXPENSE_HTTP_PORT") {
            Some(v) => Some(v.parse::<u16>().with_context(|| format!("EXPENSE_HTTP_PORT is not a port: {v}"))?),
            None => None,
        };
        let arg_port = match flag_value(args, "--port") {
            Some(v) => Some(v.parse::<u16>().with_context(|| format!("--port is not a port: {v}"))?),
            None => None,
        };

        let access_ttl = ttl_secs(&env, "EXPENSE_ACCESS_TTL_SECS", DEFAULT_ACCESS_TTL_SECS)?;
        let refresh_ttl = ttl_secs(&env, "EXPENSE_REFRESH_TTL_SECS", DEFAULT_REFRESH_TTL_SECS)?;
        if refresh_ttl <= access_ttl {
            return Err(anyhow!("refresh token lifetime must exceed the access token lifetime"));
        }

        Ok(Self {
            http_port: arg_port.or(env_port).unwrap_or(DEFAULT_HTTP_PORT),
            secret,
            access_ttl: chrono::Duration::seconds(access_ttl),
            refresh_ttl: chrono::Duration::seconds(refresh_ttl),
        })
    }
}

fn ttl_secs(env: &impl Fn(&str) -> Option<String>, name: &str, default: i64) -> Result<i64> {
    let Some(v) = env(name) else { return Ok(default) };
    let secs = v.parse::<i64>().with_context(|| format!("{name} is not a number of seconds: {v}"))?;
    if secs <= 0 {
        return Err(anyhow!("{name} must be positive"));
    }
    Ok(secs)
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter().position(|a| a == flag).and_then(|i| args.get(i + 1)).map(String::as_str)
}
