use anyhow::Context;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use expensetracker::config::AppConfig;

fn has_flag(args: &[String], flag: &str) -> bool {
    args.iter().any(|a| a == flag)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let args: Vec<String> = std::env::args().collect();
    if has_flag(&args, "--help") || has_flag(&args, "-h") {
        println!("expensetracker\n\nUSAGE:\n  expensetracker [--port N]\n\nOPTIONS:\n  --port N    HTTP API port (env: EXPENSE_HTTP_PORT, default 3000)\n\nENVIRONMENT:\n  ACCESS_KEY                 token signing secret (required)\n  EXPENSE_ACCESS_TTL_SECS    access token lifetime (default 3600)\n  EXPENSE_REFRESH_TTL_SECS   refresh token lifetime (default 604800)\n  RUST_LOG                   log filter (default info)\n");
        return Ok(());
    }

    let config = AppConfig::from_env(&args).context("invalid configuration")?;
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "startup",
        "expensetracker starting: RUST_LOG='{}', http_port={}, access_ttl_secs={}, refresh_ttl_secs={}",
        rust_log, config.http_port, config.access_ttl.num_seconds(), config.refresh_ttl.num_seconds()
    );

    expensetracker::server::run(config).await
}
