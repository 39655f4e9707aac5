use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Init logging
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    fmt().with_env_filter(filter).init();

    // Startup banner at info level so something always prints at default verbosity
    let rust_log = std::env::var("RUST_LOG").unwrap_or_else(|_| "<unset>".to_string());
    let http_port = std::env::var("TURNSTILE_HTTP_PORT").unwrap_or_else(|_| "7878".to_string());
    let ttl_ms = std::env::var("TURNSTILE_TOKEN_TTL_MS").unwrap_or_else(|_| "3600000".to_string());
    let redis_url = std::env::var("TURNSTILE_REDIS_URL").unwrap_or_else(|_| "<unset>".to_string());
    info!(
        target: "turnstile",
        "Turnstile starting: RUST_LOG='{}', http_port={}, token_ttl_ms={}, redis_url='{}'",
        rust_log, http_port, ttl_ms, redis_url
    );

    turnstile::server::run().await
}
