//! Environment-driven configuration.
//! The signing secret is only syntax-checked here; decoding it (and failing
//! the boot when it is not valid base64) happens in `TokenCodec::new`.

use anyhow::{Context, Result, anyhow};
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// Base64-encoded HMAC key material for token signing.
    pub secret_b64: String,
    /// Lifetime of an issued token; also the liveness register TTL.
    pub token_ttl: Duration,
    pub http_port: u16,
    /// Redis URL for the shared liveness register. When absent the in-process
    /// register is used (single-node deployments and tests).
    pub redis_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let secret_b64 = std::env::var("TURNSTILE_SECRET_KEY")
            .map_err(|_| anyhow!("TURNSTILE_SECRET_KEY is not set; refusing to start without a signing secret"))?;
        let ttl_ms: u64 = match std::env::var("TURNSTILE_TOKEN_TTL_MS") {
            Ok(v) => v.parse().with_context(|| format!("TURNSTILE_TOKEN_TTL_MS is not a number: '{}'", v))?,
            Err(_) => 3_600_000,
        };
        let http_port: u16 = match std::env::var("TURNSTILE_HTTP_PORT") {
            Ok(v) => v.parse().with_context(|| format!("TURNSTILE_HTTP_PORT is not a port: '{}'", v))?,
            Err(_) => 7878,
        };
        let redis_url = std::env::var("TURNSTILE_REDIS_URL").ok();
        Ok(Self { secret_b64, token_ttl: Duration::from_millis(ttl_ms), http_port, redis_url })
    }
}
