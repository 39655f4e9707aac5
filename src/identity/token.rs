//! Signed session tokens (HS256). A token's cryptographic validity is
//! decided here; whether it is still the sanctioned token for its subject is
//! the liveness register's call, not the codec's.

use anyhow::{Context, Result};
use base64::Engine;
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    /// Well-formed, correctly signed, past its embedded expiry. Routine;
    /// callers log this at lower severity than a forgery.
    #[error("token expired")]
    Expired,
    #[error("token signature invalid")]
    InvalidSignature,
    #[error("token malformed")]
    Malformed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    /// Seconds since epoch.
    pub iat: i64,
    pub exp: i64,
    /// Random per-issue id. Claim timestamps have one-second granularity, so
    /// without this two issues in the same second would mint identical
    /// tokens and the older one would remain live.
    pub jti: String,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

pub struct TokenCodec {
    encoding: EncodingKey,
    decoding: DecodingKey,
    lifetime: Duration,
    validation: Validation,
}

impl TokenCodec {
    /// Build the codec from base64 key material. A secret that does not
    /// decode is a configuration error and fails the server boot.
    pub fn new(secret_b64: &str, lifetime: Duration) -> Result<Self> {
        let key_bytes = base64::engine::general_purpose::STANDARD
            .decode(secret_b64.trim())
            .context("signing secret is not valid base64")?;
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry must be exact: register TTL and embedded exp are meant to
        // agree, and the embedded timestamp is the authoritative one.
        validation.leeway = 0;
        Ok(Self {
            encoding: EncodingKey::from_secret(&key_bytes),
            decoding: DecodingKey::from_secret(&key_bytes),
            lifetime,
            validation,
        })
    }

    pub fn lifetime(&self) -> Duration { self.lifetime }

    /// Token lifetime as the TTL to hand to the liveness register.
    /// Clamped at zero; a non-positive lifetime only occurs in tests.
    pub fn register_ttl(&self) -> std::time::Duration {
        self.lifetime.to_std().unwrap_or_default()
    }

    pub fn encode(&self, subject: &str) -> Result<String> {
        self.encode_with_claims(subject, serde_json::Map::new())
    }

    pub fn encode_with_claims(
        &self,
        subject: &str,
        extra: serde_json::Map<String, serde_json::Value>,
    ) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: subject.to_string(),
            iat: now.timestamp(),
            exp: (now + self.lifetime).timestamp(),
            jti: uuid::Uuid::new_v4().to_string(),
            extra,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .context("failed to sign token")
    }

    /// Verify and decode. Expiry is a distinct recoverable condition, never
    /// conflated with a signature failure.
    pub fn decode(&self, token: &str) -> Result<Claims, TokenError> {
        match jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation) {
            Ok(data) => Ok(data.claims),
            Err(e) => Err(match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => TokenError::Expired,
                jsonwebtoken::errors::ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                _ => TokenError::Malformed,
            }),
        }
    }

    /// Best-effort subject extraction for lookup/logging paths. Swallows all
    /// decode failures; a malformed token must not abort the filter chain.
    pub fn extract_subject(&self, token: &str) -> Option<String> {
        self.decode(token).ok().map(|c| c.sub)
    }
}
