//! Session issuance and revocation. All cross-request state lives in the
//! injected register; the manager itself holds nothing mutable.

use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use super::liveness::LivenessRegister;
use super::token::TokenCodec;

pub struct SessionManager {
    codec: TokenCodec,
    register: Arc<dyn LivenessRegister>,
}

impl SessionManager {
    pub fn new(codec: TokenCodec, register: Arc<dyn LivenessRegister>) -> Self {
        Self { codec, register }
    }

    pub fn codec(&self) -> &TokenCodec { &self.codec }
    pub fn register(&self) -> &Arc<dyn LivenessRegister> { &self.register }

    /// Issue a token for the identity and record it as the single live
    /// session. A re-issue overwrites the register slot, so the previous
    /// token stops being live even though its signature stays valid.
    pub async fn issue(&self, identity: &str) -> Result<String> {
        let token = self.codec.encode(identity)?;
        self.register.put(identity, &token, self.codec.register_ttl()).await?;
        info!(identity, "session issued");
        Ok(token)
    }

    /// Drop the identity's live session, if any. Idempotent at the register
    /// level; whether a principal existed to revoke is the caller's check.
    pub async fn revoke(&self, identity: &str) -> Result<()> {
        self.register.delete(identity).await?;
        info!(identity, "session revoked");
        Ok(())
    }

    /// True iff the presented token is exactly the one the register attests
    /// for this identity.
    pub async fn is_live(&self, identity: &str, token: &str) -> bool {
        matches!(self.register.get(identity).await, Some(ref live) if live == token)
    }
}
