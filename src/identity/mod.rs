//! Identity core: principals, signed tokens, the liveness register, session
//! issuance/revocation and the per-request authenticator.
//! Keep the public surface thin and split implementation across sub-modules.

mod account;
mod authenticator;
mod liveness;
mod principal;
mod session;
mod token;

pub use account::{AccountService, UserSummary};
pub use authenticator::{authenticate_request, bearer_token, resolve_outcome};
pub use liveness::{LivenessRegister, MemoryRegister, RedisRegister};
pub use principal::{AuthOutcome, Principal, Role};
pub use session::SessionManager;
pub use token::{Claims, TokenCodec, TokenError};
