//! Per-request authentication decision. Runs once per inbound request as
//! axum middleware, attaches an `AuthOutcome` to the request extensions and
//! always lets the request continue; downstream handlers decide whether
//! anonymous is acceptable. Every rejection branch logs its own reason, and
//! none of them can abort the pipeline.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

use crate::server::AppState;

use super::account::AccountService;
use super::principal::{AuthOutcome, Principal};
use super::token::TokenError;

const BEARER_PREFIX: &str = "Bearer ";

/// Extract the bearer token from the Authorization header. A missing header
/// or wrong prefix is not a parse error, just an anonymous request.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix(BEARER_PREFIX))
        .filter(|t| !t.is_empty())
}

/// The authentication state machine, terminal states
/// `Authenticated(principal)` and `Anonymous`.
pub async fn resolve_outcome(accounts: &AccountService, headers: &HeaderMap) -> AuthOutcome {
    let Some(token) = bearer_token(headers) else {
        debug!("no bearer token; request continues as anonymous");
        return AuthOutcome::Anonymous;
    };

    let codec = accounts.sessions.codec();
    let claims = match codec.decode(token) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            // Routine: the embedded expiry is authoritative even while the
            // register entry is still ticking down its TTL.
            debug!("expired token presented; request continues as anonymous");
            return AuthOutcome::Anonymous;
        }
        Err(e) => {
            warn!(reason = %e, "rejected bearer token; request continues as anonymous");
            return AuthOutcome::Anonymous;
        }
    };

    let user = match accounts.users.find_by_email(&claims.sub).await {
        Ok(Some(user)) => user,
        Ok(None) => {
            warn!(subject = %claims.sub, "token subject has no user record");
            return AuthOutcome::Anonymous;
        }
        Err(e) => {
            warn!(subject = %claims.sub, error = %e, "user lookup failed during authentication");
            return AuthOutcome::Anonymous;
        }
    };

    // Liveness: the register must attest this exact token string. A register
    // that is down attests nothing (fail closed).
    if !accounts.sessions.is_live(&claims.sub, token).await {
        warn!(subject = %claims.sub, "token is not the live session (superseded, revoked or register-expired)");
        return AuthOutcome::Anonymous;
    }

    debug!(subject = %claims.sub, "request authenticated");
    AuthOutcome::Authenticated(Principal {
        email: user.email,
        name: user.name,
        role: user.role,
    })
}

/// Middleware entry point. Idempotent: an outcome already attached to the
/// request (e.g. by an outer layer) is left untouched.
pub async fn authenticate_request(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    if req.extensions().get::<AuthOutcome>().is_none() {
        let outcome = resolve_outcome(&state.accounts, req.headers()).await;
        req.extensions_mut().insert(outcome);
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with_auth(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn bearer_extraction() {
        assert_eq!(bearer_token(&headers_with_auth("Bearer abc.def.ghi")), Some("abc.def.ghi"));
        assert_eq!(bearer_token(&headers_with_auth("bearer abc")), None); // prefix is case-sensitive
        assert_eq!(bearer_token(&headers_with_auth("Basic dXNlcjpwdw==")), None);
        assert_eq!(bearer_token(&headers_with_auth("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
