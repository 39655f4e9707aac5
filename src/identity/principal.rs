use serde::{Deserialize, Serialize};

/// Closed role set. Unrecognised input deliberately falls back to `Customer`
/// instead of rejecting the request; see `parse_lenient`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    Customer,
}

impl Role {
    /// Case-insensitive parse with a permissive default. This mirrors the
    /// sign-up flow: an unknown role tag registers the user as a customer.
    pub fn parse_lenient(s: &str) -> Role {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "customer" => Role::Customer,
            _ => Role::Customer,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Customer => "customer",
        }
    }
}

/// Authenticated user context attached to a request. Built per request by the
/// authenticator, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub email: String,
    pub name: String,
    pub role: Role,
}

/// Terminal result of the per-request authentication decision.
/// A tagged union rather than `Option<Principal>` so downstream code cannot
/// confuse "not yet decided" with "decided: anonymous".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Authenticated(Principal),
    Anonymous,
}

impl AuthOutcome {
    pub fn principal(&self) -> Option<&Principal> {
        match self {
            AuthOutcome::Authenticated(p) => Some(p),
            AuthOutcome::Anonymous => None,
        }
    }

    pub fn is_authenticated(&self) -> bool { matches!(self, AuthOutcome::Authenticated(_)) }
}
