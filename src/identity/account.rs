//! Account operations: registration, login, logout, current-user. These sit
//! behind the HTTP handlers and own the user store + session manager.

use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::AppError;
use crate::security;
use crate::users::{NewUser, UserStore};

use super::principal::{AuthOutcome, Role};
use super::session::SessionManager;

/// Body of the current-user endpoint: identity, display name and role tag.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserSummary {
    pub email: String,
    pub name: String,
    pub role: String,
}

pub struct AccountService {
    pub users: Arc<dyn UserStore>,
    pub sessions: Arc<SessionManager>,
}

impl AccountService {
    pub fn new(users: Arc<dyn UserStore>, sessions: Arc<SessionManager>) -> Self {
        Self { users, sessions }
    }

    /// Sign-up. Duplicate email is a conflict and performs no write; an
    /// unknown role tag falls back to customer rather than rejecting.
    pub async fn register(&self, name: &str, email: &str, role: &str, password: &str) -> Result<(), AppError> {
        if email.trim().is_empty() || password.is_empty() {
            return Err(AppError::user("bad_input", "email and password are required"));
        }
        if self.users.find_by_email(email).await.map_err(AppError::from)?.is_some() {
            return Err(AppError::conflict("duplicate_identity", "user already exists"));
        }
        let password_hash = security::hash_password(password).map_err(AppError::from)?;
        let record = self
            .users
            .save(NewUser {
                email: email.to_string(),
                name: name.to_string(),
                password_hash,
                role: Role::parse_lenient(role),
            })
            .await
            .map_err(AppError::from)?;
        info!(email = %record.email, role = record.role.as_str(), "user registered");
        Ok(())
    }

    /// Login. Unknown email and wrong password collapse into one credential
    /// error; neither issues a token nor touches the register.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AppError> {
        let Some(user) = self.users.find_by_email(email).await.map_err(AppError::from)? else {
            warn!(email, "login rejected: unknown user");
            return Err(AppError::auth("bad_credentials", "invalid email or password"));
        };
        if !security::verify_password(&user.password_hash, password) {
            warn!(email, "login rejected: wrong password");
            return Err(AppError::auth("bad_credentials", "invalid email or password"));
        }
        let token = self.sessions.issue(&user.email).await.map_err(|e| {
            AppError::Io { code: "register_unreachable".into(), message: e.to_string() }
        })?;
        Ok(token)
    }

    /// Logout needs a principal from the request authenticator; without one
    /// there is no session to revoke.
    pub async fn logout(&self, outcome: &AuthOutcome) -> Result<(), AppError> {
        let Some(principal) = outcome.principal() else {
            return Err(AppError::not_found("no_active_session", "no session to revoke"));
        };
        self.sessions.revoke(&principal.email).await.map_err(|e| {
            AppError::Io { code: "register_unreachable".into(), message: e.to_string() }
        })
    }

    /// Current-user view: None for anonymous requests.
    pub async fn current_user(&self, outcome: &AuthOutcome) -> Result<Option<UserSummary>, AppError> {
        let Some(principal) = outcome.principal() else { return Ok(None) };
        let Some(user) = self.users.find_by_email(&principal.email).await.map_err(AppError::from)? else {
            // Authenticated principal whose record vanished mid-request.
            return Ok(None);
        };
        Ok(Some(UserSummary {
            email: user.email,
            name: user.name,
            role: user.role.as_str().to_string(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{MemoryRegister, Principal, TokenCodec};
    use crate::users::MemoryUserStore;

    fn service() -> AccountService {
        let codec = TokenCodec::new("dGVzdC1rZXktZm9yLWFjY291bnQtc2VydmljZQ==", chrono::Duration::hours(1)).unwrap();
        let sessions = Arc::new(SessionManager::new(codec, Arc::new(MemoryRegister::new())));
        AccountService::new(Arc::new(MemoryUserStore::new()), sessions)
    }

    #[tokio::test]
    async fn duplicate_registration_conflicts_and_writes_nothing() {
        let svc = service();
        svc.register("a", "a@x.com", "customer", "pw").await.unwrap();
        let err = svc.register("other", "a@x.com", "admin", "pw2").await.unwrap_err();
        assert_eq!(err.http_status(), 409);
        // Original record untouched
        let rec = svc.users.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(rec.name, "a");
        assert_eq!(rec.role, Role::Customer);
    }

    #[tokio::test]
    async fn register_defaults_unknown_role_to_customer() {
        let svc = service();
        svc.register("a", "a@x.com", "warlord", "pw").await.unwrap();
        let rec = svc.users.find_by_email("a@x.com").await.unwrap().unwrap();
        assert_eq!(rec.role, Role::Customer);
    }

    #[tokio::test]
    async fn wrong_password_issues_no_token_and_no_register_entry() {
        let svc = service();
        svc.register("a", "a@x.com", "customer", "pw").await.unwrap();
        let err = svc.login("a@x.com", "wrong").await.unwrap_err();
        assert_eq!(err.http_status(), 401);
        assert_eq!(svc.sessions.register().get("a@x.com").await, None);
    }

    #[tokio::test]
    async fn unknown_user_login_is_the_same_credential_error() {
        let svc = service();
        let err = svc.login("ghost@x.com", "pw").await.unwrap_err();
        assert_eq!(err.http_status(), 401);
    }

    #[tokio::test]
    async fn logout_without_principal_is_not_found() {
        let svc = service();
        let err = svc.logout(&AuthOutcome::Anonymous).await.unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn login_then_logout_clears_the_register() {
        let svc = service();
        svc.register("a", "a@x.com", "admin", "pw").await.unwrap();
        let token = svc.login("a@x.com", "pw").await.unwrap();
        assert!(svc.sessions.is_live("a@x.com", &token).await);
        let outcome = AuthOutcome::Authenticated(Principal {
            email: "a@x.com".into(),
            name: "a".into(),
            role: Role::Admin,
        });
        svc.logout(&outcome).await.unwrap();
        assert!(!svc.sessions.is_live("a@x.com", &token).await);
    }

    #[tokio::test]
    async fn current_user_is_none_for_anonymous() {
        let svc = service();
        assert_eq!(svc.current_user(&AuthOutcome::Anonymous).await.unwrap(), None);
    }

    #[tokio::test]
    async fn current_user_reports_identity_name_and_role_only() {
        let svc = service();
        svc.register("Ada", "a@x.com", "admin", "pw").await.unwrap();
        let outcome = AuthOutcome::Authenticated(Principal {
            email: "a@x.com".into(),
            name: "Ada".into(),
            role: Role::Admin,
        });
        let summary = svc.current_user(&outcome).await.unwrap().unwrap();
        assert_eq!(summary, UserSummary {
            email: "a@x.com".into(),
            name: "Ada".into(),
            role: "admin".into(),
        });
        // The wire shape carries exactly these three fields.
        let body = serde_json::to_value(&summary).unwrap();
        let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
        assert_eq!(keys, ["email", "name", "role"]);
    }
}
