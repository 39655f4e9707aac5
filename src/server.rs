//!
//! turnstile HTTP server
//! ---------------------
//! Axum-based HTTP API for the account/session service.
//!
//! Responsibilities:
//! - Sign-up, login, logout and current-user endpoints under /api/account.
//! - Bearer-token authentication middleware on every route; handlers receive
//!   the request's `AuthOutcome` from the extensions.
//! - State wiring: token codec (fails the boot on a bad signing secret),
//!   liveness register selection (redis when configured, in-process
//!   otherwise) and the user store.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Extension, Json, Router, extract::State, middleware};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::config::Config;
use crate::error::AppError;
use crate::identity::{
    AccountService, AuthOutcome, LivenessRegister, MemoryRegister, RedisRegister, SessionManager,
    TokenCodec, authenticate_request,
};
use crate::users::{MemoryUserStore, UserStore};

/// Shared server state injected into all handlers and the auth middleware.
#[derive(Clone)]
pub struct AppState {
    pub accounts: Arc<AccountService>,
}

/// Build the full application state from configuration. A signing secret
/// that does not decode fails here, before anything is bound.
pub fn build_state(config: &Config) -> anyhow::Result<AppState> {
    let lifetime = chrono::Duration::from_std(config.token_ttl)?;
    let codec = TokenCodec::new(&config.secret_b64, lifetime)?;
    let register: Arc<dyn LivenessRegister> = match &config.redis_url {
        Some(url) => {
            info!(url = %url, "using redis liveness register");
            Arc::new(RedisRegister::new(url)?)
        }
        None => {
            info!("no redis url configured; using in-process liveness register");
            Arc::new(MemoryRegister::new())
        }
    };
    let users: Arc<dyn UserStore> = Arc::new(MemoryUserStore::new());
    let sessions = Arc::new(SessionManager::new(codec, register));
    Ok(AppState { accounts: Arc::new(AccountService::new(users, sessions)) })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(|| async { "turnstile ok" }))
        .route("/api/account/user", post(register_user))
        .route("/api/account/login", post(login))
        .route("/api/account/logout", post(logout))
        .route("/api/account/me", get(me))
        .layer(middleware::from_fn_with_state(state.clone(), authenticate_request))
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    run_with_config(config).await
}

pub async fn run_with_config(config: Config) -> anyhow::Result<()> {
    let state = build_state(&config)?;
    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RegisterPayload {
    name: String,
    email: String,
    #[serde(default)]
    role: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct LoginPayload {
    email: String,
    password: String,
}

async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    state
        .accounts
        .register(&payload.name, &payload.email, &payload.role, &payload.password)
        .await?;
    Ok((StatusCode::OK, Json(json!({"success": true}))))
}

async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginPayload>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let token = state.accounts.login(&payload.email, &payload.password).await?;
    Ok((StatusCode::OK, Json(json!({"token": token}))))
}

async fn logout(
    State(state): State<AppState>,
    Extension(outcome): Extension<AuthOutcome>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    state.accounts.logout(&outcome).await?;
    Ok((StatusCode::OK, Json(json!({"success": true}))))
}

// Anonymous requests get a JSON null body, not an error.
async fn me(
    State(state): State<AppState>,
    Extension(outcome): Extension<AuthOutcome>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    let summary = state.accounts.current_user(&outcome).await?;
    let body = serde_json::to_value(&summary).unwrap_or(serde_json::Value::Null);
    Ok((StatusCode::OK, Json(body)))
}
