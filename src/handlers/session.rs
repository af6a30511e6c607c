use axum::Json;
use serde::Serialize;
use serde_json::{Value, json};
use sqlx::Any;
use tracing::info;

use crate::db::{Credential, IdentityListing, SessionSnapshot};
use crate::error::DashboardError;
use crate::middleware::auth::RequireConnected;
use crate::middleware::session::CurrentSession;

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub identity: String,
}

/// GET /health
pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

/// GET /api/session
pub async fn session_status(CurrentSession(session): CurrentSession) -> Json<SessionSnapshot> {
    Json(session.snapshot().await)
}

/// GET /api/identities -> candidate usernames for the login form.
pub async fn identities(CurrentSession(session): CurrentSession) -> Json<IdentityListing> {
    Json(session.list_privileged_identities().await)
}

/// POST /api/login
pub async fn login(
    CurrentSession(session): CurrentSession,
    Json(credential): Json<Credential>,
) -> Result<Json<LoginResponse>, DashboardError> {
    if credential.username().trim().is_empty() {
        return Err(DashboardError::BadRequest("Username is required.".to_string()));
    }
    let identity = session.connect(credential).await?;
    Ok(Json(LoginResponse { identity }))
}

/// POST /api/disconnect -> closes the pool but remembers who was logged in.
pub async fn disconnect(CurrentSession(session): CurrentSession) -> Json<SessionSnapshot> {
    session.disconnect().await;
    Json(session.snapshot().await)
}

/// POST /api/logout
pub async fn logout(CurrentSession(session): CurrentSession) -> Json<SessionSnapshot> {
    session.logout().await;
    info!("session logged out");
    Json(session.snapshot().await)
}

/// GET /api/sysdate -> quick round-trip to check the pool works.
pub async fn sysdate(
    RequireConnected { session, identity }: RequireConnected,
) -> Result<Json<Value>, DashboardError> {
    let mut conn = session.acquire().await?;
    let now = sqlx::query_scalar::<Any, String>("SELECT CAST(CURRENT_TIMESTAMP AS TEXT)")
        .fetch_one(&mut *conn)
        .await?;
    Ok(Json(json!({ "identity": identity, "sysdate": now })))
}
