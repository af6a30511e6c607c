use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::sync::Arc;

use super::session::CurrentSession;
use crate::db::DbSession;
use crate::error::DashboardError;

/// Guard for data pages: the session must hold a live pool and a logged-in identity.
pub struct RequireConnected {
    pub session: Arc<DbSession>,
    pub identity: String,
}

impl<S> FromRequestParts<S> for RequireConnected
where
    S: Send + Sync,
{
    type Rejection = DashboardError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let CurrentSession(session) = CurrentSession::from_request_parts(parts, state).await?;
        let identity = session.require_identity().await?;
        Ok(Self { session, identity })
    }
}
