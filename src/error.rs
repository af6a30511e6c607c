use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use sqlx::Error as SqlxError;
use thiserror::Error as ThisError;

#[derive(Debug, ThisError)]
pub enum DashboardError {
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Database unreachable: {0}")]
    Connectivity(String),

    #[error("No pooled connection became available in time")]
    PoolExhausted,

    #[error("Not connected to the database; log in first")]
    NotConnected,

    #[error("Database error: {0}")]
    Statement(#[from] SqlxError),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),
}

impl DashboardError {
    /// Message shown to the dashboard user, derived from the driver error where there is one.
    pub fn user_message(&self) -> String {
        match self {
            DashboardError::Statement(SqlxError::Database(db)) => db.message().to_string(),
            other => other.to_string(),
        }
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            DashboardError::Authentication(_) => (StatusCode::UNAUTHORIZED, "AUTHENTICATION_FAILED"),
            DashboardError::NotConnected => (StatusCode::UNAUTHORIZED, "NOT_CONNECTED"),
            DashboardError::Connectivity(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "DATABASE_UNREACHABLE")
            }
            DashboardError::PoolExhausted => (StatusCode::SERVICE_UNAVAILABLE, "POOL_EXHAUSTED"),
            DashboardError::Statement(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
            DashboardError::InvalidConfig(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            DashboardError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            DashboardError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            DashboardError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
        }
    }
}

impl IntoResponse for DashboardError {
    fn into_response(self) -> axum::response::Response {
        let (status, code) = self.status_and_code();
        let message = match &self {
            DashboardError::InvalidConfig(_) => "An internal server error occurred.".to_string(),
            other => other.user_message(),
        };
        if status.is_server_error() {
            tracing::error!(code, error = %self, "request failed");
        }
        let body = ApiErrorBody {
            code: code.to_string(),
            message,
        };
        (status, Json(ApiErrorResponse { error: body })).into_response()
    }
}

/// Standardized API error response body
#[derive(Serialize)]
pub struct ApiErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Serialize)]
pub struct ApiErrorResponse {
    pub error: ApiErrorBody,
}
