use axum::Json;
use axum::http::StatusCode;
use chrono::Local;

use crate::error::DashboardError;
use crate::middleware::auth::RequireConnected;
use crate::service::batches;
use crate::types::forms::RegisterBatchRequest;
use crate::types::supply::{BatchFormOptions, ExpiredBatch, RegisteredBatch};

/// GET /api/batches/form
pub async fn batch_form(
    RequireConnected { session, .. }: RequireConnected,
) -> Result<Json<BatchFormOptions>, DashboardError> {
    let mut conn = session.acquire().await?;
    Ok(Json(batches::batch_form(&mut conn).await?))
}

/// POST /api/batches
pub async fn register_batch(
    RequireConnected { session, .. }: RequireConnected,
    Json(req): Json<RegisterBatchRequest>,
) -> Result<(StatusCode, Json<RegisteredBatch>), DashboardError> {
    let mut conn = session.acquire().await?;
    let today = Local::now().date_naive();
    let registered = batches::register_batch(&mut conn, &req, today).await?;
    Ok((StatusCode::CREATED, Json(registered)))
}

/// GET /api/batches/expired
pub async fn expired_batches(
    RequireConnected { session, .. }: RequireConnected,
) -> Result<Json<Vec<ExpiredBatch>>, DashboardError> {
    let mut conn = session.acquire().await?;
    let today = Local::now().date_naive();
    Ok(Json(batches::expired_batches(&mut conn, today).await?))
}
