use axum::Json;
use axum::http::StatusCode;
use chrono::Local;

use crate::error::DashboardError;
use crate::middleware::auth::RequireConnected;
use crate::service::orders;
use crate::types::forms::PlaceOrderRequest;
use crate::types::supply::{OrderFormOptions, PlacedOrder};

/// GET /api/orders/form
pub async fn order_form(
    RequireConnected { session, .. }: RequireConnected,
) -> Result<Json<OrderFormOptions>, DashboardError> {
    let mut conn = session.acquire().await?;
    Ok(Json(orders::order_form(&mut conn).await?))
}

/// POST /api/orders
pub async fn place_order(
    RequireConnected { session, .. }: RequireConnected,
    Json(req): Json<PlaceOrderRequest>,
) -> Result<(StatusCode, Json<PlacedOrder>), DashboardError> {
    let mut conn = session.acquire().await?;
    let today = Local::now().date_naive();
    let placed = orders::place_order(&mut conn, &req, today).await?;
    Ok((StatusCode::CREATED, Json(placed)))
}
