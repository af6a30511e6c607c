use axum::Json;
use axum::extract::Path;

use crate::error::DashboardError;
use crate::middleware::auth::RequireConnected;
use crate::service::deliveries;
use crate::types::forms::AssignDeliveryRequest;
use crate::types::supply::{
    AssignedDelivery, ChiefOption, DeliveryTeams, PendingOrder, TeamDeliveries,
};

/// GET /api/deliveries/pending
pub async fn pending_orders(
    RequireConnected { session, .. }: RequireConnected,
) -> Result<Json<Vec<PendingOrder>>, DashboardError> {
    let mut conn = session.acquire().await?;
    Ok(Json(deliveries::pending_orders(&mut conn).await?))
}

/// GET /api/deliveries/{order_id}/teams
pub async fn delivery_teams(
    RequireConnected { session, .. }: RequireConnected,
    Path(order_id): Path<i64>,
) -> Result<Json<DeliveryTeams>, DashboardError> {
    let mut conn = session.acquire().await?;
    Ok(Json(deliveries::delivery_teams(&mut conn, order_id).await?))
}

/// POST /api/deliveries
pub async fn assign_delivery(
    RequireConnected { session, .. }: RequireConnected,
    Json(req): Json<AssignDeliveryRequest>,
) -> Result<Json<AssignedDelivery>, DashboardError> {
    let mut conn = session.acquire().await?;
    Ok(Json(deliveries::assign_delivery(&mut conn, &req).await?))
}

/// GET /api/chiefs
pub async fn chiefs(
    RequireConnected { session, .. }: RequireConnected,
) -> Result<Json<Vec<ChiefOption>>, DashboardError> {
    let mut conn = session.acquire().await?;
    Ok(Json(deliveries::chiefs(&mut conn).await?))
}

/// GET /api/chiefs/{tax_code}/deliveries
pub async fn team_deliveries(
    RequireConnected { session, .. }: RequireConnected,
    Path(tax_code): Path<String>,
) -> Result<Json<TeamDeliveries>, DashboardError> {
    let mut conn = session.acquire().await?;
    Ok(Json(deliveries::team_deliveries(&mut conn, &tax_code).await?))
}
