use axum::Json;
use axum::extract::Path;
use serde_json::{Value, json};

use crate::error::DashboardError;
use crate::middleware::auth::RequireConnected;
use crate::service::tables::{self, BrowseTable};
use crate::types::supply::TableView;

/// GET /api/tables
pub async fn list_tables(RequireConnected { identity, .. }: RequireConnected) -> Json<Value> {
    Json(json!({ "identity": identity, "tables": tables::table_names() }))
}

/// GET /api/tables/{name}
pub async fn browse_table(
    RequireConnected { session, .. }: RequireConnected,
    Path(name): Path<String>,
) -> Result<Json<TableView>, DashboardError> {
    let table = BrowseTable::from_name(&name)
        .ok_or_else(|| DashboardError::NotFound(format!("Unknown table `{name}`.")))?;
    let mut conn = session.acquire().await?;
    Ok(Json(tables::browse(&mut conn, table).await?))
}
