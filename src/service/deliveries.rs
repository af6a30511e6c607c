use super::{BATCH_CENTER_SQL, placeholders};
use crate::db::ScopedConnection;
use crate::error::DashboardError;
use crate::types::forms::{AssignDeliveryRequest, DeliveryStatus};
use crate::types::supply::{
    AssignedDelivery, ChiefOption, Delivery, DeliveryTeams, PendingOrder, TeamDeliveries,
    TeamOption,
};
use sqlx::Any;
use tracing::info;

/// Pending orders that no team has picked up yet.
pub async fn pending_orders(conn: &mut ScopedConnection) -> Result<Vec<PendingOrder>, DashboardError> {
    let rows = sqlx::query_as::<Any, PendingOrder>(
        r#"SELECT order_id, delivery_status FROM batch_order
           WHERE delivery_status = $1 AND team_code IS NULL
           ORDER BY order_id"#,
    )
    .bind(DeliveryStatus::Pending.as_str())
    .fetch_all(&mut **conn)
    .await?;
    Ok(rows)
}

/// Teams serving the distribution center of the order's first batch.
pub async fn delivery_teams(
    conn: &mut ScopedConnection,
    order_id: i64,
) -> Result<DeliveryTeams, DashboardError> {
    let first_batch = sqlx::query_scalar::<Any, Option<i64>>(
        "SELECT MIN(batch_id) FROM batch_order_batch WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_one(&mut **conn)
    .await?;
    let Some(first_batch_id) = first_batch else {
        order_status(conn, order_id).await?;
        return Err(DashboardError::BadRequest(format!(
            "Order {order_id} has no batches."
        )));
    };

    let sql = format!("SELECT {BATCH_CENTER_SQL} FROM product_batch pb WHERE pb.batch_id = $1");
    let center = sqlx::query_scalar::<Any, Option<String>>(&sql)
        .bind(first_batch_id)
        .fetch_optional(&mut **conn)
        .await?
        .flatten();
    let Some(center_name) = center else {
        return Err(DashboardError::NotFound(format!(
            "Distribution center not found for batch {first_batch_id}."
        )));
    };

    let teams = sqlx::query_as::<Any, TeamOption>(
        r#"SELECT lt.team_code, lt.team_name
           FROM distribution_center dc
           JOIN logistic_team lt ON lt.team_code = dc.team_code
           WHERE dc.center_name = $1
           ORDER BY lt.team_code"#,
    )
    .bind(center_name.as_str())
    .fetch_all(&mut **conn)
    .await?;

    Ok(DeliveryTeams {
        order_id,
        first_batch_id,
        center_name,
        teams,
    })
}

/// Hand a pending, unassigned order to one of the teams serving it.
pub async fn assign_delivery(
    conn: &mut ScopedConnection,
    req: &AssignDeliveryRequest,
) -> Result<AssignedDelivery, DashboardError> {
    let (status, team) = order_status(conn, req.order_id).await?;
    if status != DeliveryStatus::Pending.as_str() || team.is_some() {
        return Err(DashboardError::Conflict(format!(
            "Order {} is not awaiting assignment.",
            req.order_id
        )));
    }

    let candidates = delivery_teams(conn, req.order_id).await?;
    if !candidates.teams.iter().any(|t| t.team_code == req.team_code) {
        return Err(DashboardError::BadRequest(format!(
            "Team {} does not serve distribution center {}.",
            req.team_code, candidates.center_name
        )));
    }

    let updated = sqlx::query::<Any>(
        r#"UPDATE batch_order SET team_code = $1
           WHERE order_id = $2 AND delivery_status = $3 AND team_code IS NULL"#,
    )
    .bind(req.team_code)
    .bind(req.order_id)
    .bind(DeliveryStatus::Pending.as_str())
    .execute(&mut **conn)
    .await?;
    if updated.rows_affected() == 0 {
        return Err(DashboardError::Conflict(format!(
            "Order {} was assigned concurrently.",
            req.order_id
        )));
    }

    info!(
        identity = %conn.identity(),
        order_id = req.order_id,
        team_code = req.team_code,
        "assigned delivery"
    );
    Ok(AssignedDelivery {
        order_id: req.order_id,
        team_code: req.team_code,
    })
}

pub async fn chiefs(conn: &mut ScopedConnection) -> Result<Vec<ChiefOption>, DashboardError> {
    let rows = sqlx::query_as::<Any, ChiefOption>(
        r#"SELECT co.tax_code, tm.member_name, tm.member_surname
           FROM chief_officer co
           JOIN team_member tm ON tm.tax_code = co.tax_code
           ORDER BY tm.member_surname, tm.member_name"#,
    )
    .fetch_all(&mut **conn)
    .await?;
    Ok(rows)
}

/// Orders assigned to the teams led by the chief with `tax_code`.
pub async fn team_deliveries(
    conn: &mut ScopedConnection,
    tax_code: &str,
) -> Result<TeamDeliveries, DashboardError> {
    let teams = sqlx::query_as::<Any, TeamOption>(
        "SELECT team_code, team_name FROM logistic_team WHERE chief_tax_code = $1 ORDER BY team_code",
    )
    .bind(tax_code)
    .fetch_all(&mut **conn)
    .await?;
    if teams.is_empty() {
        return Ok(TeamDeliveries {
            teams,
            deliveries: Vec::new(),
        });
    }

    let sql = format!(
        r#"SELECT bo.order_id, CAST(bo.order_date AS TEXT) AS order_date,
                  CAST(bo.expected_delivery_date AS TEXT) AS expected_delivery_date,
                  bo.delivery_status, bo.customer_code
           FROM batch_order bo
           WHERE bo.team_code IN ({})
           ORDER BY bo.order_id"#,
        placeholders(1, teams.len())
    );
    let mut query = sqlx::query_as::<Any, Delivery>(&sql);
    for team in &teams {
        query = query.bind(team.team_code);
    }
    let deliveries = query.fetch_all(&mut **conn).await?;
    Ok(TeamDeliveries { teams, deliveries })
}

async fn order_status(
    conn: &mut ScopedConnection,
    order_id: i64,
) -> Result<(String, Option<i64>), DashboardError> {
    sqlx::query_as::<Any, (String, Option<i64>)>(
        "SELECT delivery_status, team_code FROM batch_order WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_optional(&mut **conn)
    .await?
    .ok_or_else(|| DashboardError::NotFound(format!("Order {order_id} does not exist.")))
}
