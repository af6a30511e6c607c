use super::batches::DATE_FORMAT;
use super::{BATCH_CENTER_SQL, placeholders};
use crate::db::ScopedConnection;
use crate::error::DashboardError;
use crate::types::forms::{DeliveryStatus, PlaceOrderRequest};
use crate::types::supply::{BatchSummary, OrderFormOptions, PlacedOrder};
use chrono::{Days, NaiveDate};
use sqlx::{Any, Connection};
use std::collections::{BTreeMap, BTreeSet};
use tracing::info;

const EXPECTED_DELIVERY_DAYS: u64 = 2;

/// Options for the place-order form: batches are grouped by the center that ships them.
pub async fn order_form(conn: &mut ScopedConnection) -> Result<OrderFormOptions, DashboardError> {
    let customers =
        sqlx::query_scalar::<Any, String>("SELECT customer_code FROM customer ORDER BY customer_code")
            .fetch_all(&mut **conn)
            .await?;

    let sql = format!(
        r#"SELECT {BATCH_CENTER_SQL} AS center_name, pb.batch_id, pb.serial_no, pb.quantity,
                  CAST(pb.arrival_date AS TEXT) AS arrival_date
           FROM product_batch pb
           ORDER BY pb.batch_id"#
    );
    let rows = sqlx::query_as::<Any, (Option<String>, i64, String, i64, Option<String>)>(&sql)
        .fetch_all(&mut **conn)
        .await?;
    let mut batches_by_center: BTreeMap<String, Vec<BatchSummary>> = BTreeMap::new();
    for (center, batch_id, serial_no, quantity, arrival_date) in rows {
        let Some(center) = center else {
            continue;
        };
        batches_by_center.entry(center).or_default().push(BatchSummary {
            batch_id,
            serial_no,
            quantity,
            arrival_date,
        });
    }

    let next_order_id = next_order_id(conn).await?;
    Ok(OrderFormOptions {
        customers,
        batches_by_center,
        next_order_id,
        statuses: DeliveryStatus::ALL.to_vec(),
    })
}

pub async fn next_order_id(conn: &mut ScopedConnection) -> Result<i64, DashboardError> {
    let id = sqlx::query_scalar::<Any, i64>("SELECT COALESCE(MAX(order_id), 0) + 1 FROM batch_order")
        .fetch_one(&mut **conn)
        .await?;
    Ok(id)
}

/// Place an unassigned order for batches shipped by a single center.
///
/// The order row and its batch links are committed together.
pub async fn place_order(
    conn: &mut ScopedConnection,
    req: &PlaceOrderRequest,
    today: NaiveDate,
) -> Result<PlacedOrder, DashboardError> {
    let batch_ids: Vec<i64> = req
        .batch_ids
        .iter()
        .copied()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();
    if batch_ids.is_empty() {
        return Err(DashboardError::BadRequest(
            "You must select at least one product batch.".to_string(),
        ));
    }

    let known = sqlx::query_scalar::<Any, i64>("SELECT COUNT(*) FROM customer WHERE customer_code = $1")
        .bind(req.customer_code.as_str())
        .fetch_one(&mut **conn)
        .await?;
    if known == 0 {
        return Err(DashboardError::NotFound(format!(
            "Customer {} does not exist.",
            req.customer_code
        )));
    }

    let sql = format!(
        "SELECT pb.batch_id FROM product_batch pb WHERE {BATCH_CENTER_SQL} = $1 AND pb.batch_id IN ({})",
        placeholders(2, batch_ids.len())
    );
    let mut in_center = sqlx::query_scalar::<Any, i64>(&sql).bind(req.center_name.as_str());
    for id in &batch_ids {
        in_center = in_center.bind(*id);
    }
    let found: BTreeSet<i64> = in_center.fetch_all(&mut **conn).await?.into_iter().collect();
    let foreign: Vec<String> = batch_ids
        .iter()
        .filter(|id| !found.contains(*id))
        .map(|id| id.to_string())
        .collect();
    if !foreign.is_empty() {
        return Err(DashboardError::BadRequest(format!(
            "Batches {} are not available from distribution center {}.",
            foreign.join(", "),
            req.center_name
        )));
    }

    let expected = req
        .expected_delivery_date
        .or_else(|| today.checked_add_days(Days::new(EXPECTED_DELIVERY_DAYS)))
        .unwrap_or(today);
    let driver = conn.driver();
    let identity = conn.identity().to_string();

    let mut tx = Connection::begin(&mut **conn).await?;
    let order_id =
        sqlx::query_scalar::<Any, i64>("SELECT COALESCE(MAX(order_id), 0) + 1 FROM batch_order")
            .fetch_one(&mut *tx)
            .await?;

    let insert_order = format!(
        r#"INSERT INTO batch_order
               (order_id, order_date, expected_delivery_date, delivery_status, customer_code, team_code)
           VALUES ($1, {order_date}, {expected}, $4, $5, NULL)"#,
        order_date = driver.date_param(2),
        expected = driver.date_param(3),
    );
    sqlx::query::<Any>(&insert_order)
        .bind(order_id)
        .bind(today.format(DATE_FORMAT).to_string())
        .bind(expected.format(DATE_FORMAT).to_string())
        .bind(req.delivery_status.as_str())
        .bind(req.customer_code.as_str())
        .execute(&mut *tx)
        .await?;

    let link_batches = format!(
        r#"INSERT INTO batch_order_batch (order_id, batch_id)
           SELECT $1, pb.batch_id FROM product_batch pb WHERE pb.batch_id IN ({})"#,
        placeholders(2, batch_ids.len())
    );
    let mut link = sqlx::query::<Any>(&link_batches).bind(order_id);
    for id in &batch_ids {
        link = link.bind(*id);
    }
    link.execute(&mut *tx).await?;
    tx.commit().await?;

    info!(
        identity = %identity,
        order_id,
        batches = batch_ids.len(),
        customer = %req.customer_code,
        "placed batch order"
    );
    Ok(PlacedOrder {
        order_id,
        batch_ids,
    })
}
