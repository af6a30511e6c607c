use crate::db::ScopedConnection;
use crate::error::DashboardError;
use crate::types::forms::RegisterBatchRequest;
use crate::types::supply::{BatchFormOptions, ExpiredBatch, ProductOption, RegisteredBatch};
use chrono::NaiveDate;
use sqlx::Any;
use std::collections::BTreeMap;
use tracing::info;

pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

/// Options for the register-batch form.
pub async fn batch_form(conn: &mut ScopedConnection) -> Result<BatchFormOptions, DashboardError> {
    let products = sqlx::query_as::<Any, ProductOption>(
        r#"SELECT serial_no, product_category, CAST(expiry_date AS TEXT) AS expiry_date
           FROM product ORDER BY serial_no"#,
    )
    .fetch_all(&mut **conn)
    .await?;

    let stocked = sqlx::query_as::<Any, (String, String)>(
        r#"SELECT serial_no, center_name FROM distribution_center_product
           ORDER BY center_name"#,
    )
    .fetch_all(&mut **conn)
    .await?;
    let mut centers_by_product: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (serial_no, center) in stocked {
        centers_by_product.entry(serial_no).or_default().push(center);
    }

    let next_batch_id = next_batch_id(conn).await?;
    Ok(BatchFormOptions {
        products,
        centers_by_product,
        next_batch_id,
    })
}

pub async fn next_batch_id(conn: &mut ScopedConnection) -> Result<i64, DashboardError> {
    let id = sqlx::query_scalar::<Any, i64>("SELECT COALESCE(MAX(batch_id), 0) + 1 FROM product_batch")
        .fetch_one(&mut **conn)
        .await?;
    Ok(id)
}

/// Register a batch of an existing product at a center that stocks it.
pub async fn register_batch(
    conn: &mut ScopedConnection,
    req: &RegisterBatchRequest,
    today: NaiveDate,
) -> Result<RegisteredBatch, DashboardError> {
    if req.quantity < 1 {
        return Err(DashboardError::BadRequest(
            "Quantity must be at least 1.".to_string(),
        ));
    }

    let known = sqlx::query_scalar::<Any, i64>("SELECT COUNT(*) FROM product WHERE serial_no = $1")
        .bind(req.serial_no.as_str())
        .fetch_one(&mut **conn)
        .await?;
    if known == 0 {
        return Err(DashboardError::NotFound(format!(
            "Product {} does not exist.",
            req.serial_no
        )));
    }

    let stocked = sqlx::query_scalar::<Any, i64>(
        r#"SELECT COUNT(*) FROM distribution_center_product
           WHERE serial_no = $1 AND center_name = $2"#,
    )
    .bind(req.serial_no.as_str())
    .bind(req.center_name.as_str())
    .fetch_one(&mut **conn)
    .await?;
    if stocked == 0 {
        return Err(DashboardError::BadRequest(format!(
            "Distribution center {} does not have product {} in its list of available products.",
            req.center_name, req.serial_no
        )));
    }

    let arrival = req.arrival_date.unwrap_or(today).format(DATE_FORMAT).to_string();
    let sql = format!(
        r#"INSERT INTO product_batch (batch_id, serial_no, quantity, arrival_date, center_name)
           SELECT COALESCE(MAX(batch_id), 0) + 1, $1, $2, {arrival}, $4 FROM product_batch
           RETURNING batch_id"#,
        arrival = conn.driver().date_param(3),
    );
    let batch_id = sqlx::query_scalar::<Any, i64>(&sql)
        .bind(req.serial_no.as_str())
        .bind(req.quantity)
        .bind(arrival)
        .bind(req.center_name.as_str())
        .fetch_one(&mut **conn)
        .await?;

    info!(
        identity = %conn.identity(),
        batch_id,
        serial_no = %req.serial_no,
        center = %req.center_name,
        "registered product batch"
    );
    Ok(RegisteredBatch {
        batch_id,
        serial_no: req.serial_no.clone(),
        center_name: req.center_name.clone(),
    })
}

/// Batches whose product expired before `today`.
pub async fn expired_batches(
    conn: &mut ScopedConnection,
    today: NaiveDate,
) -> Result<Vec<ExpiredBatch>, DashboardError> {
    let sql = format!(
        r#"SELECT pb.batch_id, p.serial_no, p.product_category,
                  CAST(p.expiry_date AS TEXT) AS expiry_date, pb.quantity,
                  CAST(pb.arrival_date AS TEXT) AS arrival_date, pb.center_name
           FROM product_batch pb
           JOIN product p ON p.serial_no = pb.serial_no
           WHERE p.expiry_date < {today}
           ORDER BY pb.batch_id"#,
        today = conn.driver().date_param(1),
    );
    let rows = sqlx::query_as::<Any, ExpiredBatch>(&sql)
        .bind(today.format(DATE_FORMAT).to_string())
        .fetch_all(&mut **conn)
        .await?;
    Ok(rows)
}
