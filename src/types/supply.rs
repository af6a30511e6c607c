//! Rows read from the supply-chain schema, shaped for the dashboard.
//!
//! Dates arrive as `YYYY-MM-DD` text; queries cast them so every backend agrees.

use serde::Serialize;
use sqlx::FromRow;
use std::collections::BTreeMap;

use super::forms::DeliveryStatus;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ProductOption {
    pub serial_no: String,
    pub product_category: Option<String>,
    pub expiry_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct BatchSummary {
    pub batch_id: i64,
    pub serial_no: String,
    pub quantity: i64,
    pub arrival_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchFormOptions {
    pub products: Vec<ProductOption>,
    /// Serial number -> distribution centers stocking it.
    pub centers_by_product: BTreeMap<String, Vec<String>>,
    pub next_batch_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegisteredBatch {
    pub batch_id: i64,
    pub serial_no: String,
    pub center_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderFormOptions {
    pub customers: Vec<String>,
    pub batches_by_center: BTreeMap<String, Vec<BatchSummary>>,
    pub next_order_id: i64,
    pub statuses: Vec<DeliveryStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacedOrder {
    pub order_id: i64,
    pub batch_ids: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct PendingOrder {
    pub order_id: i64,
    pub delivery_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct TeamOption {
    pub team_code: i64,
    pub team_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeliveryTeams {
    pub order_id: i64,
    pub first_batch_id: i64,
    pub center_name: String,
    pub teams: Vec<TeamOption>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AssignedDelivery {
    pub order_id: i64,
    pub team_code: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ChiefOption {
    pub tax_code: String,
    pub member_name: Option<String>,
    pub member_surname: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct Delivery {
    pub order_id: i64,
    pub order_date: Option<String>,
    pub expected_delivery_date: Option<String>,
    pub delivery_status: String,
    pub customer_code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TeamDeliveries {
    pub teams: Vec<TeamOption>,
    pub deliveries: Vec<Delivery>,
}

#[derive(Debug, Clone, PartialEq, Serialize, FromRow)]
pub struct ExpiredBatch {
    pub batch_id: i64,
    pub serial_no: String,
    pub product_category: Option<String>,
    pub expiry_date: Option<String>,
    pub quantity: i64,
    pub arrival_date: Option<String>,
    pub center_name: Option<String>,
}

/// Generic tabular result for the table browser.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableView {
    pub name: &'static str,
    pub columns: Vec<&'static str>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
}
