use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DeliveryStatus {
    #[default]
    Pending,
    #[serde(rename = "In Transit")]
    InTransit,
    Delivered,
    Cancelled,
    Problem,
}

impl DeliveryStatus {
    pub const ALL: [DeliveryStatus; 5] = [
        DeliveryStatus::Pending,
        DeliveryStatus::InTransit,
        DeliveryStatus::Delivered,
        DeliveryStatus::Cancelled,
        DeliveryStatus::Problem,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryStatus::Pending => "Pending",
            DeliveryStatus::InTransit => "In Transit",
            DeliveryStatus::Delivered => "Delivered",
            DeliveryStatus::Cancelled => "Cancelled",
            DeliveryStatus::Problem => "Problem",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterBatchRequest {
    pub serial_no: String,
    pub center_name: String,
    pub quantity: i64,
    /// Defaults to today.
    #[serde(default)]
    pub arrival_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PlaceOrderRequest {
    pub customer_code: String,
    pub center_name: String,
    pub batch_ids: Vec<i64>,
    /// Defaults to two days from today.
    #[serde(default)]
    pub expected_delivery_date: Option<NaiveDate>,
    #[serde(default)]
    pub delivery_status: DeliveryStatus,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssignDeliveryRequest {
    pub order_id: i64,
    pub team_code: i64,
}
