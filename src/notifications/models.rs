//! Notification data models

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    OrderPlaced,
    OrderStatusChanged,
    RiderAssigned,
}

impl NotificationType {
    pub fn as_db_str(self) -> &'static str {
        match self {
            NotificationType::OrderPlaced => "order_placed",
            NotificationType::OrderStatusChanged => "order_status_changed",
            NotificationType::RiderAssigned => "rider_assigned",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "order_placed" => Some(NotificationType::OrderPlaced),
            "order_status_changed" => Some(NotificationType::OrderStatusChanged),
            "rider_assigned" => Some(NotificationType::RiderAssigned),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub notification_type: NotificationType,
    pub title: String,
    pub body: Option<String>,
    pub data: serde_json::Value,
    pub read_at: Option<i64>,
    pub created_at: i64,
}

/// Payload attached to every order notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderNotificationData {
    pub order_id: String,
    pub status: String,
    pub previous_status: Option<String>,
    pub customer_id: usize,
    pub vendor_id: usize,
    pub rider_id: Option<usize>,
    pub total_cents: u64,
}
