use crate::user::UserRole;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: usize,
    pub vendor_id: usize,
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub unit: String,
    pub price_cents: u64,
    pub stock: u32,
    pub is_available: bool,
    pub image_url: Option<String>,
    pub created: i64,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub category: String,
    pub unit: String,
    pub price_cents: u64,
    #[serde(default)]
    pub stock: u32,
    #[serde(default = "default_true")]
    pub is_available: bool,
    pub image_url: Option<String>,
}

impl NewProduct {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Product name cannot be empty".to_string());
        }
        if self.category.trim().is_empty() {
            return Err("Product category cannot be empty".to_string());
        }
        if self.unit.trim().is_empty() {
            return Err("Product unit cannot be empty".to_string());
        }
        if self.price_cents == 0 {
            return Err("Product price must be positive".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub unit: Option<String>,
    pub price_cents: Option<u64>,
    pub stock: Option<u32>,
    pub is_available: Option<bool>,
    pub image_url: Option<String>,
}

impl ProductUpdate {
    pub fn validate(&self) -> Result<(), String> {
        let blank = |v: &Option<String>| v.as_deref().map(|s| s.trim().is_empty()) == Some(true);
        if blank(&self.name) || blank(&self.category) || blank(&self.unit) {
            return Err("Product name, category and unit cannot be empty".to_string());
        }
        if self.price_cents == Some(0) {
            return Err("Product price must be positive".to_string());
        }
        Ok(())
    }

    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            product.description = Some(description.clone());
        }
        if let Some(category) = &self.category {
            product.category = category.trim().to_string();
        }
        if let Some(unit) = &self.unit {
            product.unit = unit.trim().to_string();
        }
        if let Some(price) = self.price_cents {
            product.price_cents = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(is_available) = self.is_available {
            product.is_available = is_available;
        }
        if let Some(image_url) = &self.image_url {
            product.image_url = Some(image_url.clone());
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    pub category: Option<String>,
    /// Case insensitive match on name and description.
    pub search: Option<String>,
    #[serde(skip)]
    pub vendor_id: Option<usize>,
    #[serde(skip)]
    pub only_available: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    OutForDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "preparing",
            OrderStatus::OutForDelivery => "out_for_delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OrderStatus::Pending),
            "confirmed" => Some(OrderStatus::Confirmed),
            "preparing" => Some(OrderStatus::Preparing),
            "out_for_delivery" => Some(OrderStatus::OutForDelivery),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Preparing => "being prepared",
            OrderStatus::OutForDelivery => "out for delivery",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_transition_to(self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Confirmed, Preparing)
                | (Preparing, OutForDelivery)
                | (OutForDelivery, Delivered)
                | (Pending, Cancelled)
                | (Confirmed, Cancelled)
                | (Preparing, Cancelled)
        )
    }

    /// Whether an order in this status can be picked up by a rider.
    pub fn is_claimable(self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Preparing)
    }

    /// Which role may move an order from `self` to `next`. Ownership of the
    /// order is checked separately.
    pub fn may_be_set_by(self, role: UserRole, next: OrderStatus) -> bool {
        match role {
            UserRole::Admin => true,
            UserRole::Customer => self == OrderStatus::Pending && next == OrderStatus::Cancelled,
            UserRole::Vendor => matches!(
                next,
                OrderStatus::Confirmed
                    | OrderStatus::Preparing
                    | OrderStatus::OutForDelivery
                    | OrderStatus::Cancelled
            ),
            UserRole::Rider => {
                matches!(next, OrderStatus::OutForDelivery | OrderStatus::Delivered)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: usize,
    pub name: String,
    pub unit: String,
    pub unit_price_cents: u64,
    pub quantity: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub customer_id: usize,
    pub vendor_id: usize,
    pub rider_id: Option<usize>,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub total_cents: u64,
    pub delivery_address: String,
    pub created: i64,
    pub updated: i64,
}

impl Order {
    /// Whether `user_id` is the customer, vendor or rider of this order.
    pub fn involves(&self, user_id: usize) -> bool {
        self.customer_id == user_id || self.vendor_id == user_id || self.rider_id == Some(user_id)
    }

    pub fn short_id(&self) -> &str {
        let end = self.id.len().min(8);
        &self.id[..end]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLineRequest {
    pub product_id: usize,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub vendor_id: usize,
    pub items: Vec<OrderLineRequest>,
    pub delivery_address: String,
}

/// Whose orders to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderParty {
    Customer(usize),
    Vendor(usize),
    Rider(usize),
    Everyone,
}

impl OrderParty {
    pub fn for_user(user_id: usize, role: UserRole) -> Self {
        match role {
            UserRole::Customer => OrderParty::Customer(user_id),
            UserRole::Vendor => OrderParty::Vendor(user_id),
            UserRole::Rider => OrderParty::Rider(user_id),
            UserRole::Admin => OrderParty::Everyone,
        }
    }
}

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("An order needs at least one item")]
    EmptyOrder,
    #[error("A delivery address is required")]
    MissingAddress,
    #[error("Product {0} does not exist")]
    UnknownProduct(usize),
    #[error("Product {product_id} is not sold by vendor {vendor_id}")]
    WrongVendor { product_id: usize, vendor_id: usize },
    #[error("Product {0} is not available")]
    ProductUnavailable(usize),
    #[error("Quantity for product {0} must be positive")]
    ZeroQuantity(usize),
    #[error("Only {available} of product {product_id} left, {requested} requested")]
    InsufficientStock {
        product_id: usize,
        available: u32,
        requested: u32,
    },
    #[error("Order {0} not found")]
    NotFound(String),
    #[error("Cannot move order from {} to {}", .from.as_str(), .to.as_str())]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
    #[error("Order is now {}, not {}", .actual.as_str(), .expected.as_str())]
    StatusChanged {
        expected: OrderStatus,
        actual: OrderStatus,
    },
    #[error("Order {0} already has a rider")]
    AlreadyAssigned(String),
    #[error("Order in status {} cannot be claimed", .0.as_str())]
    NotClaimable(OrderStatus),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl OrderError {
    /// True for failures caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, OrderError::Database(_) | OrderError::Internal(_))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyStats {
    /// YYYYMMDD
    pub date: u32,
    pub orders_count: u64,
    pub delivered_count: u64,
    pub cancelled_count: u64,
    pub revenue_cents: u64,
    pub new_users: u64,
}
