//! Fulfillment Order Model

use serde::{Deserialize, Serialize};

use super::Voucher;

/// Order fulfillment status
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum OrderStatus {
    #[default]
    Pending,
    Completed,
    Error,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Completed => "completed",
            OrderStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(OrderStatus::Pending),
            "completed" => Ok(OrderStatus::Completed),
            "error" => Ok(OrderStatus::Error),
            other => Err(format!("unknown order status: {other}")),
        }
    }
}

/// Order ingested from the marketplace
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Order {
    pub id: i64,
    /// External (marketplace) product-order number, unique
    pub order_number: String,
    /// Product name as reported by the marketplace
    pub product_name: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub status: OrderStatus,
    /// Order timestamp as reported by the marketplace
    pub ordered_at: Option<String>,
    pub collected_at: i64,
    /// Error detail
    pub notes: Option<String>,
    /// Marketplace has acknowledged dispatch
    pub reconciled: bool,
}

/// Order as fetched from the marketplace, before it is stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderCreate {
    pub order_number: String,
    pub product_name: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub quantity: i64,
    pub unit_price: i64,
    pub ordered_at: Option<String>,
}

/// Order with the vouchers allocated to it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub vouchers: Vec<Voucher>,
}
