//! Product Model

use serde::{Deserialize, Serialize};

/// Product entity
///
/// Products are soft-deleted (`is_active = false`) so vouchers keep a valid
/// owner. Name is unique among active products.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: String,
    /// Price in the smallest currency unit
    pub price: i64,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: i64,
}

/// Create product payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCreate {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub price: i64,
    #[serde(default)]
    pub description: Option<String>,
}

/// Product row with inventory counts (listing view)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct ProductStock {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub price: i64,
    pub is_active: bool,
    pub total: i64,
    pub available: i64,
    pub used: i64,
}
