//! Voucher Model
//!
//! A voucher is one redeemable inventory item: a PIN code, a link, or an
//! image file. It is available while `used = false` and `order_ref` is unset.

use serde::{Deserialize, Serialize};

/// Voucher payload kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "lowercase"))]
pub enum VoucherKind {
    /// Text code, payload is the code itself
    #[default]
    Code,
    /// Image voucher, payload is a file path
    Image,
    /// Link voucher, payload is the message sent to the customer
    Link,
}

impl VoucherKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoucherKind::Code => "code",
            VoucherKind::Image => "image",
            VoucherKind::Link => "link",
        }
    }
}

impl std::fmt::Display for VoucherKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Voucher entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct Voucher {
    pub id: i64,
    pub product_id: i64,
    /// Code string, file path or link message depending on `kind`
    pub payload: String,
    pub kind: VoucherKind,
    pub description: Option<String>,
    pub used: bool,
    pub used_at: Option<i64>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    /// External order number this voucher was allocated to
    pub order_ref: Option<String>,
    pub created_at: i64,
}

impl Voucher {
    pub fn is_available(&self) -> bool {
        !self.used && self.order_ref.is_none()
    }
}

/// New voucher row (import pipeline output)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoucherCreate {
    pub payload: String,
    pub kind: VoucherKind,
    pub description: Option<String>,
}

impl VoucherCreate {
    pub fn code(code: impl Into<String>) -> Self {
        Self {
            payload: code.into(),
            kind: VoucherKind::Code,
            description: None,
        }
    }
}

/// JSON import request
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum VoucherImport {
    /// One code per line, stored as-is
    Manual { codes: String },
    /// A single link voucher
    Link {
        url: String,
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        message: Option<String>,
    },
}

/// Import result
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportSummary {
    pub added: usize,
    pub skipped: usize,
}

/// Edit voucher payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherUpdate {
    pub code: String,
}

/// Bulk operation payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoucherIds {
    pub ids: Vec<i64>,
}
