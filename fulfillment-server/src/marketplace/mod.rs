//! Marketplace Order Source
//!
//! The marketplace is reached through the [`OrderSource`] trait so the
//! fulfillment pipeline can run against the real HTTP client or an
//! in-process fake. [`ProductCatalog`] exposes the seller's own listings so
//! products can be registered under the names orders will carry.
//!
//! | Operation | Contract |
//! |-----------|----------|
//! | `fetch_recent_orders` | payment-confirmed orders of the collection window |
//! | `mark_dispatched` | report one order as dispatched, never errors |
//! | `search_products` | one page of on-sale listings, optionally by keyword |

mod client;
pub mod wire;

pub use client::{MarketplaceClient, sign_client_secret};
pub use wire::{CatalogPage, CatalogProduct};

use async_trait::async_trait;
use shared::models::OrderCreate;
use thiserror::Error;

/// Marketplace client errors
#[derive(Debug, Error)]
pub enum MarketplaceError {
    #[error("Marketplace credentials are not configured")]
    NotConfigured,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Access token rejected")]
    Unauthorized,

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// External order source
#[async_trait]
pub trait OrderSource: Send + Sync {
    /// Orders whose payment was confirmed inside the collection window
    async fn fetch_recent_orders(&self) -> Result<Vec<OrderCreate>, MarketplaceError>;

    /// Tell the marketplace an order has been dispatched
    ///
    /// Failures are logged and reported as `false`.
    async fn mark_dispatched(&self, order_number: &str) -> bool;
}

/// Seller catalog lookup
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// On-sale listings, 1-based `page`
    async fn search_products(
        &self,
        keyword: Option<&str>,
        page: u32,
    ) -> Result<CatalogPage, MarketplaceError>;
}
