//! Marketplace catalog API module
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /api/marketplace/products | GET | seller listings, `?keyword=&page=` |
//!
//! Each listing reports the local product an order for it would resolve to,
//! so unmatched listings can be registered before orders arrive.

mod handler;

use axum::{Router, routing::get};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/marketplace", marketplace_routes())
}

fn marketplace_routes() -> Router<ServerState> {
    Router::new().route("/products", get(handler::search_products))
}
