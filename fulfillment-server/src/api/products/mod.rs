//! Product API module
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /api/products | GET | products with inventory counts |
//! | /api/products | POST | register a product |
//! | /api/products/{id}/toggle | POST | deactivate / reactivate |
//! | /api/products/{id}/vouchers | GET | vouchers of a product |
//! | /api/products/{id}/vouchers | POST | JSON import (manual lines or link) |
//! | /api/products/{id}/vouchers/upload | POST | multipart text / image import |

mod handler;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::core::ServerState;

/// Upload body limit (10MB)
const MAX_UPLOAD_SIZE: usize = 10 * 1024 * 1024;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/products", product_routes())
}

fn product_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list).post(handler::create))
        .route("/{id}/toggle", post(handler::toggle))
        .route(
            "/{id}/vouchers",
            get(handler::list_vouchers).post(handler::import_vouchers),
        )
        .route(
            "/{id}/vouchers/upload",
            post(handler::upload_vouchers).layer(DefaultBodyLimit::max(MAX_UPLOAD_SIZE)),
        )
}
