//! Order API module
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /api/orders | GET | orders, optionally filtered by `?status=` |
//! | /api/orders/{number} | GET | order with its allocated vouchers |
//! | /api/orders/{number}/reset | POST | return an `error` order to `pending` |

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/orders", order_routes())
}

fn order_routes() -> Router<ServerState> {
    Router::new()
        .route("/", get(handler::list))
        .route("/{number}", get(handler::get_by_number))
        .route("/{number}/reset", post(handler::reset))
}
