//! Voucher API module
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /api/vouchers/{id} | PUT | correct the code of an available voucher |
//! | /api/vouchers/{id} | DELETE | delete (`?force=true` for allocated vouchers) |
//! | /api/vouchers/{id}/resend | POST | resend one allocated voucher |
//! | /api/vouchers/resend | POST | bulk resend, grouped by customer |
//! | /api/vouchers/delete | POST | bulk delete of available vouchers |

mod handler;

use axum::{
    Router,
    routing::{post, put},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/vouchers", voucher_routes())
}

fn voucher_routes() -> Router<ServerState> {
    Router::new()
        .route("/resend", post(handler::resend_many))
        .route("/delete", post(handler::delete_many))
        .route("/{id}", put(handler::update).delete(handler::delete))
        .route("/{id}/resend", post(handler::resend))
}
