//! Management API
//!
//! # Structure
//!
//! - [`health`] - liveness and database check
//! - [`products`] - products and voucher import
//! - [`vouchers`] - voucher correction and resend
//! - [`orders`] - order listing, detail and reset
//! - [`automation`] - pipeline triggers and schedule
//! - [`marketplace`] - seller catalog lookup
//!
//! Every handler answers with the [`ApiResponse`] envelope.

pub mod automation;
pub mod health;
pub mod marketplace;
pub mod orders;
pub mod products;
pub mod vouchers;

use axum::{Router, middleware};
use tower::ServiceExt;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::core::ServerState;

// Re-export common types for handlers
pub use crate::utils::{ApiResponse, AppResult};

async fn log_request(
    request: http::Request<axum::body::Body>,
    next: middleware::Next,
) -> http::Response<axum::body::Body> {
    let method = request.method().clone();
    let uri = request.uri().clone();

    let response = next.run(request).await;

    tracing::info!(target: "http_access", "{} {} {}", method, uri, response.status());
    response
}

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        .merge(health::router())
        .merge(products::router())
        .merge(vouchers::router())
        .merge(orders::router())
        .merge(automation::router())
        .merge(marketplace::router())
}

/// Build the fully layered application
///
/// Used by the HTTP server and by in-process [`oneshot`] calls.
pub fn build_app(state: ServerState) -> Router {
    build_router()
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

/// Run one request through the application without a listener
pub async fn oneshot(
    app: Router,
    request: http::Request<axum::body::Body>,
) -> http::Response<axum::body::Body> {
    match app.oneshot(request).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}
