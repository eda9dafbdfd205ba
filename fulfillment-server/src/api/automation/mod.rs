//! Automation API module
//!
//! | Path | Method | Description |
//! |------|--------|-------------|
//! | /api/automation/collect | POST | collect new orders, then process |
//! | /api/automation/process | POST | process pending orders only |
//! | /api/automation/status | GET | schedule state and run counters |
//! | /api/automation/start | POST | start the periodic trigger (`{interval}`) |
//! | /api/automation/stop | POST | stop the periodic trigger |
//!
//! Manual triggers answer 409 while a run is in flight.

mod handler;

use axum::{
    Router,
    routing::{get, post},
};

use crate::core::ServerState;

pub fn router() -> Router<ServerState> {
    Router::new().nest("/api/automation", automation_routes())
}

fn automation_routes() -> Router<ServerState> {
    Router::new()
        .route("/collect", post(handler::collect))
        .route("/process", post(handler::process))
        .route("/status", get(handler::status))
        .route("/start", post(handler::start))
        .route("/stop", post(handler::stop))
}
