//! Fulfillment Server - gift card voucher delivery for marketplace orders
//!
//! # Overview
//!
//! Paid orders are collected from the marketplace, matched to a registered
//! product, allocated unused vouchers from inventory and delivered to the
//! customer by text / image message. Completed orders are then reported back
//! to the marketplace as dispatched.
//!
//! - **Pipeline** (`fulfillment`): collector, dispatcher, reconciler and the
//!   run coordinator
//! - **Database** (`db`): SQLite through sqlx, repositories
//! - **Inventory** (`inventory`): voucher import, correction and resend
//! - **Collaborators**: `marketplace` (order source), `messaging`
//!   (notifier), `extraction` (image to code)
//! - **HTTP API** (`api`): management routes
//!
//! # Module layout
//!
//! ```text
//! fulfillment-server/src/
//! ├── core/          # config, state, background tasks, server
//! ├── api/           # HTTP routes and handlers
//! ├── db/            # pool, migrations, repositories
//! ├── fulfillment/   # pipeline
//! ├── inventory/     # seller-side voucher operations
//! ├── marketplace/   # marketplace client and wire types
//! ├── messaging/     # SMS/MMS gateway
//! ├── extraction/    # code extraction and validation
//! └── utils/         # errors, logger, time
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod extraction;
pub mod fulfillment;
pub mod inventory;
pub mod marketplace;
pub mod messaging;
pub mod utils;

// Re-export common types
pub use core::{Config, Server, ServerError, ServerState};
pub use fulfillment::{FulfillmentRunner, PipelineContext};
pub use marketplace::OrderSource;
pub use messaging::Notifier;
pub use utils::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Load `.env` and start logging
///
/// Reads `LOG_LEVEL` / `LOG_DIR` directly since the full [`Config`] is built
/// after the environment is loaded.
pub fn setup_environment() -> Result<(), ServerError> {
    if let Err(e) = dotenvy::dotenv()
        && !e.not_found()
    {
        return Err(ServerError::Config(format!("Failed to load .env: {e}")));
    }

    let log_level = std::env::var("LOG_LEVEL").ok();
    let log_dir = std::env::var("LOG_DIR").ok();
    init_logger_with_file(log_level.as_deref(), log_dir.as_deref());
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    ______      ____ _____ ____
   / ____/_  __/ / __/ / / / /
  / /_  / / / / / /_/ / / / /
 / __/ / /_/ / / __/ /_/ / /___
/_/    \__,_/_/_/  \____/_____/
   voucher fulfillment v{}
    "#,
        env!("CARGO_PKG_VERSION")
    );
}
