//! Fulfillment Pipeline
//!
//! # Flow
//!
//! ```text
//! collector ──► fulfillment_order (pending)
//!                     │
//!                     ▼
//! dispatcher ── matcher ──► voucher allocation ──► delivery (Notifier)
//!                     │
//!                     ▼
//! reconciler ──► OrderSource::mark_dispatched
//! ```
//!
//! [`FulfillmentRunner`] serializes runs: scheduled and manual triggers share
//! one run lock, so at most one collection or processing run is in flight.

pub mod collector;
pub mod delivery;
pub mod dispatcher;
pub mod matcher;
pub mod message;
pub mod reconciler;
pub mod runner;

pub use collector::{CollectOutcome, collect};
pub use delivery::{Delivery, DeliveryOutcome, deliver};
pub use dispatcher::{ProcessOutcome, process_pending_orders};
pub use runner::{CycleOutcome, FulfillmentRunner, PipelineStatus, RunnerError};

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::marketplace::OrderSource;
use crate::messaging::Notifier;

/// Collaborators shared by every pipeline stage
#[derive(Clone)]
pub struct PipelineContext {
    pub pool: SqlitePool,
    pub source: Arc<dyn OrderSource>,
    pub notifier: Arc<dyn Notifier>,
    /// Shown as `[store_name]` at the top of customer messages
    pub store_name: String,
}
