//! Utilities
//!
//! - [`error`] - error types (from shared::error)
//! - [`logger`] - tracing subscriber setup
//! - [`time`] - marketplace timezone helpers

pub mod error;
pub mod logger;
pub mod time;

pub use error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};
