//! Error handling re-exports
//!
//! Handlers return [`AppResult`]; [`AppError`] renders itself as an
//! [`ApiResponse`] envelope with the HTTP status of its [`ErrorCode`].

pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

use axum::extract::multipart::MultipartError;

/// Multipart decoding failures are client errors
pub fn multipart_error(err: MultipartError) -> AppError {
    AppError::validation(format!("Invalid multipart request: {err}"))
}
