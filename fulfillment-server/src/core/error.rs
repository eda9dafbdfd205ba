use thiserror::Error;

use crate::utils::AppError;

/// Startup and serve failures of the server process
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Initialization failed: {0}")]
    Init(#[from] AppError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ServerError>;
