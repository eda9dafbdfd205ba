//! Unified error codes for the fulfillment service
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Product errors (15xx: file upload)
//! - 2xxx: Voucher (inventory) errors
//! - 3xxx: Order errors
//! - 4xxx: Automation errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values so API clients can switch
/// on them without parsing messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 7,

    // ==================== 1xxx: Product ====================
    /// Product not found
    ProductNotFound = 1001,
    /// An active product with the same name exists
    ProductNameExists = 1002,
    /// Product is deactivated
    ProductInactive = 1003,

    // ==================== 15xx: File Upload ====================
    /// Unsupported file format
    UnsupportedFileFormat = 1502,
    /// Invalid image file
    InvalidImageFile = 1503,
    /// No file provided
    NoFileProvided = 1504,
    /// Empty file
    EmptyFile = 1505,
    /// No filename provided
    NoFilename = 1506,
    /// File storage failed
    FileStorageFailed = 1509,

    // ==================== 2xxx: Voucher ====================
    /// Voucher not found
    VoucherNotFound = 2001,
    /// Voucher is already allocated to an order
    VoucherAlreadyUsed = 2002,
    /// Voucher code already registered
    VoucherCodeExists = 2003,
    /// Voucher code does not pass format validation
    VoucherInvalidFormat = 2004,
    /// Import produced no usable vouchers
    NoValidVouchers = 2005,
    /// Voucher has not been allocated yet
    VoucherNotAllocated = 2006,
    /// Resending a voucher failed
    VoucherResendFailed = 2007,

    // ==================== 3xxx: Order ====================
    /// Order not found
    OrderNotFound = 3001,
    /// Order is not in a resettable state
    OrderNotResettable = 3002,

    // ==================== 4xxx: Automation ====================
    /// A pipeline run is already in flight
    PipelineBusy = 4001,
    /// Scheduled collection is already running
    AutomationAlreadyRunning = 4002,
    /// Scheduled collection is not running
    AutomationNotRunning = 4003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Configuration error
    ConfigError = 9005,
    /// External service rejected the request
    ExternalServiceError = 9006,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the default message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::RequiredField => "Required field is missing",

            // Product
            ErrorCode::ProductNotFound => "Product not found",
            ErrorCode::ProductNameExists => "An active product with this name already exists",
            ErrorCode::ProductInactive => "Product is inactive",

            // File Upload
            ErrorCode::UnsupportedFileFormat => "Unsupported file format",
            ErrorCode::InvalidImageFile => "Invalid image file",
            ErrorCode::NoFileProvided => "No file provided",
            ErrorCode::EmptyFile => "Empty file provided",
            ErrorCode::NoFilename => "No filename provided",
            ErrorCode::FileStorageFailed => "File storage failed",

            // Voucher
            ErrorCode::VoucherNotFound => "Voucher not found",
            ErrorCode::VoucherAlreadyUsed => "Voucher is already allocated",
            ErrorCode::VoucherCodeExists => "Voucher code already registered",
            ErrorCode::VoucherInvalidFormat => "Voucher code format is invalid",
            ErrorCode::NoValidVouchers => "No valid vouchers found",
            ErrorCode::VoucherNotAllocated => "Voucher has not been allocated",
            ErrorCode::VoucherResendFailed => "Failed to resend voucher",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::OrderNotResettable => "Only orders in error state can be reset",

            // Automation
            ErrorCode::PipelineBusy => "Order processing is already running",
            ErrorCode::AutomationAlreadyRunning => "Automatic collection is already running",
            ErrorCode::AutomationNotRunning => "Automatic collection is not running",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::DatabaseError => "Database error",
            ErrorCode::ConfigError => "Configuration error",
            ErrorCode::ExternalServiceError => "External service error",
        }
    }
}

impl From<ErrorCode> for u16 {
    #[inline]
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error when converting from an invalid u16 to ErrorCode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            // General
            0 => Ok(ErrorCode::Success),
            2 => Ok(ErrorCode::ValidationFailed),
            3 => Ok(ErrorCode::NotFound),
            4 => Ok(ErrorCode::AlreadyExists),
            5 => Ok(ErrorCode::InvalidRequest),
            7 => Ok(ErrorCode::RequiredField),

            // Product
            1001 => Ok(ErrorCode::ProductNotFound),
            1002 => Ok(ErrorCode::ProductNameExists),
            1003 => Ok(ErrorCode::ProductInactive),

            // File Upload
            1502 => Ok(ErrorCode::UnsupportedFileFormat),
            1503 => Ok(ErrorCode::InvalidImageFile),
            1504 => Ok(ErrorCode::NoFileProvided),
            1505 => Ok(ErrorCode::EmptyFile),
            1506 => Ok(ErrorCode::NoFilename),
            1509 => Ok(ErrorCode::FileStorageFailed),

            // Voucher
            2001 => Ok(ErrorCode::VoucherNotFound),
            2002 => Ok(ErrorCode::VoucherAlreadyUsed),
            2003 => Ok(ErrorCode::VoucherCodeExists),
            2004 => Ok(ErrorCode::VoucherInvalidFormat),
            2005 => Ok(ErrorCode::NoValidVouchers),
            2006 => Ok(ErrorCode::VoucherNotAllocated),
            2007 => Ok(ErrorCode::VoucherResendFailed),

            // Order
            3001 => Ok(ErrorCode::OrderNotFound),
            3002 => Ok(ErrorCode::OrderNotResettable),

            // Automation
            4001 => Ok(ErrorCode::PipelineBusy),
            4002 => Ok(ErrorCode::AutomationAlreadyRunning),
            4003 => Ok(ErrorCode::AutomationNotRunning),

            // System
            9001 => Ok(ErrorCode::InternalError),
            9002 => Ok(ErrorCode::DatabaseError),
            9005 => Ok(ErrorCode::ConfigError),
            9006 => Ok(ErrorCode::ExternalServiceError),

            _ => Err(InvalidErrorCode(value)),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}
