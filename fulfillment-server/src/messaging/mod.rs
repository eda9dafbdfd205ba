//! Customer Messaging
//!
//! Vouchers reach customers through a [`Notifier`]. Both operations return a
//! plain success flag; gateway errors are logged by the implementation.

mod gateway;
pub mod image;

pub use gateway::{GatewayError, SmsGateway};

use async_trait::async_trait;

/// Text and image message delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_text(&self, phone: &str, message: &str) -> bool;

    /// `image` is the raw file; implementations re-encode it as needed
    async fn send_image(&self, phone: &str, message: &str, image: &[u8]) -> bool;
}

/// Strip separators from a phone number
pub fn normalize_phone(phone: &str) -> String {
    phone.chars().filter(char::is_ascii_digit).collect()
}

/// Punctuation the gateway accepts besides letters, digits and whitespace
const ALLOWED_PUNCTUATION: &str = ".,!?-[]():/=&%#~+@_";

/// Drop characters the gateway rejects (emoji, symbols)
pub fn sanitize_message(message: &str) -> String {
    message
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace() || ALLOWED_PUNCTUATION.contains(*c))
        .collect()
}
