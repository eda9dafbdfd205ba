//! Voucher delivery to one customer

use shared::models::{Voucher, VoucherKind};

use super::message::{compose_image_caption, compose_text};
use crate::messaging::Notifier;

/// Who receives a delivery and what it is for
#[derive(Debug, Clone, Copy)]
pub struct Delivery<'a> {
    pub store_name: &'a str,
    pub customer_name: &'a str,
    pub customer_phone: &'a str,
    pub product_name: &'a str,
    pub order_number: &'a str,
}

/// Counts of gateway sends for one delivery
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    pub attempted: usize,
    pub succeeded: usize,
}

impl DeliveryOutcome {
    /// At least one send reached the customer
    ///
    /// With a single send this means that send succeeded.
    pub fn is_success(&self) -> bool {
        self.succeeded > 0
    }

    pub fn is_partial(&self) -> bool {
        self.succeeded > 0 && self.succeeded < self.attempted
    }
}

/// Send vouchers: one text for all codes and links, one image message per image
///
/// An image whose file cannot be read counts as an attempted, failed send.
pub async fn deliver(
    notifier: &dyn Notifier,
    delivery: Delivery<'_>,
    vouchers: &[Voucher],
) -> DeliveryOutcome {
    let mut outcome = DeliveryOutcome::default();

    let codes: Vec<&str> = vouchers
        .iter()
        .filter(|v| v.kind == VoucherKind::Code)
        .map(|v| v.payload.as_str())
        .collect();
    let links: Vec<&str> = vouchers
        .iter()
        .filter(|v| v.kind == VoucherKind::Link)
        .map(|v| v.payload.as_str())
        .collect();
    let images: Vec<&Voucher> = vouchers
        .iter()
        .filter(|v| v.kind == VoucherKind::Image)
        .collect();

    if !codes.is_empty() || !links.is_empty() {
        let text = compose_text(
            delivery.store_name,
            delivery.customer_name,
            delivery.product_name,
            &codes,
            &links,
            images.len(),
        );
        outcome.attempted += 1;
        if notifier.send_text(delivery.customer_phone, &text).await {
            outcome.succeeded += 1;
        }
    }

    for image in images {
        outcome.attempted += 1;
        let data = match tokio::fs::read(&image.payload).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!(
                    voucher_id = image.id,
                    path = %image.payload,
                    error = %e,
                    "Image voucher file unreadable"
                );
                continue;
            }
        };
        let caption = compose_image_caption(
            delivery.store_name,
            delivery.customer_name,
            delivery.product_name,
            image.description.as_deref(),
            delivery.order_number,
        );
        if notifier
            .send_image(delivery.customer_phone, &caption, &data)
            .await
        {
            outcome.succeeded += 1;
        }
    }

    outcome
}
