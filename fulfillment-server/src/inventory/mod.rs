//! Inventory Management
//!
//! Seller-side voucher operations: import (manual lines, text files, images
//! through the extractor, link and image vouchers), correction and resend.
//!
//! | Import | Validation |
//! |--------|------------|
//! | manual lines | trimmed, blank lines dropped |
//! | text file / extracted image | format validator |
//! | link | URL required |
//! | image voucher | `.jpg .jpeg .png .bmp .gif`, must decode |

use std::collections::HashSet;
use std::path::Path;

use serde::Serialize;
use shared::models::{ImportSummary, Voucher, VoucherCreate, VoucherKind};
use shared::util::now_millis;
use sqlx::SqlitePool;

use crate::db::repository::{RepoError, product as product_repo, voucher as voucher_repo};
use crate::extraction::validate_code_format;
use crate::fulfillment::{Delivery, deliver};
use crate::messaging::Notifier;
use crate::utils::{AppError, ErrorCode};

pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "gif"];
pub const TEXT_EXTENSIONS: &[&str] = &["txt", "csv"];
pub const DEFAULT_IMAGE_DESCRIPTION: &str = "Gift card image";
pub const DEFAULT_LINK_DESCRIPTION: &str = "Link";

fn extension(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
}

pub fn is_image_filename(filename: &str) -> bool {
    extension(filename).is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()))
}

pub fn is_text_filename(filename: &str) -> bool {
    extension(filename).is_some_and(|e| TEXT_EXTENSIONS.contains(&e.as_str()))
}

/// One code voucher per non-blank line, stored as typed
pub fn manual_vouchers(text: &str) -> Vec<VoucherCreate> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(VoucherCreate::code)
        .collect()
}

/// Link voucher; the stored payload is the message sent to the customer
pub fn link_voucher(
    url: &str,
    description: Option<&str>,
    message: Option<&str>,
) -> Result<VoucherCreate, AppError> {
    let url = url.trim();
    if url.is_empty() {
        return Err(AppError::with_message(ErrorCode::RequiredField, "Link URL is required"));
    }
    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_LINK_DESCRIPTION);

    let payload = match message.map(str::trim).filter(|m| !m.is_empty()) {
        Some(message) => format!("{message}\n{url}"),
        None => format!("{description}: {url}"),
    };

    Ok(VoucherCreate {
        payload,
        kind: VoucherKind::Link,
        description: Some(description.to_string()),
    })
}

/// Keep only characters that are safe in a stored file name
fn safe_filename(name: &str) -> String {
    let base = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("voucher");
    base.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Save an uploaded image voucher under `dir` as `{timestamp}_{name}`
pub async fn store_image_voucher(
    dir: &Path,
    filename: &str,
    data: &[u8],
    description: Option<&str>,
) -> Result<VoucherCreate, AppError> {
    if data.is_empty() {
        return Err(AppError::new(ErrorCode::EmptyFile));
    }
    if !is_image_filename(filename) {
        return Err(AppError::with_message(
            ErrorCode::UnsupportedFileFormat,
            format!(
                "Unsupported image '{filename}'. Supported: {}",
                IMAGE_EXTENSIONS.join(", ")
            ),
        ));
    }
    if let Err(e) = image::load_from_memory(data) {
        return Err(AppError::with_message(
            ErrorCode::InvalidImageFile,
            format!("Invalid image file: {e}"),
        ));
    }

    tokio::fs::create_dir_all(dir).await.map_err(|e| {
        AppError::with_message(
            ErrorCode::FileStorageFailed,
            format!("Failed to create upload directory: {e}"),
        )
    })?;
    let path = dir.join(format!("{}_{}", now_millis(), safe_filename(filename)));
    tokio::fs::write(&path, data).await.map_err(|e| {
        AppError::with_message(
            ErrorCode::FileStorageFailed,
            format!("Failed to save image: {e}"),
        )
    })?;
    tracing::info!(path = %path.display(), size = data.len(), "Image voucher stored");

    let description = description
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .unwrap_or(DEFAULT_IMAGE_DESCRIPTION);
    Ok(VoucherCreate {
        payload: path.to_string_lossy().into_owned(),
        kind: VoucherKind::Image,
        description: Some(description.to_string()),
    })
}

/// Add vouchers to an active product
///
/// Code vouchers already registered (or repeated in the batch) are skipped.
pub async fn import(
    pool: &SqlitePool,
    product_id: i64,
    items: Vec<VoucherCreate>,
) -> Result<ImportSummary, AppError> {
    let product = product_repo::find_by_id(pool, product_id)
        .await?
        .ok_or_else(|| {
            AppError::with_message(ErrorCode::ProductNotFound, format!("Product {product_id} not found"))
        })?;
    if !product.is_active {
        return Err(AppError::with_message(
            ErrorCode::ProductInactive,
            format!("Product '{}' is inactive", product.name),
        ));
    }

    let mut seen = HashSet::new();
    let mut accepted = Vec::with_capacity(items.len());
    let mut skipped = 0;
    for item in items {
        if item.kind == VoucherKind::Code
            && (!seen.insert(item.payload.clone())
                || voucher_repo::payload_exists(pool, &item.payload, None).await?)
        {
            skipped += 1;
            continue;
        }
        accepted.push(item);
    }

    let added = voucher_repo::insert_many(pool, product_id, &accepted).await?;
    tracing::info!(product_id, added, skipped, "Vouchers imported");
    Ok(ImportSummary { added, skipped })
}

/// Replace the code of an available voucher
///
/// The code is validated as typed (surrounding whitespace aside), so a
/// lowercase code is rejected rather than rewritten.
pub async fn edit_code(pool: &SqlitePool, id: i64, code: &str) -> Result<Voucher, AppError> {
    let code = code.trim();
    let voucher = voucher_repo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::with_message(ErrorCode::VoucherNotFound, format!("Voucher {id} not found")))?;

    if voucher.kind != VoucherKind::Code {
        return Err(AppError::validation(format!(
            "Only code vouchers can be edited, voucher {id} is {}",
            voucher.kind
        )));
    }
    if !validate_code_format(code) {
        return Err(AppError::with_message(
            ErrorCode::VoucherInvalidFormat,
            format!("'{code}' is not a valid voucher code"),
        ));
    }
    if voucher_repo::payload_exists(pool, code, Some(id)).await? {
        return Err(AppError::with_message(
            ErrorCode::VoucherCodeExists,
            format!("Code '{code}' is already registered"),
        ));
    }

    voucher_repo::update_payload(pool, id, code)
        .await
        .map_err(allocated_as_used)
}

/// Delete a voucher; allocated vouchers need `force`
pub async fn delete(pool: &SqlitePool, id: i64, force: bool) -> Result<Voucher, AppError> {
    let voucher = voucher_repo::delete(pool, id, force)
        .await
        .map_err(allocated_as_used)?;

    if voucher.kind == VoucherKind::Image
        && let Err(e) = tokio::fs::remove_file(&voucher.payload).await
    {
        tracing::warn!(voucher_id = id, error = %e, "Failed to remove image voucher file");
    }
    if force && !voucher.is_available() {
        tracing::warn!(
            voucher_id = id,
            order = voucher.order_ref.as_deref().unwrap_or("-"),
            "Allocated voucher force-deleted"
        );
    }
    Ok(voucher)
}

/// Delete the available vouchers among `ids`; allocated ones are left alone
pub async fn delete_available(pool: &SqlitePool, ids: &[i64]) -> Result<u64, AppError> {
    let images: Vec<Voucher> = voucher_repo::find_by_ids(pool, ids)
        .await?
        .into_iter()
        .filter(|v| v.kind == VoucherKind::Image && v.is_available())
        .collect();

    let removed = voucher_repo::delete_available(pool, ids).await?;
    for voucher in images {
        if let Err(e) = tokio::fs::remove_file(&voucher.payload).await {
            tracing::warn!(voucher_id = voucher.id, error = %e, "Failed to remove image voucher file");
        }
    }
    tracing::info!(requested = ids.len(), removed, "Vouchers deleted");
    Ok(removed)
}

fn allocated_as_used(err: RepoError) -> AppError {
    match err {
        RepoError::Conflict(msg) => AppError::with_message(ErrorCode::VoucherAlreadyUsed, msg),
        RepoError::NotFound(msg) => AppError::with_message(ErrorCode::VoucherNotFound, msg),
        other => other.into(),
    }
}

/// Result of a bulk resend
#[derive(Debug, Clone, Default, Serialize)]
pub struct ResendSummary {
    /// Customers messaged
    pub groups: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Ids skipped because they are missing or not allocated
    pub skipped: usize,
}

/// Resend allocated vouchers, one delivery per customer and order
pub async fn resend(
    pool: &SqlitePool,
    notifier: &dyn Notifier,
    store_name: &str,
    ids: &[i64],
) -> Result<ResendSummary, AppError> {
    let mut unique = HashSet::new();
    let ids: Vec<i64> = ids.iter().copied().filter(|id| unique.insert(*id)).collect();
    let vouchers = voucher_repo::find_by_ids(pool, &ids).await?;
    let mut summary = ResendSummary {
        skipped: ids.len() - vouchers.len(),
        ..Default::default()
    };

    // (phone, customer, order) -> vouchers, in first-seen order
    let mut groups: Vec<((String, String, String), Vec<Voucher>)> = Vec::new();
    for voucher in vouchers {
        let (Some(phone), Some(order_ref)) = (voucher.customer_phone.clone(), voucher.order_ref.clone())
        else {
            summary.skipped += 1;
            continue;
        };
        let key = (phone, voucher.customer_name.clone().unwrap_or_default(), order_ref);
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, list)) => list.push(voucher),
            None => groups.push((key, vec![voucher])),
        }
    }

    for ((phone, customer, order_ref), vouchers) in &groups {
        let product_name = match product_repo::find_by_id(pool, vouchers[0].product_id).await? {
            Some(product) => product.name,
            None => String::new(),
        };
        let delivery = Delivery {
            store_name,
            customer_name: customer,
            customer_phone: phone,
            product_name: &product_name,
            order_number: order_ref,
        };
        let outcome = deliver(notifier, delivery, vouchers).await;
        summary.groups += 1;
        if outcome.is_success() {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
        }
        tracing::info!(
            order = %order_ref,
            vouchers = vouchers.len(),
            success = outcome.is_success(),
            "Vouchers resent"
        );
    }
    Ok(summary)
}

/// Resend a single allocated voucher
pub async fn resend_one(
    pool: &SqlitePool,
    notifier: &dyn Notifier,
    store_name: &str,
    id: i64,
) -> Result<Voucher, AppError> {
    let voucher = voucher_repo::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::with_message(ErrorCode::VoucherNotFound, format!("Voucher {id} not found")))?;
    if voucher.customer_phone.is_none() || voucher.order_ref.is_none() {
        return Err(AppError::with_message(
            ErrorCode::VoucherNotAllocated,
            format!("Voucher {id} has not been sent to a customer"),
        ));
    }

    let summary = resend(pool, notifier, store_name, &[id]).await?;
    if summary.succeeded == 0 {
        return Err(AppError::with_message(
            ErrorCode::VoucherResendFailed,
            format!("Failed to resend voucher {id}"),
        ));
    }
    Ok(voucher)
}
