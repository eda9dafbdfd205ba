//! Product API Handlers

use axum::{
    Json,
    extract::{Multipart, Path, State},
};
use serde::Serialize;
use shared::models::{
    ImportSummary, Product, ProductCreate, ProductStock, Voucher, VoucherCreate, VoucherImport,
};

use crate::core::ServerState;
use crate::db::repository::{RepoError, product as product_repo, voucher as voucher_repo};
use crate::extraction::{ExtractError, extract_codes, parse_text_file_lines};
use crate::inventory;
use crate::utils::error::multipart_error;
use crate::utils::{ApiResponse, AppError, AppResult, ErrorCode};

/// List products with total / available / used counts
pub async fn list(State(state): State<ServerState>) -> AppResult<Json<ApiResponse<Vec<ProductStock>>>> {
    let products = product_repo::find_all_with_stock(&state.pool).await?;
    Ok(Json(ApiResponse::success(products)))
}

/// Register a product
pub async fn create(
    State(state): State<ServerState>,
    Json(payload): Json<ProductCreate>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let product = product_repo::create(&state.pool, payload)
        .await
        .map_err(product_error)?;
    tracing::info!(product_id = product.id, name = %product.name, "Product created");
    Ok(Json(ApiResponse::success(product)))
}

/// Deactivate or reactivate a product
pub async fn toggle(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let product = product_repo::toggle_active(&state.pool, id)
        .await
        .map_err(product_error)?;
    tracing::info!(product_id = id, active = product.is_active, "Product toggled");
    Ok(Json(ApiResponse::success(product)))
}

/// Vouchers registered for a product
pub async fn list_vouchers(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
) -> AppResult<Json<ApiResponse<Vec<Voucher>>>> {
    if product_repo::find_by_id(&state.pool, id).await?.is_none() {
        return Err(product_not_found(id));
    }
    let vouchers = voucher_repo::find_by_product(&state.pool, id).await?;
    Ok(Json(ApiResponse::success(vouchers)))
}

/// JSON import: manual code lines or a single link voucher
pub async fn import_vouchers(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    Json(payload): Json<VoucherImport>,
) -> AppResult<Json<ApiResponse<ImportSummary>>> {
    let items = match payload {
        VoucherImport::Manual { codes } => inventory::manual_vouchers(&codes),
        VoucherImport::Link {
            url,
            description,
            message,
        } => vec![inventory::link_voucher(
            &url,
            description.as_deref(),
            message.as_deref(),
        )?],
    };
    if items.is_empty() {
        return Err(AppError::with_message(
            ErrorCode::NoValidVouchers,
            "No voucher codes provided",
        ));
    }

    let summary = inventory::import(&state.pool, id, items).await?;
    Ok(Json(ApiResponse::success_with_message(
        format!("Added {} vouchers ({} skipped)", summary.added, summary.skipped),
        summary,
    )))
}

/// Multipart upload result
#[derive(Debug, Serialize)]
pub struct UploadSummary {
    pub added: usize,
    pub skipped: usize,
    /// Lines or candidates that failed format validation
    pub rejected: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum UploadMode {
    /// Text file or image scanned for codes
    File,
    /// Image stored as an image voucher
    Image,
}

impl UploadMode {
    fn parse(value: &str) -> AppResult<Self> {
        match value.trim() {
            "" | "file" => Ok(UploadMode::File),
            "image" => Ok(UploadMode::Image),
            other => Err(AppError::validation(format!(
                "Unknown upload mode '{other}', expected 'file' or 'image'"
            ))),
        }
    }
}

/// Multipart import
///
/// Fields: `mode` (`file` | `image`), optional `description`, and `file`.
pub async fn upload_vouchers(
    State(state): State<ServerState>,
    Path(id): Path<i64>,
    mut multipart: Multipart,
) -> AppResult<Json<ApiResponse<UploadSummary>>> {
    let mut mode = UploadMode::File;
    let mut description: Option<String> = None;
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "mode" => mode = UploadMode::parse(&field.text().await.map_err(multipart_error)?)?,
            "description" => description = Some(field.text().await.map_err(multipart_error)?),
            "file" => {
                let filename = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| AppError::new(ErrorCode::NoFilename))?;
                let data = field.bytes().await.map_err(multipart_error)?;
                file = Some((filename, data.to_vec()));
            }
            other => tracing::debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    let (filename, data) = file.ok_or_else(|| AppError::new(ErrorCode::NoFileProvided))?;
    if data.is_empty() {
        return Err(AppError::new(ErrorCode::EmptyFile));
    }

    let (items, rejected) = match mode {
        UploadMode::Image => {
            let item = inventory::store_image_voucher(
                &state.config.voucher_upload_dir(),
                &filename,
                &data,
                description.as_deref(),
            )
            .await?;
            (vec![item], 0)
        }
        UploadMode::File => scan_file(&state, &filename, &data).await?,
    };
    if items.is_empty() {
        return Err(AppError::with_message(
            ErrorCode::NoValidVouchers,
            format!("No valid voucher codes found in '{filename}'"),
        )
        .with_detail("rejected", rejected));
    }

    let summary = inventory::import(&state.pool, id, items).await?;
    Ok(Json(ApiResponse::success_with_message(
        format!(
            "Added {} vouchers ({} skipped, {} rejected)",
            summary.added, summary.skipped, rejected
        ),
        UploadSummary {
            added: summary.added,
            skipped: summary.skipped,
            rejected,
        },
    )))
}

/// Codes from a text file, or from an image through the extractor
async fn scan_file(
    state: &ServerState,
    filename: &str,
    data: &[u8],
) -> AppResult<(Vec<VoucherCreate>, usize)> {
    if inventory::is_text_filename(filename) {
        let content = String::from_utf8_lossy(data);
        let (codes, rejected) = parse_text_file_lines(&content);
        return Ok((codes.into_iter().map(VoucherCreate::code).collect(), rejected));
    }
    if inventory::is_image_filename(filename) {
        let codes = extract_codes(state.extractor.as_ref(), data)
            .await
            .map_err(extraction_error)?;
        return Ok((codes.into_iter().map(VoucherCreate::code).collect(), 0));
    }
    Err(AppError::with_message(
        ErrorCode::UnsupportedFileFormat,
        format!("Unsupported file '{filename}'"),
    ))
}

fn extraction_error(err: ExtractError) -> AppError {
    match err {
        ExtractError::NotConfigured => AppError::with_message(ErrorCode::ConfigError, err.to_string()),
        ExtractError::InvalidImage(_) => {
            AppError::with_message(ErrorCode::InvalidImageFile, err.to_string())
        }
        ExtractError::Service(_) => AppError::external(err.to_string()),
    }
}

fn product_not_found(id: i64) -> AppError {
    AppError::with_message(ErrorCode::ProductNotFound, format!("Product {id} not found"))
}

fn product_error(err: RepoError) -> AppError {
    match err {
        RepoError::Duplicate(msg) => AppError::with_message(ErrorCode::ProductNameExists, msg),
        RepoError::NotFound(msg) => AppError::with_message(ErrorCode::ProductNotFound, msg),
        other => other.into(),
    }
}
