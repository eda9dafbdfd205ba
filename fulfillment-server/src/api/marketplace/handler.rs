//! Marketplace Catalog Handlers

use axum::{
    Json,
    extract::{Query, State},
};
use serde::Deserialize;

use crate::core::ServerState;
use crate::db::repository::product as product_repo;
use crate::fulfillment::matcher::resolve_product;
use crate::marketplace::{CatalogPage, MarketplaceError};
use crate::utils::{ApiResponse, AppError, AppResult, ErrorCode};

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub keyword: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
}

/// Search the seller's listings and mark the ones already registered
pub async fn search_products(
    State(state): State<ServerState>,
    Query(query): Query<SearchQuery>,
) -> AppResult<Json<ApiResponse<CatalogPage>>> {
    let mut catalog = state
        .catalog
        .search_products(query.keyword.as_deref(), query.page.unwrap_or(1))
        .await
        .map_err(catalog_error)?;

    let products = product_repo::find_active(&state.pool).await?;
    for listing in &mut catalog.products {
        listing.registered_product_id = resolve_product(&products, &listing.name).map(|p| p.id);
    }

    let unregistered = catalog
        .products
        .iter()
        .filter(|p| p.registered_product_id.is_none())
        .count();
    Ok(Json(ApiResponse::success_with_message(
        format!(
            "{} listings, {unregistered} without a registered product",
            catalog.products.len()
        ),
        catalog,
    )))
}

fn catalog_error(err: MarketplaceError) -> AppError {
    match err {
        MarketplaceError::NotConfigured => AppError::with_message(ErrorCode::ConfigError, err.to_string()),
        other => {
            tracing::warn!(error = %other, "Marketplace product search failed");
            AppError::external(other.to_string())
        }
    }
}
