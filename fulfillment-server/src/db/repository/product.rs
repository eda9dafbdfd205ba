//! Product Repository

use super::{RepoError, RepoResult};
use shared::models::{Product, ProductCreate, ProductStock};
use shared::util::now_millis;
use sqlx::SqlitePool;

const PRODUCT_COLUMNS: &str = "id, name, category, price, description, is_active, created_at";

/// All products with inventory counts, newest first
pub async fn find_all_with_stock(pool: &SqlitePool) -> RepoResult<Vec<ProductStock>> {
    let rows = sqlx::query_as::<_, ProductStock>(
        "SELECT p.id, p.name, p.category, p.price, p.is_active, \
         COUNT(v.id) AS total, \
         COALESCE(SUM(CASE WHEN v.used = 0 AND v.order_ref IS NULL THEN 1 ELSE 0 END), 0) AS available, \
         COALESCE(SUM(CASE WHEN v.used = 1 THEN 1 ELSE 0 END), 0) AS used \
         FROM product p LEFT JOIN voucher v ON v.product_id = p.id \
         GROUP BY p.id ORDER BY p.id DESC",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE id = ?");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(product)
}

/// Active products in registration order (matching candidates)
pub async fn find_active(pool: &SqlitePool) -> RepoResult<Vec<Product>> {
    let sql = format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE is_active = 1 ORDER BY id");
    let products = sqlx::query_as::<_, Product>(&sql).fetch_all(pool).await?;
    Ok(products)
}

pub async fn find_active_by_name(pool: &SqlitePool, name: &str) -> RepoResult<Option<Product>> {
    let sql =
        format!("SELECT {PRODUCT_COLUMNS} FROM product WHERE name = ? AND is_active = 1 LIMIT 1");
    let product = sqlx::query_as::<_, Product>(&sql)
        .bind(name)
        .fetch_optional(pool)
        .await?;
    Ok(product)
}

/// Register a product; the name must be unique among active products
pub async fn create(pool: &SqlitePool, data: ProductCreate) -> RepoResult<Product> {
    let name = data.name.trim();
    if name.is_empty() {
        return Err(RepoError::Validation("Product name is required".into()));
    }
    if data.price < 0 {
        return Err(RepoError::Validation("Price must not be negative".into()));
    }
    if find_active_by_name(pool, name).await?.is_some() {
        return Err(RepoError::Duplicate(format!("Product '{name}' already exists")));
    }

    let id: i64 = sqlx::query_scalar(
        "INSERT INTO product (name, category, price, description, is_active, created_at) \
         VALUES (?, ?, ?, ?, 1, ?) RETURNING id",
    )
    .bind(name)
    .bind(data.category.as_deref().map(str::trim).unwrap_or_default())
    .bind(data.price)
    .bind(data.description.as_deref())
    .bind(now_millis())
    .fetch_one(pool)
    .await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::Database("Failed to create product".into()))
}

/// Flip the active flag; reactivation re-checks name uniqueness
pub async fn toggle_active(pool: &SqlitePool, id: i64) -> RepoResult<Product> {
    let product = find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Product {id} not found")))?;

    let activate = !product.is_active;
    if activate && find_active_by_name(pool, &product.name).await?.is_some() {
        return Err(RepoError::Duplicate(format!(
            "Another active product is named '{}'",
            product.name
        )));
    }

    sqlx::query("UPDATE product SET is_active = ? WHERE id = ?")
        .bind(activate)
        .bind(id)
        .execute(pool)
        .await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Product {id} not found")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;

    fn create_payload(name: &str) -> ProductCreate {
        ProductCreate {
            name: name.to_string(),
            category: Some("gift".to_string()),
            price: 10_000,
            description: None,
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let db = DbService::in_memory().await.unwrap();
        let product = create(&db.pool, create_payload("  Culture Voucher ")).await.unwrap();
        assert_eq!(product.name, "Culture Voucher");
        assert!(product.is_active);

        let found = find_active_by_name(&db.pool, "Culture Voucher").await.unwrap();
        assert_eq!(found.map(|p| p.id), Some(product.id));
    }

    #[tokio::test]
    async fn test_duplicate_active_name_rejected() {
        let db = DbService::in_memory().await.unwrap();
        create(&db.pool, create_payload("Book Voucher")).await.unwrap();
        let err = create(&db.pool, create_payload("Book Voucher")).await.unwrap_err();
        assert!(matches!(err, RepoError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_empty_name_rejected() {
        let db = DbService::in_memory().await.unwrap();
        let err = create(&db.pool, create_payload("   ")).await.unwrap_err();
        assert!(matches!(err, RepoError::Validation(_)));
    }

    #[tokio::test]
    async fn test_deactivated_name_can_be_reused_but_not_reactivated() {
        let db = DbService::in_memory().await.unwrap();
        let first = create(&db.pool, create_payload("Coffee")).await.unwrap();
        let toggled = toggle_active(&db.pool, first.id).await.unwrap();
        assert!(!toggled.is_active);

        create(&db.pool, create_payload("Coffee")).await.unwrap();
        let err = toggle_active(&db.pool, first.id).await.unwrap_err();
        assert!(matches!(err, RepoError::Duplicate(_)));
    }

    #[tokio::test]
    async fn test_stock_counts() {
        let db = DbService::in_memory().await.unwrap();
        let product = create(&db.pool, create_payload("Movie")).await.unwrap();
        for (payload, used) in [("AAA111", 0), ("BBB222", 0), ("CCC333", 1)] {
            sqlx::query(
                "INSERT INTO voucher (product_id, payload, kind, used, order_ref, created_at) \
                 VALUES (?, ?, 'code', ?, ?, 0)",
            )
            .bind(product.id)
            .bind(payload)
            .bind(used)
            .bind(if used == 1 { Some("O-1") } else { None })
            .execute(&db.pool)
            .await
            .unwrap();
        }

        let rows = find_all_with_stock(&db.pool).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!((rows[0].total, rows[0].available, rows[0].used), (3, 2, 1));
    }

    #[tokio::test]
    async fn test_toggle_missing_product() {
        let db = DbService::in_memory().await.unwrap();
        let err = toggle_active(&db.pool, 42).await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }
}
