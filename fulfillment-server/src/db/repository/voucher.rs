//! Voucher Repository
//!
//! Allocation is guarded in SQL: a voucher only transitions when it is still
//! `used = 0 AND order_ref IS NULL`, so an item can never be claimed twice.

use super::{RepoError, RepoResult};
use shared::models::{Voucher, VoucherCreate};
use shared::util::now_millis;
use sqlx::{SqliteConnection, SqlitePool};

const VOUCHER_COLUMNS: &str = "id, product_id, payload, kind, description, used, used_at, \
     customer_name, customer_phone, order_ref, created_at";

const AVAILABLE: &str = "used = 0 AND order_ref IS NULL";

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> RepoResult<Option<Voucher>> {
    let sql = format!("SELECT {VOUCHER_COLUMNS} FROM voucher WHERE id = ?");
    let voucher = sqlx::query_as::<_, Voucher>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;
    Ok(voucher)
}

pub async fn find_by_ids(pool: &SqlitePool, ids: &[i64]) -> RepoResult<Vec<Voucher>> {
    let mut vouchers = Vec::with_capacity(ids.len());
    for id in ids {
        if let Some(v) = find_by_id(pool, *id).await? {
            vouchers.push(v);
        }
    }
    Ok(vouchers)
}

pub async fn find_by_product(pool: &SqlitePool, product_id: i64) -> RepoResult<Vec<Voucher>> {
    let sql = format!("SELECT {VOUCHER_COLUMNS} FROM voucher WHERE product_id = ? ORDER BY id");
    let vouchers = sqlx::query_as::<_, Voucher>(&sql)
        .bind(product_id)
        .fetch_all(pool)
        .await?;
    Ok(vouchers)
}

pub async fn find_by_order(pool: &SqlitePool, order_ref: &str) -> RepoResult<Vec<Voucher>> {
    let sql = format!("SELECT {VOUCHER_COLUMNS} FROM voucher WHERE order_ref = ? ORDER BY id");
    let vouchers = sqlx::query_as::<_, Voucher>(&sql)
        .bind(order_ref)
        .fetch_all(pool)
        .await?;
    Ok(vouchers)
}

/// Number of vouchers already allocated to an order (resumable orders)
pub async fn count_by_order(conn: &mut SqliteConnection, order_ref: &str) -> RepoResult<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM voucher WHERE order_ref = ?")
        .bind(order_ref)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Available vouchers for a product: image kind first, then insertion order
pub async fn find_available(
    conn: &mut SqliteConnection,
    product_id: i64,
    limit: i64,
) -> RepoResult<Vec<Voucher>> {
    let sql = format!(
        "SELECT {VOUCHER_COLUMNS} FROM voucher WHERE product_id = ? AND {AVAILABLE} \
         ORDER BY CASE WHEN kind = 'image' THEN 0 ELSE 1 END, id LIMIT ?"
    );
    let vouchers = sqlx::query_as::<_, Voucher>(&sql)
        .bind(product_id)
        .bind(limit)
        .fetch_all(conn)
        .await?;
    Ok(vouchers)
}

pub async fn count_available(conn: &mut SqliteConnection, product_id: i64) -> RepoResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM voucher WHERE product_id = ? AND {AVAILABLE}");
    let count: i64 = sqlx::query_scalar(&sql)
        .bind(product_id)
        .fetch_one(conn)
        .await?;
    Ok(count)
}

/// Claim one voucher for an order
///
/// Returns `false` if the voucher is no longer available or its payload no
/// longer matches the one read before delivery.
pub async fn allocate(
    conn: &mut SqliteConnection,
    voucher: &Voucher,
    order_ref: &str,
    customer_name: &str,
    customer_phone: &str,
) -> RepoResult<bool> {
    let sql = format!(
        "UPDATE voucher SET used = 1, used_at = ?, customer_name = ?, customer_phone = ?, \
         order_ref = ? WHERE id = ? AND payload = ? AND {AVAILABLE}"
    );
    let result = sqlx::query(&sql)
        .bind(now_millis())
        .bind(customer_name)
        .bind(customer_phone)
        .bind(order_ref)
        .bind(voucher.id)
        .bind(&voucher.payload)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() == 1)
}

/// Insert vouchers for a product in one transaction
pub async fn insert_many(
    pool: &SqlitePool,
    product_id: i64,
    items: &[VoucherCreate],
) -> RepoResult<usize> {
    let mut tx = pool.begin().await?;
    let now = now_millis();
    for item in items {
        sqlx::query(
            "INSERT INTO voucher (product_id, payload, kind, description, used, created_at) \
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(product_id)
        .bind(&item.payload)
        .bind(item.kind)
        .bind(item.description.as_deref())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;
    Ok(items.len())
}

/// Whether a payload is already registered (optionally ignoring one voucher)
pub async fn payload_exists(
    pool: &SqlitePool,
    payload: &str,
    exclude_id: Option<i64>,
) -> RepoResult<bool> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM voucher WHERE payload = ? AND id != ?")
            .bind(payload)
            .bind(exclude_id.unwrap_or(-1))
            .fetch_one(pool)
            .await?;
    Ok(count > 0)
}

/// Replace the payload of an available voucher
pub async fn update_payload(pool: &SqlitePool, id: i64, payload: &str) -> RepoResult<Voucher> {
    let sql = format!("UPDATE voucher SET payload = ? WHERE id = ? AND {AVAILABLE}");
    let result = sqlx::query(&sql)
        .bind(payload)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return match find_by_id(pool, id).await? {
            Some(_) => Err(RepoError::Conflict(format!(
                "Voucher {id} is allocated and can no longer be edited"
            ))),
            None => Err(RepoError::NotFound(format!("Voucher {id} not found"))),
        };
    }

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Voucher {id} not found")))
}

/// Delete a voucher; allocated vouchers require `force`
pub async fn delete(pool: &SqlitePool, id: i64, force: bool) -> RepoResult<Voucher> {
    let voucher = find_by_id(pool, id)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Voucher {id} not found")))?;

    if !voucher.is_available() && !force {
        return Err(RepoError::Conflict(format!(
            "Voucher {id} is allocated to order {}",
            voucher.order_ref.as_deref().unwrap_or("-")
        )));
    }

    sqlx::query("DELETE FROM voucher WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(voucher)
}

/// Delete the available vouchers among `ids`, returns how many were removed
pub async fn delete_available(pool: &SqlitePool, ids: &[i64]) -> RepoResult<u64> {
    let mut tx = pool.begin().await?;
    let sql = format!("DELETE FROM voucher WHERE id = ? AND {AVAILABLE}");
    let mut removed = 0;
    for id in ids {
        removed += sqlx::query(&sql)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected();
    }
    tx.commit().await?;
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DbService;
    use crate::db::repository::product;
    use shared::models::{ProductCreate, VoucherKind};

    async fn setup() -> (DbService, i64) {
        let db = DbService::in_memory().await.unwrap();
        let p = product::create(
            &db.pool,
            ProductCreate {
                name: "Culture Voucher".into(),
                category: None,
                price: 5000,
                description: None,
            },
        )
        .await
        .unwrap();
        (db, p.id)
    }

    fn image(path: &str) -> VoucherCreate {
        VoucherCreate {
            payload: path.into(),
            kind: VoucherKind::Image,
            description: Some("Gift card image".into()),
        }
    }

    #[tokio::test]
    async fn test_available_prefers_images_then_insertion_order() {
        let (db, product_id) = setup().await;
        let items = vec![
            VoucherCreate::code("CODE-0001"),
            image("/tmp/a.png"),
            VoucherCreate::code("CODE-0002"),
            image("/tmp/b.png"),
            VoucherCreate::code("CODE-0003"),
        ];
        insert_many(&db.pool, product_id, &items).await.unwrap();

        let mut conn = db.pool.acquire().await.unwrap();
        let picked = find_available(&mut conn, product_id, 3).await.unwrap();
        let payloads: Vec<_> = picked.iter().map(|v| v.payload.as_str()).collect();
        assert_eq!(payloads, vec!["/tmp/a.png", "/tmp/b.png", "CODE-0001"]);
        assert_eq!(count_available(&mut conn, product_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_allocate_is_single_shot() {
        let (db, product_id) = setup().await;
        insert_many(&db.pool, product_id, &[VoucherCreate::code("ABC-12345")])
            .await
            .unwrap();
        let read = find_by_product(&db.pool, product_id).await.unwrap().remove(0);
        let id = read.id;

        let mut conn = db.pool.acquire().await.unwrap();
        assert!(allocate(&mut conn, &read, "O-1", "Kim", "01012345678").await.unwrap());
        assert!(!allocate(&mut conn, &read, "O-2", "Lee", "01099999999").await.unwrap());
        drop(conn);

        let voucher = find_by_id(&db.pool, id).await.unwrap().unwrap();
        assert!(voucher.used);
        assert_eq!(voucher.order_ref.as_deref(), Some("O-1"));
        assert_eq!(voucher.customer_name.as_deref(), Some("Kim"));
        assert!(voucher.used_at.is_some());
    }

    #[tokio::test]
    async fn test_update_payload_rejected_once_allocated() {
        let (db, product_id) = setup().await;
        insert_many(&db.pool, product_id, &[VoucherCreate::code("ABC-12345")])
            .await
            .unwrap();
        let id = find_by_product(&db.pool, product_id).await.unwrap()[0].id;

        let stale = find_by_id(&db.pool, id).await.unwrap().unwrap();
        let edited = update_payload(&db.pool, id, "XYZ-98765").await.unwrap();
        assert_eq!(edited.payload, "XYZ-98765");

        // A voucher read before the edit no longer matches
        let mut conn = db.pool.acquire().await.unwrap();
        assert!(!allocate(&mut conn, &stale, "O-1", "Kim", "010").await.unwrap());
        assert!(allocate(&mut conn, &edited, "O-1", "Kim", "010").await.unwrap());
        drop(conn);

        let err = update_payload(&db.pool, id, "NEW-11111").await.unwrap_err();
        assert!(matches!(err, RepoError::Conflict(_)));
        let err = update_payload(&db.pool, 999, "NEW-11111").await.unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_requires_force_for_allocated() {
        let (db, product_id) = setup().await;
        insert_many(
            &db.pool,
            product_id,
            &[VoucherCreate::code("ABC-12345"), VoucherCreate::code("DEF-67890")],
        )
        .await
        .unwrap();
        let vouchers = find_by_product(&db.pool, product_id).await.unwrap();
        let ids: Vec<i64> = vouchers.iter().map(|v| v.id).collect();

        let mut conn = db.pool.acquire().await.unwrap();
        allocate(&mut conn, &vouchers[0], "O-1", "Kim", "010").await.unwrap();
        drop(conn);

        assert!(matches!(
            delete(&db.pool, ids[0], false).await.unwrap_err(),
            RepoError::Conflict(_)
        ));
        assert_eq!(delete_available(&db.pool, &ids).await.unwrap(), 1);
        delete(&db.pool, ids[0], true).await.unwrap();
        assert!(find_by_product(&db.pool, product_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_payload_exists() {
        let (db, product_id) = setup().await;
        insert_many(&db.pool, product_id, &[VoucherCreate::code("ABC-12345")])
            .await
            .unwrap();
        let id = find_by_product(&db.pool, product_id).await.unwrap()[0].id;

        assert!(payload_exists(&db.pool, "ABC-12345", None).await.unwrap());
        assert!(!payload_exists(&db.pool, "ABC-12345", Some(id)).await.unwrap());
        assert!(!payload_exists(&db.pool, "ZZZ-00000", None).await.unwrap());
    }
}
