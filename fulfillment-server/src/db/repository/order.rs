//! Fulfillment Order Repository

use super::{RepoError, RepoResult};
use shared::models::{Order, OrderCreate, OrderStatus};
use shared::util::now_millis;
use sqlx::{SqliteConnection, SqlitePool};

const ORDER_COLUMNS: &str = "id, order_number, product_name, customer_name, customer_phone, \
     quantity, unit_price, status, ordered_at, collected_at, notes, reconciled";

/// Insert an order unless its number is already stored
///
/// Returns `true` when a new row was written.
pub async fn insert_if_absent(pool: &SqlitePool, order: &OrderCreate) -> RepoResult<bool> {
    let result = sqlx::query(
        "INSERT INTO fulfillment_order \
         (order_number, product_name, customer_name, customer_phone, quantity, unit_price, \
          status, ordered_at, collected_at, reconciled) \
         VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?, 0) \
         ON CONFLICT(order_number) DO NOTHING",
    )
    .bind(&order.order_number)
    .bind(&order.product_name)
    .bind(&order.customer_name)
    .bind(&order.customer_phone)
    .bind(order.quantity)
    .bind(order.unit_price)
    .bind(order.ordered_at.as_deref())
    .bind(now_millis())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() == 1)
}

/// Pending orders, oldest ingestion first
pub async fn find_pending(pool: &SqlitePool) -> RepoResult<Vec<Order>> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM fulfillment_order WHERE status = 'pending' \
         ORDER BY collected_at, id"
    );
    let orders = sqlx::query_as::<_, Order>(&sql).fetch_all(pool).await?;
    Ok(orders)
}

/// Orders for the management listing, newest first
pub async fn find_all(pool: &SqlitePool, status: Option<OrderStatus>) -> RepoResult<Vec<Order>> {
    let orders = match status {
        Some(status) => {
            let sql = format!(
                "SELECT {ORDER_COLUMNS} FROM fulfillment_order WHERE status = ? \
                 ORDER BY collected_at DESC, id DESC"
            );
            sqlx::query_as::<_, Order>(&sql)
                .bind(status)
                .fetch_all(pool)
                .await?
        }
        None => {
            let sql = format!(
                "SELECT {ORDER_COLUMNS} FROM fulfillment_order ORDER BY collected_at DESC, id DESC"
            );
            sqlx::query_as::<_, Order>(&sql).fetch_all(pool).await?
        }
    };
    Ok(orders)
}

pub async fn find_by_number(pool: &SqlitePool, order_number: &str) -> RepoResult<Option<Order>> {
    let sql = format!("SELECT {ORDER_COLUMNS} FROM fulfillment_order WHERE order_number = ?");
    let order = sqlx::query_as::<_, Order>(&sql)
        .bind(order_number)
        .fetch_optional(pool)
        .await?;
    Ok(order)
}

/// Mark a pending order completed (inside the dispatch transaction)
pub async fn mark_completed(conn: &mut SqliteConnection, id: i64) -> RepoResult<()> {
    let result = sqlx::query(
        "UPDATE fulfillment_order SET status = 'completed', notes = NULL \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(id)
    .execute(conn)
    .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!("Order {id} is no longer pending")));
    }
    Ok(())
}

/// Mark a pending order failed with a human-readable note
pub async fn mark_error(pool: &SqlitePool, id: i64, note: &str) -> RepoResult<()> {
    sqlx::query(
        "UPDATE fulfillment_order SET status = 'error', notes = ? \
         WHERE id = ? AND status = 'pending'",
    )
    .bind(note)
    .bind(id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_reconciled(pool: &SqlitePool, id: i64) -> RepoResult<()> {
    sqlx::query("UPDATE fulfillment_order SET reconciled = 1 WHERE id = ?")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Completed orders the marketplace has not acknowledged yet
pub async fn find_unreconciled(pool: &SqlitePool, limit: i64) -> RepoResult<Vec<Order>> {
    let sql = format!(
        "SELECT {ORDER_COLUMNS} FROM fulfillment_order \
         WHERE status = 'completed' AND reconciled = 0 ORDER BY id LIMIT ?"
    );
    let orders = sqlx::query_as::<_, Order>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(orders)
}

/// Return an `error` order to `pending` so the next run retries it
pub async fn reset(pool: &SqlitePool, order_number: &str) -> RepoResult<Order> {
    let result = sqlx::query(
        "UPDATE fulfillment_order SET status = 'pending', notes = NULL \
         WHERE order_number = ? AND status = 'error'",
    )
    .bind(order_number)
    .execute(pool)
    .await?;

    let order = find_by_number(pool, order_number)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Order {order_number} not found")))?;
    if result.rows_affected() == 0 {
        return Err(RepoError::Conflict(format!(
            "Order {order_number} is {} and cannot be reset",
            order.status
        )));
    }
    Ok(order)
}
