use sqlx::SqliteConnection;

use crate::db_types::{NewStatusHistoryEntry, OrderId, StatusHistoryEntry};

/// Appends one history entry. There is no update or delete counterpart anywhere in this module: the table is
/// append-only by construction.
pub async fn insert_entry(
    order_id: &OrderId,
    entry: &NewStatusHistoryEntry,
    conn: &mut SqliteConnection,
) -> Result<StatusHistoryEntry, sqlx::Error> {
    sqlx::query_as(
        r#"
            INSERT INTO status_history
                (order_id, level, item_product_id, item_vendor_id, from_status, to_status, actor_id, actor_role, note)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(entry.level)
    .bind(&entry.item_product_id)
    .bind(&entry.item_vendor_id)
    .bind(&entry.from_status)
    .bind(&entry.to_status)
    .bind(&entry.actor_id)
    .bind(entry.actor_role)
    .bind(&entry.note)
    .fetch_one(conn)
    .await
}

/// The timeline for an order, newest first. Entries created in the same transaction share a timestamp, so the row id
/// breaks ties.
pub async fn entries_for_order(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<StatusHistoryEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM status_history WHERE order_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

/// Every item-level entry touching the given vendor, newest first.
pub async fn entries_for_vendor(
    vendor_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<StatusHistoryEntry>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM status_history WHERE item_vendor_id = $1 ORDER BY created_at DESC, id DESC")
        .bind(vendor_id)
        .fetch_all(conn)
        .await
}
