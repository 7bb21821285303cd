use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{ItemKey, NewOrder, Order, OrderId, OrderItem},
    fulfillment_api::order_objects::OrderQueryFilter,
    traits::{ItemPatch, OrderStoreError, StatusChangeSet, TrackingUpdate},
};

/// Inserts a new order row. The caller wraps this in a transaction together with [`insert_items`].
pub async fn insert_order(
    order: &NewOrder,
    order_id: &OrderId,
    order_number: &str,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderStoreError> {
    let row = sqlx::query_as(
        r#"
            INSERT INTO orders (order_id, order_number, customer_id, currency, total_price)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(order_id.as_str())
    .bind(order_number)
    .bind(&order.customer_id)
    .bind(&order.currency)
    .bind(order.total_price().value())
    .fetch_one(conn)
    .await
    .map_err(|e| match &e {
        sqlx::Error::Database(db) if db.is_unique_violation() => OrderStoreError::OrderAlreadyExists(order_id.clone()),
        _ => OrderStoreError::from(e),
    })?;
    Ok(row)
}

/// Inserts the line items for a freshly created order, preserving the checkout order. Line totals are snapshotted
/// here and never recomputed.
pub async fn insert_items(
    order: &NewOrder,
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Vec<OrderItem>, OrderStoreError> {
    let mut items = Vec::with_capacity(order.items.len());
    for item in &order.items {
        let row: OrderItem = sqlx::query_as(
            r#"
                INSERT INTO order_items (order_id, product_id, vendor_id, qty, unit_price, line_total)
                VALUES ($1, $2, $3, $4, $5, $6)
                RETURNING *;
            "#,
        )
        .bind(order_id.as_str())
        .bind(&item.product_id)
        .bind(&item.vendor_id)
        .bind(item.qty)
        .bind(item.unit_price.value())
        .bind(item.line_total().value())
        .fetch_one(&mut *conn)
        .await?;
        items.push(row);
    }
    Ok(items)
}

pub async fn fetch_order_row(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id.as_str()).fetch_optional(conn).await
}

/// Items in insertion order. Insertion order is display order and is never changed.
pub async fn fetch_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<OrderItem>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM order_items WHERE order_id = $1 ORDER BY id ASC")
        .bind(order_id.as_str())
        .fetch_all(conn)
        .await
}

/// The version-guarded aggregate write. Bumps `version` and applies order-level fields from the change set; milestone
/// timestamps use `COALESCE(existing, new)` so a timestamp is written exactly once and never cleared or overwritten.
///
/// Returns the updated row, or an error distinguishing a missing order from a stale `expected_version`.
pub async fn guarded_order_update(
    change: &StatusChangeSet,
    conn: &mut SqliteConnection,
) -> Result<Order, OrderStoreError> {
    let legacy = change.order_status.map(|s| s.as_legacy());
    let updated: Option<Order> = sqlx::query_as(
        r#"
            UPDATE orders SET
                order_status = COALESCE($1, order_status),
                legacy_status = COALESCE($2, legacy_status),
                payment_status = COALESCE($3, payment_status),
                confirmed_at = COALESCE(confirmed_at, $4),
                shipped_at = COALESCE(shipped_at, $5),
                delivered_at = COALESCE(delivered_at, $6),
                cancelled_at = COALESCE(cancelled_at, $7),
                updated_at = CURRENT_TIMESTAMP,
                version = version + 1
            WHERE order_id = $8 AND version = $9
            RETURNING *;
        "#,
    )
    .bind(change.order_status)
    .bind(legacy)
    .bind(change.payment_status)
    .bind(change.stamps.confirmed_at)
    .bind(change.stamps.shipped_at)
    .bind(change.stamps.delivered_at)
    .bind(change.stamps.cancelled_at)
    .bind(change.order_id.as_str())
    .bind(change.expected_version)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(order) => Ok(order),
        None => {
            // Either the order does not exist, or another writer bumped the version since our read.
            match fetch_order_row(&change.order_id, conn).await? {
                Some(current) => {
                    debug!(
                        "📝️ Stale write to order {}: expected version {}, found {}",
                        change.order_id, change.expected_version, current.version
                    );
                    Err(OrderStoreError::VersionConflict(change.order_id.clone()))
                },
                None => Err(OrderStoreError::OrderNotFound(change.order_id.clone())),
            }
        },
    }
}

/// Applies one item patch. Notes are merged (`COALESCE`), never cleared.
pub async fn apply_item_patch(
    order_id: &OrderId,
    patch: &ItemPatch,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, OrderStoreError> {
    let updated: Option<OrderItem> = sqlx::query_as(
        r#"
            UPDATE order_items SET
                status = $1,
                vendor_note = COALESCE($2, vendor_note),
                internal_note = COALESCE($3, internal_note),
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $4 AND product_id = $5 AND vendor_id = $6
            RETURNING *;
        "#,
    )
    .bind(patch.status)
    .bind(&patch.vendor_note)
    .bind(&patch.internal_note)
    .bind(order_id.as_str())
    .bind(&patch.product_id)
    .bind(&patch.vendor_id)
    .fetch_optional(conn)
    .await?;
    updated.ok_or_else(|| OrderStoreError::ItemNotFound {
        order_id: order_id.clone(),
        item: ItemKey::new(patch.product_id.clone(), patch.vendor_id.clone()),
    })
}

/// Sets carrier metadata on one line item. Deliberately does not touch the order row: tracking is independent of
/// status and does not participate in the version guard.
pub async fn update_tracking(
    order_id: &OrderId,
    item: &ItemKey,
    tracking: &TrackingUpdate,
    conn: &mut SqliteConnection,
) -> Result<OrderItem, OrderStoreError> {
    let updated: Option<OrderItem> = sqlx::query_as(
        r#"
            UPDATE order_items SET
                carrier = COALESCE($1, carrier),
                tracking_number = COALESCE($2, tracking_number),
                updated_at = CURRENT_TIMESTAMP
            WHERE order_id = $3 AND product_id = $4 AND vendor_id = $5
            RETURNING *;
        "#,
    )
    .bind(&tracking.carrier)
    .bind(&tracking.tracking_number)
    .bind(order_id.as_str())
    .bind(&item.product_id)
    .bind(&item.vendor_id)
    .fetch_optional(conn)
    .await?;
    updated.ok_or_else(|| OrderStoreError::ItemNotFound { order_id: order_id.clone(), item: item.clone() })
}

/// Fetches order rows according to criteria specified in the `OrderQueryFilter`, ordered by `created_at` ascending.
/// A `vendor_id` filter matches orders carrying at least one of the vendor's items.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new("SELECT * FROM orders ");
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(order_id) = query.order_id {
        where_clause.push("order_id = ");
        where_clause.push_bind_unseparated(order_id.0);
    }
    if let Some(cid) = query.customer_id {
        where_clause.push("customer_id = ");
        where_clause.push_bind_unseparated(cid);
    }
    if let Some(vendor_id) = query.vendor_id {
        where_clause.push("order_id IN (SELECT order_id FROM order_items WHERE vendor_id = ");
        where_clause.push_bind_unseparated(vendor_id);
        where_clause.push_unseparated(")");
    }
    if query.order_status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let statuses =
            query.order_status.as_ref().unwrap().iter().map(|s| format!("'{s}'")).collect::<Vec<_>>().join(",");
        where_clause.push(format!("order_status IN ({statuses})"));
    }
    if let Some(since) = query.since {
        where_clause.push("created_at >= ");
        where_clause.push_bind_unseparated(since);
    }
    if let Some(until) = query.until {
        where_clause.push("created_at <= ");
        where_clause.push_bind_unseparated(until);
    }
    builder.push(" ORDER BY created_at ASC");

    trace!("📝️ Executing query: {}", builder.sql());
    let orders = builder.build_query_as::<Order>().fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}
