//! `SqliteDatabase` is a concrete implementation of the marketplace order store.
//!
//! Unsurprisingly, it uses SQLite as the backend. Transaction boundaries live here; the per-table SQL lives in the
//! [`db`](super::db) module as plain functions over a `SqliteConnection`.
use std::fmt::Debug;

use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, history, new_pool, orders};
use crate::{
    db_types::{ItemKey, NewOrder, OrderId, OrderItem, StatusHistoryEntry},
    fulfillment_api::order_objects::{FullOrder, OrderQueryFilter},
    traits::{OrderStore, OrderStoreError, StatusChangeSet, TrackingUpdate},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, OrderStoreError> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, OrderStoreError> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Brings the schema up to date. Safe to call on every startup.
    pub async fn run_migrations(&self) -> Result<(), OrderStoreError> {
        sqlx::migrate!("./src/sqlite/migrations")
            .run(&self.pool)
            .await
            .map_err(|e| OrderStoreError::DatabaseError(e.to_string()))?;
        info!("🗃️ Database migrations complete");
        Ok(())
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

impl OrderStore for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn insert_order(
        &self,
        order: NewOrder,
        order_id: OrderId,
        order_number: String,
    ) -> Result<(FullOrder, bool), OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        if let Some(existing) = orders::fetch_order_row(&order_id, &mut tx).await? {
            let items = orders::fetch_items(&order_id, &mut tx).await?;
            tx.commit().await?;
            return Ok((FullOrder::new(existing, items), false));
        }
        let row = orders::insert_order(&order, &order_id, &order_number, &mut tx).await?;
        let items = orders::insert_items(&order, &order_id, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {order_id} has been saved in the DB with id {}", row.id);
        Ok((FullOrder::new(row, items), true))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<FullOrder>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let Some(row) = orders::fetch_order_row(order_id, &mut conn).await? else {
            return Ok(None);
        };
        let items = orders::fetch_items(order_id, &mut conn).await?;
        Ok(Some(FullOrder::new(row, items)))
    }

    /// Applies the whole change set in a single transaction. The order row write carries the version guard; if it
    /// reports a stale version the transaction is dropped and nothing, including history, is persisted.
    async fn commit_status_change(&self, change: StatusChangeSet) -> Result<FullOrder, OrderStoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::guarded_order_update(&change, &mut tx).await?;
        for patch in &change.item_patches {
            orders::apply_item_patch(&change.order_id, patch, &mut tx).await?;
        }
        for entry in &change.history {
            history::insert_entry(&change.order_id, entry, &mut tx).await?;
        }
        let items = orders::fetch_items(&change.order_id, &mut tx).await?;
        tx.commit().await?;
        trace!(
            "🗃️ Committed change set for order {} (now at version {}): {} item patch(es), {} history entries",
            change.order_id,
            order.version,
            change.item_patches.len(),
            change.history.len()
        );
        Ok(FullOrder::new(order, items))
    }

    async fn update_tracking(
        &self,
        order_id: &OrderId,
        item: &ItemKey,
        tracking: TrackingUpdate,
    ) -> Result<OrderItem, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let item = orders::update_tracking(order_id, item, &tracking, &mut conn).await?;
        trace!("🗃️ Tracking metadata stored for item {} on order {order_id}", item.product_id);
        Ok(item)
    }

    async fn history_for_order(&self, order_id: &OrderId) -> Result<Vec<StatusHistoryEntry>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(history::entries_for_order(order_id, &mut conn).await?)
    }

    async fn history_for_vendor(&self, vendor_id: &str) -> Result<Vec<StatusHistoryEntry>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        Ok(history::entries_for_vendor(vendor_id, &mut conn).await?)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<FullOrder>, OrderStoreError> {
        let mut conn = self.pool.acquire().await?;
        let rows = orders::search_orders(query, &mut conn).await?;
        let mut result = Vec::with_capacity(rows.len());
        for row in rows {
            let items = orders::fetch_items(&row.order_id, &mut conn).await?;
            result.push(FullOrder::new(row, items));
        }
        Ok(result)
    }

    async fn close(&mut self) -> Result<(), OrderStoreError> {
        self.pool.close().await;
        Ok(())
    }
}
