use thiserror::Error;

use crate::{
    db_types::{ItemKey, NewOrder, OrderId, OrderItem, StatusHistoryEntry},
    fulfillment_api::order_objects::{FullOrder, OrderQueryFilter},
    traits::{StatusChangeSet, TrackingUpdate},
};

/// Durable persistence for the Order aggregate and its append-only history.
///
/// The store's obligations are narrow but strict:
/// * [`commit_status_change`](OrderStore::commit_status_change) applies a whole change set atomically, guarded by the
///   aggregate's version counter. Order row, item rows and history entries land together or not at all.
/// * History entries are append-only. Nothing in this trait can update or delete one, and dropping an order does not
///   cascade into its history.
#[allow(async_fn_in_trait)]
pub trait OrderStore: Clone {
    /// The URL of the backing database.
    fn url(&self) -> &str;

    /// Stores a new order and its line items in one transaction. Idempotent on the order id: if the order already
    /// exists, the stored aggregate is returned and the second element is `false`.
    async fn insert_order(&self, order: NewOrder, order_id: OrderId, order_number: String)
        -> Result<(FullOrder, bool), OrderStoreError>;

    /// Fetches the aggregate (order plus items in insertion order), or `None` if the order does not exist.
    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<FullOrder>, OrderStoreError>;

    /// Applies the change set in a single transaction, conditional on `expected_version`. Returns the updated
    /// aggregate. Fails with [`OrderStoreError::VersionConflict`] when another writer got there first, and with
    /// [`OrderStoreError::ItemNotFound`] when a patch targets an item the order does not have.
    async fn commit_status_change(&self, change: StatusChangeSet) -> Result<FullOrder, OrderStoreError>;

    /// Sets carrier metadata on one line item. No status effect, no version bump, no history entry.
    async fn update_tracking(
        &self,
        order_id: &OrderId,
        item: &ItemKey,
        tracking: TrackingUpdate,
    ) -> Result<OrderItem, OrderStoreError>;

    /// The full timeline for an order, newest first.
    async fn history_for_order(&self, order_id: &OrderId) -> Result<Vec<StatusHistoryEntry>, OrderStoreError>;

    /// Every item-level entry touching the given vendor, newest first.
    async fn history_for_vendor(&self, vendor_id: &str) -> Result<Vec<StatusHistoryEntry>, OrderStoreError>;

    /// Fetches orders according to criteria specified in the `OrderQueryFilter`.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<FullOrder>, OrderStoreError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), OrderStoreError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum OrderStoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The requested order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Order {order_id} has no line item {item}")]
    ItemNotFound { order_id: OrderId, item: ItemKey },
    #[error("Cannot insert order, since it already exists with id {0}")]
    OrderAlreadyExists(OrderId),
    #[error("Write to order {0} was stale: another writer committed first")]
    VersionConflict(OrderId),
}

impl From<sqlx::Error> for OrderStoreError {
    fn from(e: sqlx::Error) -> Self {
        OrderStoreError::DatabaseError(e.to_string())
    }
}
