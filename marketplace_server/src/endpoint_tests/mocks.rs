use chrono::{TimeZone, Utc};
use fulfillment_engine::{
    db_types::{
        ItemKey,
        ItemStatus,
        NewOrder,
        Order,
        OrderId,
        OrderItem,
        OrderStatus,
        PaymentStatus,
        StatusHistoryEntry,
    },
    order_objects::{FullOrder, OrderQueryFilter},
    traits::{OrderStore, OrderStoreError, StatusChangeSet, TrackingUpdate},
};
use mockall::mock;
use mps_common::Money;

mock! {
    pub OrderStoreBackend {}

    impl Clone for OrderStoreBackend {
        fn clone(&self) -> Self;
    }

    impl OrderStore for OrderStoreBackend {
        fn url(&self) -> &str;
        async fn insert_order(&self, order: NewOrder, order_id: OrderId, order_number: String) -> Result<(FullOrder, bool), OrderStoreError>;
        async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<FullOrder>, OrderStoreError>;
        async fn commit_status_change(&self, change: StatusChangeSet) -> Result<FullOrder, OrderStoreError>;
        async fn update_tracking(&self, order_id: &OrderId, item: &ItemKey, tracking: TrackingUpdate) -> Result<OrderItem, OrderStoreError>;
        async fn history_for_order(&self, order_id: &OrderId) -> Result<Vec<StatusHistoryEntry>, OrderStoreError>;
        async fn history_for_vendor(&self, vendor_id: &str) -> Result<Vec<StatusHistoryEntry>, OrderStoreError>;
        async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<FullOrder>, OrderStoreError>;
    }
}

/// A two-vendor order fixture: `prod-a` from `vendor-a` and `prod-b` from `vendor-b`, both `PENDING`.
pub fn order_fixture() -> FullOrder {
    let t = Utc.with_ymd_and_hms(2026, 8, 5, 13, 30, 0).unwrap();
    let order_id = OrderId("ord0001".into());
    let order = Order {
        id: 1,
        order_id: order_id.clone(),
        order_number: "MP-20260805-TESTA1".to_string(),
        customer_id: "cust-1".to_string(),
        order_status: OrderStatus::Pending,
        legacy_status: "pending".to_string(),
        payment_status: PaymentStatus::Pending,
        currency: "USD".to_string(),
        total_price: Money::from(7_000),
        confirmed_at: None,
        shipped_at: None,
        delivered_at: None,
        cancelled_at: None,
        created_at: t,
        updated_at: t,
        version: 0,
    };
    let items = vec![
        item_fixture(1, &order_id, "prod-a", "vendor-a", ItemStatus::Pending, t),
        item_fixture(2, &order_id, "prod-b", "vendor-b", ItemStatus::Pending, t),
    ];
    FullOrder::new(order, items)
}

pub fn item_fixture(
    id: i64,
    order_id: &OrderId,
    product_id: &str,
    vendor_id: &str,
    status: ItemStatus,
    t: chrono::DateTime<Utc>,
) -> OrderItem {
    OrderItem {
        id,
        order_id: order_id.clone(),
        product_id: product_id.to_string(),
        vendor_id: vendor_id.to_string(),
        qty: 1,
        unit_price: Money::from(3_500),
        line_total: Money::from(3_500),
        status,
        carrier: None,
        tracking_number: None,
        vendor_note: None,
        internal_note: None,
        created_at: t,
        updated_at: t,
    }
}

/// The fixture after vendor A's item moved to `to` and the aggregate recomputed.
pub fn fixture_after_item_a(to: ItemStatus, order_status: OrderStatus) -> FullOrder {
    let mut full = order_fixture();
    full.items[0].status = to;
    full.order.order_status = order_status;
    full.order.legacy_status = order_status.as_legacy().to_string();
    full.order.version += 1;
    full
}
