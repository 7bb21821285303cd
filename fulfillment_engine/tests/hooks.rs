//! Event hooks fire after commits, and only when something actually changed.
use std::{
    sync::{
        atomic::{AtomicI32, Ordering},
        Arc,
    },
    time::Duration,
};

use fulfillment_engine::{
    db_types::{Actor, NewOrder, NewOrderItem},
    events::{EventHandlers, EventHooks},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    OrderFlowApi,
    SqliteDatabase,
};
use log::info;
use mps_common::Money;

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::Relaxed)
    }
}

#[tokio::test]
async fn order_status_hook_fires_only_when_the_aggregate_moves() {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");

    let order_events = HookCalled::default();
    let item_events = HookCalled::default();
    let order_copy = order_events.clone();
    let item_copy = item_events.clone();
    let mut hooks = EventHooks::default();
    hooks.on_order_status_changed(move |ev| {
        info!("🪝️ {ev:?}");
        order_copy.called();
        Box::pin(async {})
    });
    hooks.on_item_status_changed(move |ev| {
        info!("🪝️ {ev:?}");
        item_copy.called();
        Box::pin(async {})
    });
    let handlers = EventHandlers::new(8, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let api = OrderFlowApi::new(db).with_producers(producers);
    let order = NewOrder::new("cust-1", "USD", vec![NewOrderItem::new("prod-a", "vendor-a", 1, Money::from(500))]);
    let full = api.process_new_order(order).await.unwrap();
    let oid = full.order.order_id.clone();
    let vendor = Actor::vendor("vendor-a");

    // PENDING → ACCEPTED moves the aggregate to PROCESSING; ACCEPTED → PACKING leaves it there.
    api.update_item_status(&oid, "vendor-a", "prod-a", "ACCEPTED", &vendor, None).await.unwrap();
    api.update_item_status(&oid, "vendor-a", "prod-a", "PACKING", &vendor, None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(item_events.count(), 2);
    assert_eq!(order_events.count(), 1);
}
