//! End-to-end exercises of the order fulfillment state machine against a real SQLite store.
use fulfillment_engine::{
    db_types::{Actor, ItemKey, ItemStatus, NewOrder, NewOrderItem, OrderStatus, PaymentStatus, StatusPolicy},
    order_objects::FullOrder,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    OrderFlowApi,
    OrderFlowError,
    SqliteDatabase,
};
use mps_common::Money;

async fn new_api() -> OrderFlowApi<SqliteDatabase> {
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
    OrderFlowApi::new(db)
}

/// Two items from two vendors, both pending.
async fn two_vendor_order(api: &OrderFlowApi<SqliteDatabase>) -> FullOrder {
    let order = NewOrder::new(
        "cust-1",
        "USD",
        vec![
            NewOrderItem::new("prod-a", "vendor-a", 2, Money::from(1_500)),
            NewOrderItem::new("prod-b", "vendor-b", 1, Money::from(4_000)),
        ],
    );
    api.process_new_order(order).await.expect("Error creating order")
}

#[tokio::test]
async fn new_orders_start_pending_with_snapshotted_totals() {
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    assert_eq!(full.order.order_status, OrderStatus::Pending);
    assert_eq!(full.order.legacy_status, "pending");
    assert_eq!(full.order.payment_status, PaymentStatus::Pending);
    assert_eq!(full.order.total_price, Money::from(7_000));
    assert_eq!(full.items.len(), 2);
    assert_eq!(full.items[0].product_id, "prod-a");
    assert_eq!(full.items[0].line_total, Money::from(3_000));
    assert!(full.items.iter().all(|i| i.status == ItemStatus::Pending));
    assert!(api.history(&full.order.order_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn accepting_one_item_moves_the_order_to_processing() {
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    let oid = full.order.order_id.clone();
    let vendor_a = Actor::vendor("vendor-a");

    let result = api
        .update_item_status(&oid, "vendor-a", "prod-a", "ACCEPTED", &vendor_a, None)
        .await
        .expect("Transition failed");

    assert_eq!(result.order.item_for_product("prod-a").unwrap().status, ItemStatus::Accepted);
    assert_eq!(result.order.item_for_product("prod-b").unwrap().status, ItemStatus::Pending);
    assert_eq!(result.order.order.order_status, OrderStatus::Processing);
    // one ITEM entry and one ORDER entry, since the aggregate status changed
    assert_eq!(result.history.len(), 2);
    let timeline = api.history(&oid).await.unwrap();
    assert_eq!(timeline.len(), 2);

    // Vendor B cancelling their pending item leaves the aggregate at PROCESSING: only an ITEM entry is appended.
    let vendor_b = Actor::vendor("vendor-b");
    let result =
        api.update_item_status(&oid, "vendor-b", "prod-b", "CANCELLED", &vendor_b, None).await.expect("Cancel failed");
    assert_eq!(result.order.order.order_status, OrderStatus::Processing);
    assert_eq!(result.history.len(), 1);
    let timeline = api.history(&oid).await.unwrap();
    assert_eq!(timeline.len(), 3);
}

#[tokio::test]
async fn single_item_order_walks_to_delivered_and_stamps_milestones_once() {
    let api = new_api().await;
    let order =
        NewOrder::new("cust-9", "USD", vec![NewOrderItem::new("prod-x", "vendor-x", 1, Money::from(9_900))]);
    let full = api.process_new_order(order).await.unwrap();
    let oid = full.order.order_id.clone();
    let vendor = Actor::vendor("vendor-x");

    for target in ["ACCEPTED", "PACKING", "SHIPPED", "DELIVERED"] {
        api.update_item_status(&oid, "vendor-x", "prod-x", target, &vendor, None).await.expect("Transition failed");
    }
    let full = api.fetch_order(&oid).await.unwrap();
    assert_eq!(full.order.order_status, OrderStatus::Delivered);
    assert_eq!(full.order.legacy_status, "delivered");
    let shipped_at = full.order.shipped_at.expect("shipped_at not set");
    let delivered_at = full.order.delivered_at.expect("delivered_at not set");
    assert!(shipped_at <= delivered_at);

    // A later overriding write must not disturb the milestone: first write wins.
    let admin = Actor::admin("admin-1");
    api.admin_set_order_status(&oid, "DELIVERED", &admin, Some("audit replay".to_string())).await.unwrap();
    let full = api.fetch_order(&oid).await.unwrap();
    assert_eq!(full.order.delivered_at, Some(delivered_at));
    assert_eq!(full.order.shipped_at, Some(shipped_at));

    // 4 item transitions, 3 derived order transitions (PACKING leaves the aggregate at PROCESSING), 1 override.
    let timeline = api.history(&oid).await.unwrap();
    assert_eq!(timeline.len(), 8);
}

#[tokio::test]
async fn delivered_items_cannot_be_cancelled() {
    let api = new_api().await;
    let order =
        NewOrder::new("cust-2", "USD", vec![NewOrderItem::new("prod-x", "vendor-x", 1, Money::from(100))]);
    let full = api.process_new_order(order).await.unwrap();
    let oid = full.order.order_id.clone();
    let vendor = Actor::vendor("vendor-x");
    for target in ["ACCEPTED", "PACKING", "SHIPPED", "DELIVERED"] {
        api.update_item_status(&oid, "vendor-x", "prod-x", target, &vendor, None).await.unwrap();
    }
    let before = api.fetch_order(&oid).await.unwrap();
    let timeline_before = api.history(&oid).await.unwrap().len();

    let err = api
        .update_item_status(&oid, "vendor-x", "prod-x", "CANCELLED", &vendor, None)
        .await
        .expect_err("Expected rejection");
    assert!(matches!(err, OrderFlowError::InvalidTransition(_)));
    assert_eq!(err.to_string(), "cannot cancel delivered item");

    // no state change, no history entry
    let after = api.fetch_order(&oid).await.unwrap();
    assert_eq!(after.order.version, before.order.version);
    assert_eq!(after.order.order_status, OrderStatus::Delivered);
    assert_eq!(api.history(&oid).await.unwrap().len(), timeline_before);
}

#[tokio::test]
async fn foreign_vendors_cannot_touch_each_others_items() {
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    let oid = full.order.order_id.clone();
    let intruder = Actor::vendor("vendor-b");

    let err = api
        .update_item_status(&oid, "vendor-b", "prod-a", "ACCEPTED", &intruder, None)
        .await
        .expect_err("Expected rejection");
    assert!(matches!(err, OrderFlowError::Forbidden(_)));

    let err = api
        .update_item_status(&oid, "vendor-b", "prod-zzz", "ACCEPTED", &intruder, None)
        .await
        .expect_err("Expected rejection");
    assert!(matches!(err, OrderFlowError::ItemNotFound { .. }));
}

#[tokio::test]
async fn vendors_sharing_a_product_id_each_control_their_own_line() {
    let api = new_api().await;
    let order = NewOrder::new(
        "cust-7",
        "USD",
        vec![
            NewOrderItem::new("prod-dup", "vendor-a", 1, Money::from(1_000)),
            NewOrderItem::new("prod-dup", "vendor-b", 1, Money::from(1_100)),
        ],
    );
    let full = api.process_new_order(order).await.unwrap();
    let oid = full.order.order_id.clone();
    let vendor_b = Actor::vendor("vendor-b");

    // Vendor B's update must resolve to their own line, not vendor A's row with the same product id.
    let result = api
        .update_item_status(&oid, "vendor-b", "prod-dup", "ACCEPTED", &vendor_b, None)
        .await
        .expect("Transition failed");
    assert_eq!(result.order.item_for("vendor-b", "prod-dup").unwrap().status, ItemStatus::Accepted);
    assert_eq!(result.order.item_for("vendor-a", "prod-dup").unwrap().status, ItemStatus::Pending);
    assert_eq!(result.history[0].item_vendor_id.as_deref(), Some("vendor-b"));

    // Same for tracking metadata.
    use fulfillment_engine::traits::TrackingUpdate;
    let tracking = TrackingUpdate { carrier: Some("UPS".to_string()), tracking_number: Some("1Z999".to_string()) };
    let item = api.update_tracking(&oid, "vendor-b", "prod-dup", tracking, &vendor_b).await.expect("Tracking failed");
    assert_eq!(item.vendor_id, "vendor-b");
    let full = api.fetch_order(&oid).await.unwrap();
    assert!(full.item_for("vendor-a", "prod-dup").unwrap().carrier.is_none());
}

#[tokio::test]
async fn concurrent_updates_to_different_items_both_land() {
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    let oid = full.order.order_id.clone();
    let vendor_a = Actor::vendor("vendor-a");
    let vendor_b = Actor::vendor("vendor-b");

    let (ra, rb) = tokio::join!(
        api.update_item_status(&oid, "vendor-a", "prod-a", "ACCEPTED", &vendor_a, None),
        api.update_item_status(&oid, "vendor-b", "prod-b", "ACCEPTED", &vendor_b, None),
    );
    ra.expect("vendor A update failed");
    rb.expect("vendor B update failed");

    let full = api.fetch_order(&oid).await.unwrap();
    assert_eq!(full.order.order_status, OrderStatus::Processing);
    assert!(full.items.iter().all(|i| i.status == ItemStatus::Accepted));

    let item_entries: Vec<_> = api
        .history(&oid)
        .await
        .unwrap()
        .into_iter()
        .filter(|e| e.item_product_id.is_some())
        .collect();
    assert_eq!(item_entries.len(), 2, "one item entry per vendor, no lost update");
}

#[tokio::test]
async fn admin_override_is_unconstrained_and_self_heals() {
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    let oid = full.order.order_id.clone();
    let admin = Actor::admin("admin-1");
    let vendor_a = Actor::vendor("vendor-a");

    // Backward/inconsistent override is allowed and logged, but not validated.
    api.admin_set_order_status(&oid, "SHIPPED", &admin, Some("customer escalation".to_string())).await.unwrap();
    let full = api.fetch_order(&oid).await.unwrap();
    assert_eq!(full.order.order_status, OrderStatus::Shipped);
    assert_eq!(full.order.legacy_status, "shipped");

    // An unknown enum value is rejected on the admin path, not defaulted.
    let err = api.admin_set_order_status(&oid, "SHIPPED-ISH", &admin, None).await.expect_err("Expected rejection");
    assert!(matches!(err, OrderFlowError::InvalidStatus(_)));

    // The next item-level update recomputes the aggregate and overwrites the override.
    api.update_item_status(&oid, "vendor-a", "prod-a", "ACCEPTED", &vendor_a, None).await.unwrap();
    let full = api.fetch_order(&oid).await.unwrap();
    assert_eq!(full.order.order_status, OrderStatus::Processing);
}

#[tokio::test]
async fn admin_cancel_skips_terminal_items_and_reports_empty_matches() {
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    let oid = full.order.order_id.clone();
    let admin = Actor::admin("admin-1");
    let vendor_a = Actor::vendor("vendor-a");

    // Deliver vendor A's item so only vendor B's remains cancellable.
    for target in ["ACCEPTED", "PACKING", "SHIPPED", "DELIVERED"] {
        api.update_item_status(&oid, "vendor-a", "prod-a", target, &vendor_a, None).await.unwrap();
    }
    let result = api.admin_cancel_order(&oid, "stock lost in warehouse", None, &admin).await.expect("Cancel failed");
    let item = result.order.item_for_product("prod-b").unwrap();
    assert_eq!(item.status, ItemStatus::Cancelled);
    assert_eq!(result.order.item_for_product("prod-a").unwrap().status, ItemStatus::Delivered);
    // one ITEM entry for prod-b plus the ORDER entry
    assert_eq!(result.history.len(), 2);
    assert_eq!(result.order.order.order_status, OrderStatus::PartiallyDelivered);

    // Nothing left to cancel.
    let err = api.admin_cancel_order(&oid, "double tap", None, &admin).await.expect_err("Expected rejection");
    assert!(matches!(err, OrderFlowError::NoCancellableItems(_)));
}

#[tokio::test]
async fn admin_cancel_can_target_specific_items() {
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    let oid = full.order.order_id.clone();
    let admin = Actor::admin("admin-1");

    let targets = vec![ItemKey::new("prod-b", "vendor-b")];
    let result = api.admin_cancel_order(&oid, "vendor out of stock", Some(&targets), &admin).await.unwrap();
    assert_eq!(result.order.item_for_product("prod-b").unwrap().status, ItemStatus::Cancelled);
    assert_eq!(result.order.item_for_product("prod-a").unwrap().status, ItemStatus::Pending);
    assert_eq!(result.order.order.order_status, OrderStatus::Pending);
}

#[tokio::test]
async fn permissive_policy_defaults_garbage_strict_policy_rejects_it() {
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    let oid = full.order.order_id.clone();
    let vendor_a = Actor::vendor("vendor-a");

    // Permissive (default): garbage collapses to PENDING, which is then rejected as an unchanged transition.
    let err = api
        .update_item_status(&oid, "vendor-a", "prod-a", "not-a-status", &vendor_a, None)
        .await
        .expect_err("Expected rejection");
    assert_eq!(err.to_string(), "unchanged");

    // Strict: the same input is rejected before it reaches the validator.
    let url = random_db_path();
    prepare_test_env(&url).await;
    let db = SqliteDatabase::new_with_url(&url, 5).await.unwrap();
    let strict_api = OrderFlowApi::new(db).with_policy(StatusPolicy::Strict);
    let full = two_vendor_order(&strict_api).await;
    let err = strict_api
        .update_item_status(&full.order.order_id, "vendor-a", "prod-a", "not-a-status", &vendor_a, None)
        .await
        .expect_err("Expected rejection");
    assert!(matches!(err, OrderFlowError::InvalidStatus(_)));
}

#[tokio::test]
async fn legacy_aliases_are_accepted_from_callers() {
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    let oid = full.order.order_id.clone();
    let vendor_a = Actor::vendor("vendor-a");

    // "confirmed" is the legacy spelling of ACCEPTED, "processing" of PACKING.
    api.update_item_status(&oid, "vendor-a", "prod-a", "confirmed", &vendor_a, None).await.unwrap();
    let result = api.update_item_status(&oid, "vendor-a", "prod-a", "processing", &vendor_a, None).await.unwrap();
    assert_eq!(result.order.item_for_product("prod-a").unwrap().status, ItemStatus::Packing);
}

#[tokio::test]
async fn payment_signal_is_mirrored_and_confirmed_at_sticks() {
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    let oid = full.order.order_id.clone();
    let system = Actor::system();

    let full = api.process_payment_update(&oid, PaymentStatus::Paid, &system).await.unwrap();
    assert_eq!(full.order.payment_status, PaymentStatus::Paid);
    let confirmed_at = full.order.confirmed_at.expect("confirmed_at not set");

    // Refund flips the mirror but the confirmation timestamp is append-only.
    let full = api.process_payment_update(&oid, PaymentStatus::Refunded, &system).await.unwrap();
    assert_eq!(full.order.payment_status, PaymentStatus::Refunded);
    assert_eq!(full.order.confirmed_at, Some(confirmed_at));
}

#[tokio::test]
async fn replaying_item_history_reconstructs_current_status() {
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    let oid = full.order.order_id.clone();
    let vendor_a = Actor::vendor("vendor-a");
    let vendor_b = Actor::vendor("vendor-b");

    for target in ["ACCEPTED", "PACKING", "SHIPPED"] {
        api.update_item_status(&oid, "vendor-a", "prod-a", target, &vendor_a, None).await.unwrap();
    }
    api.update_item_status(&oid, "vendor-b", "prod-b", "CANCELLED", &vendor_b, None).await.unwrap();

    let full = api.fetch_order(&oid).await.unwrap();
    let timeline = api.history(&oid).await.unwrap();
    for item in &full.items {
        // Timeline is newest first; the first entry per item holds its current status.
        let latest = timeline
            .iter()
            .find(|e| e.item_product_id.as_deref() == Some(item.product_id.as_str()))
            .expect("no history for item");
        assert_eq!(latest.to_status.parse::<ItemStatus>().unwrap(), item.status);
    }

    // Vendor-scoped history only sees the vendor's own items.
    let vendor_a_history = api.vendor_history("vendor-a").await.unwrap();
    assert_eq!(vendor_a_history.len(), 3);
    assert!(vendor_a_history.iter().all(|e| e.item_vendor_id.as_deref() == Some("vendor-a")));
}

#[tokio::test]
async fn search_matches_on_customer_vendor_and_status() {
    use fulfillment_engine::order_objects::OrderQueryFilter;
    let api = new_api().await;
    let first = two_vendor_order(&api).await;
    let second = api
        .process_new_order(NewOrder::new(
            "cust-2",
            "USD",
            vec![NewOrderItem::new("prod-c", "vendor-a", 1, Money::from(2_000))],
        ))
        .await
        .unwrap();
    let vendor_a = Actor::vendor("vendor-a");
    api.update_item_status(&second.order.order_id, "vendor-a", "prod-c", "ACCEPTED", &vendor_a, None).await.unwrap();

    let mine = api.search_orders(OrderQueryFilter::default().with_customer_id("cust-1")).await.unwrap();
    assert_eq!(mine.len(), 1);
    assert_eq!(mine[0].order.order_id, first.order.order_id);

    // vendor-a has items on both orders, vendor-b only on the first
    let vendor_a_orders = api.search_orders(OrderQueryFilter::default().with_vendor_id("vendor-a")).await.unwrap();
    assert_eq!(vendor_a_orders.len(), 2);
    let vendor_b_orders = api.search_orders(OrderQueryFilter::default().with_vendor_id("vendor-b")).await.unwrap();
    assert_eq!(vendor_b_orders.len(), 1);

    let processing =
        api.search_orders(OrderQueryFilter::default().with_status(OrderStatus::Processing)).await.unwrap();
    assert_eq!(processing.len(), 1);
    assert_eq!(processing[0].order.order_id, second.order.order_id);

    let by_id =
        api.search_orders(OrderQueryFilter::default().with_order_id(first.order.order_id.clone())).await.unwrap();
    assert_eq!(by_id.len(), 1);
}

#[tokio::test]
async fn tracking_metadata_is_independent_of_status() {
    use fulfillment_engine::traits::TrackingUpdate;
    let api = new_api().await;
    let full = two_vendor_order(&api).await;
    let oid = full.order.order_id.clone();
    let vendor_a = Actor::vendor("vendor-a");

    let before = api.fetch_order(&oid).await.unwrap();
    let tracking =
        TrackingUpdate { carrier: Some("DHL".to_string()), tracking_number: Some("JD014600003".to_string()) };
    let item = api.update_tracking(&oid, "vendor-a", "prod-a", tracking, &vendor_a).await.expect("Tracking failed");
    assert_eq!(item.carrier.as_deref(), Some("DHL"));
    assert_eq!(item.status, ItemStatus::Pending);

    let after = api.fetch_order(&oid).await.unwrap();
    assert_eq!(after.order.version, before.order.version);
    assert!(api.history(&oid).await.unwrap().is_empty());
}
