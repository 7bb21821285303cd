use actix_web::{http::StatusCode, web, web::ServiceConfig};
use fulfillment_engine::{
    db_types::{ActorRole, ItemStatus, OrderStatus},
    OrderFlowApi,
};
use serde_json::json;

use super::{
    helpers::{issue_token, send_request},
    mocks::{order_fixture, MockOrderStoreBackend},
};
use crate::server::configure_routes;

fn with_api(store: MockOrderStoreBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = OrderFlowApi::new(store);
        cfg.app_data(web::Data::new(api));
        configure_routes::<MockOrderStoreBackend>(cfg);
    }
}

#[actix_web::test]
async fn admin_endpoints_reject_vendor_tokens() {
    let _ = env_logger::try_init();
    let store = MockOrderStoreBackend::new();
    let token = issue_token("vendor-a", ActorRole::Vendor);
    let (status, body) = send_request(
        "PATCH",
        &token,
        "/admin/orders/ord0001/status",
        Some(json!({"status": "CANCELLED"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");
}

#[actix_web::test]
async fn admin_override_accepts_any_canonical_status() {
    let _ = env_logger::try_init();
    let mut store = MockOrderStoreBackend::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order_fixture())));
    store
        .expect_commit_status_change()
        .withf(|change| {
            change.item_patches.is_empty() &&
                change.order_status == Some(OrderStatus::Shipped) &&
                change.history.len() == 1
        })
        .returning(|_| {
            let mut full = order_fixture();
            full.order.order_status = OrderStatus::Shipped;
            full.order.legacy_status = "shipped".to_string();
            full.order.version += 1;
            Ok(full)
        });

    let token = issue_token("admin-1", ActorRole::Admin);
    let (status, body) = send_request(
        "PATCH",
        &token,
        "/admin/orders/ord0001/status",
        Some(json!({"status": "SHIPPED", "reason": "carrier scan import"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_status"], "SHIPPED");
    assert_eq!(body["legacy_status"], "shipped");
}

#[actix_web::test]
async fn admin_override_rejects_unknown_status_values() {
    let _ = env_logger::try_init();
    let store = MockOrderStoreBackend::new();
    let token = issue_token("admin-1", ActorRole::Admin);
    let (status, body) = send_request(
        "PATCH",
        &token,
        "/admin/orders/ord0001/status",
        Some(json!({"status": "SHIPPED-ISH"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_STATUS");
}

#[actix_web::test]
async fn admin_cancel_reports_when_nothing_is_eligible() {
    let _ = env_logger::try_init();
    let mut store = MockOrderStoreBackend::new();
    store.expect_fetch_order().returning(|_| {
        let mut full = order_fixture();
        full.items[0].status = ItemStatus::Delivered;
        full.items[1].status = ItemStatus::Cancelled;
        Ok(Some(full))
    });

    let token = issue_token("admin-1", ActorRole::Admin);
    let (status, body) = send_request(
        "POST",
        &token,
        "/admin/orders/ord0001/cancel",
        Some(json!({"reason": "customer request"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "NO_CANCELLABLE_ITEMS");
}

#[actix_web::test]
async fn admin_cancel_forces_eligible_items_to_cancelled() {
    let _ = env_logger::try_init();
    let mut store = MockOrderStoreBackend::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order_fixture())));
    store
        .expect_commit_status_change()
        .withf(|change| {
            change.item_patches.len() == 2 &&
                change.item_patches.iter().all(|p| p.status == ItemStatus::Cancelled) &&
                change.order_status == Some(OrderStatus::Cancelled) &&
                // one entry per item plus the order-level entry
                change.history.len() == 3
        })
        .returning(|_| {
            let mut full = order_fixture();
            for item in &mut full.items {
                item.status = ItemStatus::Cancelled;
            }
            full.order.order_status = OrderStatus::Cancelled;
            full.order.legacy_status = "cancelled".to_string();
            full.order.version += 1;
            Ok(full)
        });

    let token = issue_token("admin-1", ActorRole::Admin);
    let (status, body) = send_request(
        "POST",
        &token,
        "/admin/orders/ord0001/cancel",
        Some(json!({"reason": "fraud hold"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_status"], "CANCELLED");
    assert!(body["items"].as_array().unwrap().iter().all(|i| i["status"] == "CANCELLED"));
}

#[actix_web::test]
async fn admin_search_filters_orders_by_customer() {
    let _ = env_logger::try_init();
    let mut store = MockOrderStoreBackend::new();
    store
        .expect_search_orders()
        .withf(|query| query.customer_id.as_deref() == Some("cust-1"))
        .returning(|_| Ok(vec![order_fixture()]));

    let token = issue_token("admin-1", ActorRole::Admin);
    let (status, body) =
        send_request("GET", &token, "/admin/orders?customer_id=cust-1", None, with_api(store)).await;
    assert_eq!(status, StatusCode::OK);
    let orders = body.as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["order_id"], "ord0001");
    assert_eq!(orders[0]["items"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn payment_signal_requires_a_privileged_role() {
    let _ = env_logger::try_init();
    let store = MockOrderStoreBackend::new();
    let token = issue_token("cust-1", ActorRole::Customer);
    let (status, body) = send_request(
        "PATCH",
        &token,
        "/orders/ord0001/payment",
        Some(json!({"status": "PAID"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");

    let mut store = MockOrderStoreBackend::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order_fixture())));
    store.expect_commit_status_change().returning(|_| {
        let mut full = order_fixture();
        full.order.payment_status = fulfillment_engine::db_types::PaymentStatus::Paid;
        full.order.version += 1;
        Ok(full)
    });
    let token = issue_token("payments-bridge", ActorRole::System);
    let (status, body) = send_request(
        "PATCH",
        &token,
        "/orders/ord0001/payment",
        Some(json!({"status": "PAID"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["payment_status"], "PAID");
}
