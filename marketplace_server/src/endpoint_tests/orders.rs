use actix_web::{http::StatusCode, web, web::ServiceConfig};
use fulfillment_engine::{
    db_types::{ActorRole, ItemStatus, OrderStatus},
    OrderFlowApi,
};
use serde_json::json;

use super::{
    helpers::{issue_token, send_request},
    mocks::{fixture_after_item_a, order_fixture, MockOrderStoreBackend},
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
async fn requests_without_a_token_are_unauthorized() {
    let _ = env_logger::try_init();
    let store = MockOrderStoreBackend::new();
    let (status, body) = send_request(
        "PATCH",
        "",
        "/orders/ord0001/items/prod-a/status",
        Some(json!({"status": "ACCEPTED"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "UNAUTHORIZED");
}

#[actix_web::test]
async fn vendor_updates_own_item() {
    let _ = env_logger::try_init();
    let mut store = MockOrderStoreBackend::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order_fixture())));
    store
        .expect_commit_status_change()
        .withf(|change| {
            change.item_patches.len() == 1 &&
                change.item_patches[0].status == ItemStatus::Accepted &&
                change.order_status == Some(OrderStatus::Processing) &&
                change.history.len() == 2
        })
        .returning(|_| Ok(fixture_after_item_a(ItemStatus::Accepted, OrderStatus::Processing)));

    let token = issue_token("vendor-a", ActorRole::Vendor);
    let (status, body) = send_request(
        "PATCH",
        &token,
        "/orders/ord0001/items/prod-a/status",
        Some(json!({"status": "ACCEPTED", "note": "picking tomorrow"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ACCEPTED");
    assert_eq!(body["order"]["order_status"], "PROCESSING");
    // response is scoped to the calling vendor
    let items = body["order"]["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["product_id"], "prod-a");
    assert_eq!(body["history"].as_array().unwrap().len(), 2);
}

#[actix_web::test]
async fn vendor_cannot_touch_a_foreign_item() {
    let _ = env_logger::try_init();
    let mut store = MockOrderStoreBackend::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order_fixture())));

    let token = issue_token("vendor-a", ActorRole::Vendor);
    let (status, body) = send_request(
        "PATCH",
        &token,
        "/orders/ord0001/items/prod-b/status",
        Some(json!({"status": "ACCEPTED"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "FORBIDDEN");
}

#[actix_web::test]
async fn delivered_items_cannot_be_cancelled_over_http() {
    let _ = env_logger::try_init();
    let mut store = MockOrderStoreBackend::new();
    store.expect_fetch_order().returning(|_| {
        let mut full = order_fixture();
        full.items[0].status = ItemStatus::Delivered;
        Ok(Some(full))
    });

    let token = issue_token("vendor-a", ActorRole::Vendor);
    let (status, body) = send_request(
        "PATCH",
        &token,
        "/orders/ord0001/items/prod-a/status",
        Some(json!({"status": "CANCELLED"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "INVALID_TRANSITION");
    assert_eq!(body["reason"], "cannot cancel delivered item");
}

#[actix_web::test]
async fn unknown_orders_are_reported_as_not_found() {
    let _ = env_logger::try_init();
    let mut store = MockOrderStoreBackend::new();
    store.expect_fetch_order().returning(|_| Ok(None));

    let token = issue_token("vendor-a", ActorRole::Vendor);
    let (status, body) = send_request(
        "PATCH",
        &token,
        "/orders/ghost/items/prod-a/status",
        Some(json!({"status": "ACCEPTED"})),
        with_api(store),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[actix_web::test]
async fn customers_cannot_read_foreign_orders() {
    let _ = env_logger::try_init();
    let mut store = MockOrderStoreBackend::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order_fixture())));

    let token = issue_token("cust-2", ActorRole::Customer);
    let (status, body) = send_request("GET", &token, "/orders/ord0001", None, with_api(store)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NOT_FOUND");
}

#[actix_web::test]
async fn customers_see_their_order_with_its_timeline() {
    let _ = env_logger::try_init();
    let mut store = MockOrderStoreBackend::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order_fixture())));
    store.expect_history_for_order().returning(|_| Ok(vec![]));

    let token = issue_token("cust-1", ActorRole::Customer);
    let (status, body) = send_request("GET", &token, "/orders/ord0001", None, with_api(store)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["order_id"], "ord0001");
    assert_eq!(body["items"].as_array().unwrap().len(), 2);
    assert!(body["history"].as_array().unwrap().is_empty());
    // internal notes never leave the admin scope
    assert!(body["items"][0].get("internal_note").is_none());
}

#[actix_web::test]
async fn vendors_only_see_their_own_slice_of_an_order() {
    let _ = env_logger::try_init();
    let mut store = MockOrderStoreBackend::new();
    store.expect_fetch_order().returning(|_| Ok(Some(order_fixture())));
    store.expect_history_for_order().returning(|_| Ok(vec![]));

    let token = issue_token("vendor-b", ActorRole::Vendor);
    let (status, body) = send_request("GET", &token, "/vendor/orders/ord0001", None, with_api(store)).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["vendor_id"], "vendor-b");
}
