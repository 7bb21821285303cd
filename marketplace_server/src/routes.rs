//! Request handler definitions
//!
//! Define each route and its handler here. Handlers that are more than a line or two MUST go into a separate module.
//! Keep this module neat and tidy 🙏
//!
//! Handlers are generic over the [`OrderStore`] backend and are registered with an explicit turbofish in
//! `server.rs`, so endpoint tests can swap the SQLite store for a mock without touching the handlers.
use actix_web::{get, web, HttpResponse, Responder};
use fulfillment_engine::{
    db_types::{ActorRole, OrderId},
    order_objects::{OrderQueryFilter, OrderView, OrderWithTimeline, ViewScope},
    traits::{OrderStore, TrackingUpdate},
    OrderFlowApi,
};
use log::*;

use crate::{
    auth::JwtClaims,
    data_objects::{
        AdminCancelRequest,
        AdminStatusRequest,
        ItemStatusUpdateResponse,
        PaymentUpdateRequest,
        UpdateItemStatusRequest,
        UpdateTrackingRequest,
    },
    errors::ServerError,
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------  Checkout ----------------------------------------------------
/// `POST /orders`. Customers create their own orders; admins may create an order for any customer.
pub async fn create_order<B: OrderStore>(
    claims: JwtClaims,
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<fulfillment_engine::db_types::NewOrder>,
) -> Result<HttpResponse, ServerError> {
    claims.require_any_role(&[ActorRole::Customer, ActorRole::Admin])?;
    let order = body.into_inner();
    if claims.role == ActorRole::Customer && order.customer_id != claims.sub {
        return Err(ServerError::InsufficientPermissions("Customers can only place their own orders".to_string()));
    }
    debug!("💻️ POST new order for customer {}", order.customer_id);
    let full = api.process_new_order(order).await?;
    Ok(HttpResponse::Created().json(full.view(&ViewScope::Customer)))
}

// ----------------------------------------------   Views  ----------------------------------------------------
/// `GET /orders/{order_id}`. Owning customer only; anything else is reported as not found rather than forbidden, so
/// the endpoint does not leak which order ids exist.
pub async fn customer_order<B: OrderStore>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    claims.require_role(ActorRole::Customer)?;
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET order {order_id} for customer {}", claims.sub);
    let full = api.fetch_order(&order_id).await?;
    if full.order.customer_id != claims.sub {
        return Err(ServerError::NoRecordFound(format!("Order {order_id} not found")));
    }
    let history = api.history(&order_id).await?;
    let body = OrderWithTimeline { order: full.view(&ViewScope::Customer), history };
    Ok(HttpResponse::Ok().json(body))
}

/// `GET /vendor/orders/{order_id}`. Items and timeline filtered to the calling vendor.
pub async fn vendor_order<B: OrderStore>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    claims.require_role(ActorRole::Vendor)?;
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET order {order_id} for vendor {}", claims.sub);
    let full = api.fetch_order(&order_id).await?;
    let scope = ViewScope::Vendor(claims.sub.clone());
    let view = full.view(&scope);
    if view.items.is_empty() {
        return Err(ServerError::NoRecordFound(format!("Order {order_id} not found")));
    }
    let history = api
        .history(&order_id)
        .await?
        .into_iter()
        .filter(|e| e.item_vendor_id.as_deref() == Some(claims.sub.as_str()))
        .collect();
    Ok(HttpResponse::Ok().json(OrderWithTimeline { order: view, history }))
}

/// `GET /admin/orders`. Searches orders by customer, vendor, status or creation window.
pub async fn orders_search<B: OrderStore>(
    claims: JwtClaims,
    query: web::Query<OrderQueryFilter>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    claims.require_role(ActorRole::Admin)?;
    let query = query.into_inner();
    debug!("💻️ GET orders search for [{query}]");
    let orders = api.search_orders(query).await?;
    let views: Vec<OrderView> = orders.iter().map(|o| o.view(&ViewScope::Admin)).collect();
    Ok(HttpResponse::Ok().json(views))
}

/// `GET /admin/orders/{order_id}`. Unfiltered view including internal notes.
pub async fn admin_order<B: OrderStore>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    claims.require_role(ActorRole::Admin)?;
    let order_id = OrderId::from(path.into_inner());
    debug!("💻️ GET order {order_id} for admin {}", claims.sub);
    let full = api.fetch_order(&order_id).await?;
    let history = api.history(&order_id).await?;
    Ok(HttpResponse::Ok().json(OrderWithTimeline { order: full.view(&ViewScope::Admin), history }))
}

// ---------------------------------------------- Fulfillment ----------------------------------------------------
/// `PATCH /orders/{order_id}/items/{product_id}/status`. The calling vendor transitions their own line item; the
/// response is the updated order scoped to that vendor plus the history entries this change appended.
pub async fn update_item_status<B: OrderStore>(
    claims: JwtClaims,
    path: web::Path<(String, String)>,
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<UpdateItemStatusRequest>,
) -> Result<HttpResponse, ServerError> {
    claims.require_role(ActorRole::Vendor)?;
    let (order_id, product_id) = path.into_inner();
    let order_id = OrderId::from(order_id);
    let req = body.into_inner();
    debug!("💻️ PATCH item {product_id} on order {order_id} to '{}' by vendor {}", req.status, claims.sub);
    let actor = claims.actor();
    let result = api.update_item_status(&order_id, &claims.sub, &product_id, &req.status, &actor, req.note).await?;
    let status = result
        .order
        .item_for(&claims.sub, &product_id)
        .map(|i| i.status)
        .ok_or_else(|| ServerError::BackendError("Updated item missing from aggregate".to_string()))?;
    let response = ItemStatusUpdateResponse {
        order: result.order.view(&ViewScope::Vendor(claims.sub.clone())),
        status,
        history: result.history,
    };
    Ok(HttpResponse::Ok().json(response))
}

/// `PATCH /orders/{order_id}/items/{product_id}/tracking`. Carrier metadata only; never touches status.
pub async fn update_tracking<B: OrderStore>(
    claims: JwtClaims,
    path: web::Path<(String, String)>,
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<UpdateTrackingRequest>,
) -> Result<HttpResponse, ServerError> {
    claims.require_role(ActorRole::Vendor)?;
    let (order_id, product_id) = path.into_inner();
    let order_id = OrderId::from(order_id);
    let req = body.into_inner();
    debug!("💻️ PATCH tracking for item {product_id} on order {order_id} by vendor {}", claims.sub);
    let actor = claims.actor();
    let tracking = TrackingUpdate { carrier: req.carrier, tracking_number: req.tracking_number };
    let item = api.update_tracking(&order_id, &claims.sub, &product_id, tracking, &actor).await?;
    Ok(HttpResponse::Ok().json(item))
}

// ----------------------------------------------    Admin   ----------------------------------------------------
/// `PATCH /admin/orders/{order_id}/status`. Unconditional override; no adjacency check by design.
pub async fn admin_set_status<B: OrderStore>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<AdminStatusRequest>,
) -> Result<HttpResponse, ServerError> {
    claims.require_role(ActorRole::Admin)?;
    let order_id = OrderId::from(path.into_inner());
    let req = body.into_inner();
    info!("💻️ Admin {} overriding status of order {order_id} to '{}'", claims.sub, req.status);
    let actor = claims.actor();
    let result = api.admin_set_order_status(&order_id, &req.status, &actor, req.reason).await?;
    Ok(HttpResponse::Ok().json(result.order.view(&ViewScope::Admin)))
}

/// `POST /admin/orders/{order_id}/cancel`. Force-cancels eligible items, optionally narrowed to specific ones.
pub async fn admin_cancel<B: OrderStore>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<AdminCancelRequest>,
) -> Result<HttpResponse, ServerError> {
    claims.require_role(ActorRole::Admin)?;
    let order_id = OrderId::from(path.into_inner());
    let req = body.into_inner();
    info!("💻️ Admin {} cancelling order {order_id}: {}", claims.sub, req.reason);
    let actor = claims.actor();
    let result = api.admin_cancel_order(&order_id, &req.reason, req.items.as_deref(), &actor).await?;
    Ok(HttpResponse::Ok().json(result.order.view(&ViewScope::Admin)))
}

// ----------------------------------------------   Payments  ----------------------------------------------------
/// `PATCH /orders/{order_id}/payment`. Entry point for the external payment-status signal.
pub async fn update_payment_status<B: OrderStore>(
    claims: JwtClaims,
    path: web::Path<String>,
    api: web::Data<OrderFlowApi<B>>,
    body: web::Json<PaymentUpdateRequest>,
) -> Result<HttpResponse, ServerError> {
    claims.require_any_role(&[ActorRole::Admin, ActorRole::System])?;
    let order_id = OrderId::from(path.into_inner());
    let status = body.into_inner().status;
    debug!("💻️ PATCH payment status of order {order_id} to {status}");
    let actor = claims.actor();
    let full = api.process_payment_update(&order_id, status, &actor).await?;
    Ok(HttpResponse::Ok().json(full.view(&ViewScope::Admin)))
}
