use std::time::Duration;

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use fulfillment_engine::{traits::OrderStore, OrderFlowApi, SqliteDatabase};
use log::info;

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::ServerConfig,
    errors::ServerError,
    routes::{
        admin_cancel,
        admin_order,
        admin_set_status,
        create_order,
        customer_order,
        health,
        orders_search,
        update_item_status,
        update_payment_status,
        update_tracking,
        vendor_order,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    info!("🚀️ Database ready at {}", db.url());
    let srv = create_server_instance(config, db)?;
    srv.await.map_err(|e| ServerError::BackendError(e.to_string()))
}

pub fn create_server_instance(config: ServerConfig, db: SqliteDatabase) -> Result<Server, ServerError> {
    let host = config.host.clone();
    let port = config.port;
    let srv = HttpServer::new(move || {
        let orders_api = OrderFlowApi::new(db.clone()).with_policy(config.status_policy());
        let issuer = TokenIssuer::new(&config.auth);
        let verifier = TokenVerifier::new(&config.auth);
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("mps::access_log"))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(issuer))
            .app_data(web::Data::new(verifier))
            .configure(configure_routes::<SqliteDatabase>)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((host.as_str(), port))?
    .run();
    Ok(srv)
}

/// Registers every route against an arbitrary backend. The server uses the SQLite store; endpoint tests register the
/// same tree over a mock.
pub fn configure_routes<B: OrderStore + 'static>(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(web::resource("/orders").route(web::post().to(create_order::<B>)))
        .service(web::resource("/orders/{order_id}").route(web::get().to(customer_order::<B>)))
        .service(web::resource("/orders/{order_id}/payment").route(web::patch().to(update_payment_status::<B>)))
        .service(
            web::resource("/orders/{order_id}/items/{product_id}/status")
                .route(web::patch().to(update_item_status::<B>)),
        )
        .service(
            web::resource("/orders/{order_id}/items/{product_id}/tracking")
                .route(web::patch().to(update_tracking::<B>)),
        )
        .service(web::resource("/vendor/orders/{order_id}").route(web::get().to(vendor_order::<B>)))
        .service(
            web::scope("/admin")
                .service(web::resource("/orders").route(web::get().to(orders_search::<B>)))
                .service(web::resource("/orders/{order_id}").route(web::get().to(admin_order::<B>)))
                .service(web::resource("/orders/{order_id}/status").route(web::patch().to(admin_set_status::<B>)))
                .service(web::resource("/orders/{order_id}/cancel").route(web::post().to(admin_cancel::<B>))),
        );
}
