use actix_web::{http::StatusCode, test, web, web::ServiceConfig, App};
use chrono::{Duration, Utc};
use fulfillment_engine::db_types::ActorRole;
use mps_common::Secret;
use serde_json::Value;

use crate::{
    auth::{TokenIssuer, TokenVerifier},
    config::AuthConfig,
};

fn test_auth_config() -> AuthConfig {
    AuthConfig { jwt_secret: Secret::new("endpoint-test-secret-do-not-use-anywhere-else".to_string()) }
}

pub fn issue_token(sub: &str, role: ActorRole) -> String {
    TokenIssuer::new(&test_auth_config()).issue_token(sub, role, Utc::now() + Duration::hours(1)).unwrap()
}

pub async fn send_request<F>(
    method: &str,
    token: &str,
    path: &str,
    body: Option<Value>,
    configure: F,
) -> (StatusCode, Value)
where
    F: FnOnce(&mut ServiceConfig),
{
    let app = test::init_service(
        App::new().app_data(web::Data::new(TokenVerifier::new(&test_auth_config()))).configure(configure),
    )
    .await;
    let mut req = match method {
        "GET" => test::TestRequest::get(),
        "POST" => test::TestRequest::post(),
        "PATCH" => test::TestRequest::patch(),
        m => panic!("Unsupported method {m}"),
    }
    .uri(path);
    if !token.is_empty() {
        req = req.insert_header(("Authorization", format!("Bearer {token}")));
    }
    if let Some(body) = body {
        req = req.set_json(body);
    }
    let resp = test::call_service(&app, req.to_request()).await;
    let status = resp.status();
    let bytes = test::read_body(resp).await;
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}
