//! Bearer-token authentication.
//!
//! Access tokens are HS256 JWTs carrying the actor id (`sub`), the actor's role, and an expiry. Handlers receive the
//! claims via the [`JwtClaims`] extractor and enforce role requirements themselves; there is no per-route middleware.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, http::header::AUTHORIZATION, web, FromRequest, HttpRequest};
use chrono::{DateTime, Utc};
use fulfillment_engine::db_types::{Actor, ActorRole};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};

use crate::{config::AuthConfig, errors::ServerError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The actor id: customer id, vendor id, or admin id.
    pub sub: String,
    pub role: ActorRole,
    pub exp: i64,
}

impl JwtClaims {
    pub fn actor(&self) -> Actor {
        Actor { id: self.sub.clone(), role: self.role }
    }

    pub fn require_role(&self, role: ActorRole) -> Result<(), ServerError> {
        if self.role == role {
            Ok(())
        } else {
            Err(ServerError::InsufficientPermissions(format!("This endpoint requires the {role} role")))
        }
    }

    pub fn require_any_role(&self, roles: &[ActorRole]) -> Result<(), ServerError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            let roles = roles.iter().map(|r| r.to_string()).collect::<Vec<_>>().join(", ");
            Err(ServerError::InsufficientPermissions(format!("This endpoint requires one of the roles: {roles}")))
        }
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(extract_claims(req))
    }
}

fn extract_claims(req: &HttpRequest) -> Result<JwtClaims, ServerError> {
    let verifier = req
        .app_data::<web::Data<TokenVerifier>>()
        .ok_or_else(|| ServerError::ConfigurationError("Token verifier is not registered".to_string()))?;
    let header = req.headers().get(AUTHORIZATION).ok_or(ServerError::Unauthorized)?;
    let token = header
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(ServerError::Unauthorized)?;
    verifier.validate(token)
}

/// Issues access tokens. Used by the login flow of the surrounding system and by tests.
#[derive(Clone)]
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(
        &self,
        sub: &str,
        role: ActorRole,
        expires_at: DateTime<Utc>,
    ) -> Result<String, ServerError> {
        let claims = JwtClaims { sub: sub.to_string(), role, exp: expires_at.timestamp() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| ServerError::BackendError(format!("Could not sign access token. {e}")))
    }
}

/// Validates access tokens. Registered as app data so the [`JwtClaims`] extractor can reach it.
#[derive(Clone)]
pub struct TokenVerifier {
    key: DecodingKey,
}

impl TokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, ServerError> {
        decode::<JwtClaims>(token, &self.key, &Validation::new(Algorithm::HS256))
            .map(|data| data.claims)
            .map_err(|e| {
                debug!("💻️ Rejected access token. {e}");
                ServerError::Unauthorized
            })
    }
}
