use std::env;

use fulfillment_engine::db_types::StatusPolicy;
use log::*;
use mps_common::{parse_boolean_flag, Secret};
use rand::{distributions::Alphanumeric, Rng};

const DEFAULT_MPS_HOST: &str = "127.0.0.1";
const DEFAULT_MPS_PORT: u16 = 8360;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub database_url: String,
    pub auth: AuthConfig,
    /// When true, unrecognized status strings on vendor endpoints are rejected with `INVALID_STATUS` instead of being
    /// normalized to `PENDING`. Admin endpoints are always strict.
    pub strict_status: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_MPS_HOST.to_string(),
            port: DEFAULT_MPS_PORT,
            database_url: String::default(),
            auth: AuthConfig::default(),
            strict_status: false,
        }
    }
}

impl ServerConfig {
    pub fn new(host: &str, port: u16) -> Self {
        Self { host: host.to_string(), port, ..Default::default() }
    }

    pub fn from_env_or_default() -> Self {
        let host = env::var("MPS_HOST").ok().unwrap_or_else(|| DEFAULT_MPS_HOST.into());
        let port = env::var("MPS_PORT")
            .map(|s| {
                s.parse::<u16>().unwrap_or_else(|e| {
                    error!(
                        "🪛️ {s} is not a valid port for MPS_PORT. {e} Using the default, {DEFAULT_MPS_PORT}, instead."
                    );
                    DEFAULT_MPS_PORT
                })
            })
            .unwrap_or(DEFAULT_MPS_PORT);
        let database_url = env::var("MPS_DATABASE_URL").unwrap_or_else(|_| {
            warn!("🪛️ MPS_DATABASE_URL is not set. Using the default sqlite database.");
            "sqlite://data/marketplace.db".to_string()
        });
        let strict_status = parse_boolean_flag(env::var("MPS_STRICT_STATUS").ok(), false);
        Self { host, port, database_url, auth: AuthConfig::from_env_or_default(), strict_status }
    }

    pub fn status_policy(&self) -> StatusPolicy {
        if self.strict_status {
            StatusPolicy::Strict
        } else {
            StatusPolicy::Permissive
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    /// HMAC secret for signing and verifying access tokens.
    pub jwt_secret: Secret<String>,
}

impl AuthConfig {
    pub fn from_env_or_default() -> Self {
        match env::var("MPS_JWT_SECRET") {
            Ok(secret) => Self { jwt_secret: Secret::new(secret) },
            Err(_) => {
                warn!(
                    "🪛️ MPS_JWT_SECRET is not set. Generating a random secret; tokens will not survive a restart. Do \
                     NOT run production like this."
                );
                let secret: String = rand::thread_rng().sample_iter(&Alphanumeric).take(48).map(char::from).collect();
                Self { jwt_secret: Secret::new(secret) }
            },
        }
    }
}
