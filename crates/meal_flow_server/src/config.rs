//! Server configuration from environment variables.
//!
//!   MEAL_FLOW_JWT_SECRET: JWT HMAC secret (required)
//!   MEAL_FLOW_BIND_ADDR: listen address (default: 0.0.0.0:5001)
//!   MEAL_FLOW_DATABASE_URL: Postgres connection string (optional)
//!   MEAL_FLOW_DB_MAX_CONNECTIONS: pool size (default: 10)

use anyhow::{anyhow, Context, Result};

pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:5001";
pub const DEFAULT_DB_MAX_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub jwt_secret: String,
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret =
            get("MEAL_FLOW_JWT_SECRET").ok_or_else(|| anyhow!("MEAL_FLOW_JWT_SECRET must be set"))?;
        let bind_addr = get("MEAL_FLOW_BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let db_max_connections = match get("MEAL_FLOW_DB_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("MEAL_FLOW_DB_MAX_CONNECTIONS: invalid value '{raw}'"))?,
            None => DEFAULT_DB_MAX_CONNECTIONS,
        };

        Ok(Self {
            jwt_secret,
            bind_addr,
            database_url: get("MEAL_FLOW_DATABASE_URL"),
            db_max_connections,
        })
    }
}
