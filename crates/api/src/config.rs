//! Process configuration, read from the environment (and `.env` when present).

use std::time::Duration;

use anyhow::{Context, bail};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 5000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DB_CONNECTIONS: u32 = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
    /// Use Postgres instead of the in-memory store (`USE_PERSISTENT_STORES`).
    pub use_persistent_stores: bool,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            use_persistent_stores: false,
            database_url: None,
            database_max_connections: DEFAULT_DB_CONNECTIONS,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unset or blank keys take their defaults.
    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str| get(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match get("PORT") {
            Some(v) => v.parse().with_context(|| format!("PORT must be a port number, got '{v}'"))?,
            None => defaults.port,
        };
        let request_timeout = match get("REQUEST_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("REQUEST_TIMEOUT_SECS must be a whole number, got '{v}'"))?,
            ),
            None => defaults.request_timeout,
        };
        let database_max_connections = match get("DATABASE_MAX_CONNECTIONS") {
            Some(v) => v
                .parse()
                .with_context(|| format!("DATABASE_MAX_CONNECTIONS must be a whole number, got '{v}'"))?,
            None => defaults.database_max_connections,
        };
        let use_persistent_stores = get("USE_PERSISTENT_STORES")
            .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        let config = Self {
            host: get("HOST").unwrap_or(defaults.host),
            port,
            request_timeout,
            use_persistent_stores,
            database_url: get("DATABASE_URL"),
            database_max_connections,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.use_persistent_stores && self.database_url.is_none() {
            bail!("DATABASE_URL is required when USE_PERSISTENT_STORES is enabled");
        }
        if self.request_timeout.is_zero() {
            bail!("REQUEST_TIMEOUT_SECS must be greater than zero");
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
