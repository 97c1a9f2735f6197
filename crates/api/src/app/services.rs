use std::sync::Arc;

use stockyard_infra::{Catalog, EntityStore, StockAccounting};

use crate::config::AppConfig;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppServices {
    pub catalog: Catalog,
}

impl AppServices {
    pub fn in_memory() -> Self {
        Self::with_store(EntityStore::in_memory())
    }

    pub fn with_store(store: EntityStore) -> Self {
        Self {
            catalog: Catalog::new(Arc::new(StockAccounting::new(store))),
        }
    }
}

/// Wire the store selected by `USE_PERSISTENT_STORES`.
pub async fn build_services(config: &AppConfig) -> anyhow::Result<AppServices> {
    if config.use_persistent_stores {
        return build_persistent(config).await;
    }
    tracing::info!("using in-memory store");
    Ok(AppServices::in_memory())
}

#[cfg(feature = "postgres")]
async fn build_persistent(config: &AppConfig) -> anyhow::Result<AppServices> {
    use anyhow::Context;
    use stockyard_infra::store::postgres::PostgresDocumentStore;

    let url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL is required when USE_PERSISTENT_STORES is enabled")?;
    let store = PostgresDocumentStore::connect(url, config.database_max_connections)
        .await
        .context("failed to connect to Postgres")?;
    tracing::info!(max_connections = config.database_max_connections, "using Postgres store");
    Ok(AppServices::with_store(EntityStore::new(Arc::new(store))))
}

#[cfg(not(feature = "postgres"))]
async fn build_persistent(_config: &AppConfig) -> anyhow::Result<AppServices> {
    anyhow::bail!("USE_PERSISTENT_STORES requires a build with the `postgres` feature")
}
