//! Shared handler state and backend selection.

use std::sync::Arc;

use meal_flow_core::memory::{MemoryDietChartStore, MemoryDirectory};
use meal_flow_core::ports::{DietChartStore, Directory};
use meal_flow_core::view::ChartResolver;
use meal_flow_core::{DietChartRepository, DietChartService, TaskQueries};

use crate::config::ServerConfig;

#[derive(Clone)]
pub struct AppState {
    pub charts: DietChartService,
    pub tasks: TaskQueries,
    pub directory: Arc<dyn Directory>,
}

impl AppState {
    pub fn new(store: Arc<dyn DietChartStore>, directory: Arc<dyn Directory>) -> Self {
        let repo = DietChartRepository::new(store);
        Self {
            charts: DietChartService::new(repo.clone()),
            tasks: TaskQueries::new(repo),
            directory,
        }
    }

    pub fn in_memory(directory: MemoryDirectory) -> Self {
        Self::new(Arc::new(MemoryDietChartStore::new()), Arc::new(directory))
    }

    /// Fresh per-request resolver; memoization never outlives one response.
    pub fn resolver(&self) -> ChartResolver {
        ChartResolver::new(Arc::clone(&self.directory))
    }

    /// Postgres when a database URL is configured and the `database` feature
    /// is compiled in, otherwise the in-memory backend.
    pub async fn from_config(config: &ServerConfig) -> anyhow::Result<Self> {
        #[cfg(feature = "database")]
        if let Some(url) = &config.database_url {
            use meal_flow_core::postgres::{migrate, PgDietChartStore, PgDirectory};
            use sqlx::postgres::PgPoolOptions;

            let pool = PgPoolOptions::new()
                .max_connections(config.db_max_connections)
                .connect(url)
                .await?;
            migrate(&pool).await?;
            tracing::info!("Connected to database");
            return Ok(Self::new(
                Arc::new(PgDietChartStore::new(pool.clone())),
                Arc::new(PgDirectory::new(pool)),
            ));
        }

        #[cfg(not(feature = "database"))]
        if config.database_url.is_some() {
            tracing::warn!(
                "MEAL_FLOW_DATABASE_URL is set but the server was built without the \
                 `database` feature; using the in-memory store"
            );
        }

        tracing::info!("Using in-memory diet chart store");
        Ok(Self::in_memory(MemoryDirectory::new()))
    }
}
