pub mod config;
pub mod error;
pub mod model;
pub mod seed;
pub mod store;

pub use error::{SchemaError, SeedError};
pub use model::*;
pub use seed::{run_seed, SeedReport};
pub use store::{MemoryStore, PostgresStore, Store};

use anyhow::{Context, Result};

async fn sync_then_seed<S: Store + ?Sized>(store: &S) -> Result<SeedReport> {
    let plan = store.sync().await.context("Schema sync failed")?;
    log::info!("✅ Tables synced ({} change(s))", plan.steps.len());
    run_seed(store).await
}

/// Sync the schema and run the seed, then close the store whatever the outcome.
pub async fn sync_and_seed<S: Store + ?Sized>(store: &S) -> Result<SeedReport> {
    let result = sync_then_seed(store).await;
    if let Err(e) = &result {
        log::error!("❌ Error: {:#}", e);
    }
    store.close().await;
    result
}

async fn connect(config: &config::AppConfig) -> Result<PostgresStore> {
    let schema = catalog_schema()?;
    PostgresStore::connect(
        &config.database_url(),
        config.database.max_connections,
        schema,
    )
    .await
}

/// Connect to the configured database and seed it
pub async fn run(config: &config::AppConfig) -> Result<SeedReport> {
    let store = match connect(config).await {
        Ok(store) => store,
        Err(e) => {
            log::error!("❌ Error: {:#}", e);
            return Err(e);
        }
    };
    log::info!("✅ Connected to the database.");

    sync_and_seed(&store).await
}
