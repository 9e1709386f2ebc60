use std::sync::Arc;

use anyhow::Context;

use stockroom_api::app::{self, services::AppServices};
use stockroom_infra::{AppConfig, InMemoryInventoryStore, InventoryStore, PostgresInventoryStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;
    stockroom_observability::init(config.log_format);

    let store: Arc<dyn InventoryStore> = match config.database_url.as_deref() {
        Some(url) => {
            let store = PostgresInventoryStore::connect(url, config.database_max_connections)
                .await
                .context("connecting to postgres")?;
            store.migrate().await.context("running migrations")?;
            tracing::info!("using postgres store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on exit)");
            Arc::new(InMemoryInventoryStore::new())
        }
    };

    let services = AppServices::new(store);
    let router = app::build_app(services, &config.jwt_secret, config.cors_allowed_origin.as_deref())?;

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;

    tracing::info!(addr = %listener.local_addr()?, "listening");

    axum::serve(listener, router).await?;
    Ok(())
}
