//! Workflow engine HTTP daemon.

use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use workflow_api::{AppState, WorkflowConfig};
use workflow_engine::{
    DirectoryRepository, InstanceRepository, SchemaRepository, TaskRepository, TransactionalStore,
};
use workflow_store::{MemoryStore, PostgresStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = WorkflowConfig::load()?;

    let state = match &config.database_url {
        Some(url) => {
            tracing::info!("connecting to postgres");
            let store = Arc::new(PostgresStore::connect(url).await?);
            build_state(store)
        }
        None => {
            tracing::info!("using in-memory store (set DATABASE_URL to use postgres)");
            let store = Arc::new(MemoryStore::new());
            build_state(store)
        }
    };

    let app = workflow_api::create_router(state);
    let listener = TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "workflow-apid listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn build_state<S>(store: Arc<S>) -> AppState
where
    S: SchemaRepository
        + InstanceRepository
        + TaskRepository
        + DirectoryRepository
        + TransactionalStore
        + 'static,
{
    AppState::new(store)
}
