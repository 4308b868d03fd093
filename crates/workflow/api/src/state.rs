//! Shared application state for API handlers.

use std::sync::Arc;
use workflow_engine::{
    Coordinator, DirectoryRepository, InstanceRepository, SchemaRepository, TaskRepository,
    TransactionalStore,
};

#[derive(Clone)]
pub struct AppState {
    pub schemas: Arc<dyn SchemaRepository>,
    pub instances: Arc<dyn InstanceRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub directory: Arc<dyn DirectoryRepository>,
    pub coordinator: Arc<Coordinator>,
}

impl AppState {
    /// `store` backs all five repository surfaces at once, the way both
    /// `MemoryStore` and `PostgresStore` implement them on a single type.
    pub fn new<S>(store: Arc<S>) -> Self
    where
        S: SchemaRepository
            + InstanceRepository
            + TaskRepository
            + DirectoryRepository
            + TransactionalStore
            + 'static,
    {
        let transactional: Arc<dyn TransactionalStore> = store.clone();
        let coordinator = Arc::new(Coordinator::new(transactional));
        Self {
            schemas: store.clone(),
            instances: store.clone(),
            tasks: store.clone(),
            directory: store,
            coordinator,
        }
    }
}
