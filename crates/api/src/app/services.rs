use std::sync::Arc;

use stockroom_infra::{InMemoryInventoryStore, InventoryStore};

/// Shared handles injected into every handler.
#[derive(Clone)]
pub struct AppServices {
    pub store: Arc<dyn InventoryStore>,
}

impl AppServices {
    pub fn new(store: Arc<dyn InventoryStore>) -> Self {
        Self { store }
    }

    /// Services backed by a fresh in-memory store (tests, local runs).
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryInventoryStore::new()))
    }
}
