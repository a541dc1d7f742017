//! Entry point tying a backend to model mappers.
//!
//! # Example
//!
//! ```ignore
//! let store = Store::new(InMemoryStore::builder().build().await?);
//!
//! let users = store.mapper::<User>();
//! let archived = store.mapper_for::<User>("archived_users");
//! ```

use std::sync::Arc;

use crate::{
    backend::StoreBackend,
    error::StoreResult,
    mapper::Mapper,
    schema::ModelSchema,
};

/// A document store backed by a single backend, shared by every mapper it creates.
#[derive(Debug, Clone)]
pub struct Store {
    backend: Arc<dyn StoreBackend>,
}

impl Store {
    /// Creates a new store with the given backend.
    pub fn new<B: StoreBackend + 'static>(backend: B) -> Self {
        Self { backend: Arc::new(backend) }
    }

    /// Creates a store over a backend that is already shared.
    pub fn from_shared(backend: Arc<dyn StoreBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// A mapper for `S` over its own collection.
    pub fn mapper<S: ModelSchema>(&self) -> Mapper<S> {
        Mapper::new(self.backend.clone(), S::collection_name())
    }

    /// A mapper for `S` over the named collection.
    pub fn mapper_for<S: ModelSchema>(&self, collection: impl Into<String>) -> Mapper<S> {
        Mapper::new(self.backend.clone(), collection)
    }

    /// Shuts the backend down.
    pub async fn shutdown(&self) -> StoreResult<()> {
        self.backend.shutdown().await
    }
}
