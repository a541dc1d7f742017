//! Storage backend abstraction for the mapper.
//!
//! The [`StoreBackend`] trait is the document-oriented CRUD interface models and mappers
//! call into. Every method addresses a single collection through a [`CollectionRef`] and
//! is one awaited round trip to the store. Implementations must be thread-safe
//! (`Send + Sync`); mappers hold them as `Arc<dyn StoreBackend>`.
//!
//! Filters and update documents use the store's native operator syntax:
//!
//! ```ignore
//! use bson::doc;
//!
//! let users = CollectionRef::new("users");
//! let id = backend.insert_one(&users, doc! { "name": "Alice", "logins": 0 }).await?;
//!
//! backend
//!     .update_one(&users, doc! { "_id": id }, doc! { "$inc": { "logins": 1 } })
//!     .await?;
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::stream::BoxStream;
use std::{fmt::Debug, sync::Arc};

use crate::{
    error::StoreResult,
    options::{CollectionRef, FindOptions},
};

/// A lazy, forward-only stream of raw records returned by [`StoreBackend::find`].
pub type RecordStream = BoxStream<'static, StoreResult<Document>>;

/// The result of an update call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Number of records the filter matched.
    pub matched: u64,
    /// Number of records actually changed.
    pub modified: u64,
}

/// Abstract interface for document stores.
///
/// # Error Handling
///
/// Operations return [`StoreResult<T>`](crate::error::StoreResult). Backends report
/// malformed filters and update documents as
/// [`StoreError::InvalidDocument`](crate::error::StoreError::InvalidDocument) and
/// transport or driver failures as [`StoreError::Backend`](crate::error::StoreError::Backend).
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Inserts a document and returns its identity.
    ///
    /// If the document has no `_id`, the backend assigns a fresh `ObjectId`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::DocumentAlreadyExists`](crate::error::StoreError::DocumentAlreadyExists)
    /// if a record with the same `_id` exists.
    async fn insert_one(&self, collection: &CollectionRef, document: Document) -> StoreResult<Bson>;

    /// Inserts several documents, returning their identities in input order.
    async fn insert_many(&self, collection: &CollectionRef, documents: Vec<Document>) -> StoreResult<Vec<Bson>>;

    /// Applies an update document to the first record matching `filter`.
    async fn update_one(
        &self,
        collection: &CollectionRef,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome>;

    /// Applies an update document to every record matching `filter`.
    async fn update_many(
        &self,
        collection: &CollectionRef,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome>;

    /// Deletes the first record matching `filter`, returning the number deleted.
    async fn delete_one(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64>;

    /// Deletes every record matching `filter`, returning the number deleted.
    async fn delete_many(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64>;

    /// Streams the records matching `filter`.
    async fn find(
        &self,
        collection: &CollectionRef,
        filter: Document,
        options: FindOptions,
    ) -> StoreResult<RecordStream>;

    /// Returns the first record matching `filter`, if any.
    async fn find_one(&self, collection: &CollectionRef, filter: Document) -> StoreResult<Option<Document>>;

    /// Counts the records matching `filter`.
    async fn count_documents(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64>;

    /// Drops the collection and every record in it.
    ///
    /// Dropping a collection that does not exist succeeds.
    async fn drop_collection(&self, collection: &CollectionRef) -> StoreResult<()>;

    /// Cleanly shuts down the backend, releasing its resources.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(&self) -> StoreResult<()> {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend + ?Sized,
{
    async fn insert_one(&self, collection: &CollectionRef, document: Document) -> StoreResult<Bson> {
        (**self)
            .insert_one(collection, document)
            .await
    }

    async fn insert_many(&self, collection: &CollectionRef, documents: Vec<Document>) -> StoreResult<Vec<Bson>> {
        (**self)
            .insert_many(collection, documents)
            .await
    }

    async fn update_one(
        &self,
        collection: &CollectionRef,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome> {
        (**self)
            .update_one(collection, filter, update)
            .await
    }

    async fn update_many(
        &self,
        collection: &CollectionRef,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome> {
        (**self)
            .update_many(collection, filter, update)
            .await
    }

    async fn delete_one(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64> {
        (**self)
            .delete_one(collection, filter)
            .await
    }

    async fn delete_many(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64> {
        (**self)
            .delete_many(collection, filter)
            .await
    }

    async fn find(
        &self,
        collection: &CollectionRef,
        filter: Document,
        options: FindOptions,
    ) -> StoreResult<RecordStream> {
        (**self)
            .find(collection, filter, options)
            .await
    }

    async fn find_one(&self, collection: &CollectionRef, filter: Document) -> StoreResult<Option<Document>> {
        (**self)
            .find_one(collection, filter)
            .await
    }

    async fn count_documents(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64> {
        (**self)
            .count_documents(collection, filter)
            .await
    }

    async fn drop_collection(&self, collection: &CollectionRef) -> StoreResult<()> {
        (**self)
            .drop_collection(collection)
            .await
    }

    async fn shutdown(&self) -> StoreResult<()> {
        (**self).shutdown().await
    }
}

/// Factory trait for creating store backend instances.
///
/// # Example
///
/// ```ignore
/// let backend = InMemoryStore::builder().build().await?;
/// ```
#[async_trait]
pub trait StoreBackendBuilder {
    /// The backend type this builder creates.
    type Backend: StoreBackend;

    /// Builds the backend, connecting to the store if necessary.
    async fn build(self) -> StoreResult<Self::Backend>;
}
