//! In-memory storage implementation of the store backend.
//!
//! Records are kept per collection in insertion order, behind an async-aware read-write
//! lock. Filters and update documents are evaluated with the same operator semantics the
//! mapper applies locally.

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use futures::stream::{self, StreamExt};
use mea::rwlock::RwLock;
use std::{collections::HashMap, sync::Arc};
use tracing::trace;

use docmapper_core::{
    backend::{RecordStream, StoreBackend, StoreBackendBuilder, UpdateOutcome},
    error::{StoreError, StoreResult},
    filter::{FilterEvaluator, sort_documents},
    options::{CollectionRef, FindOptions},
    update::Update,
};

type StoreMap = HashMap<String, Vec<Document>>;

/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Collection options
///
/// Read concern, write concern and read preference have no meaning for a single in-process
/// copy of the data; they are accepted and ignored.
///
/// # Example
///
/// ```ignore
/// use docmapper_memory::InMemoryStore;
/// use docmapper::backend::StoreBackend;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///     let users = CollectionRef::new("users");
///
///     let id = store.insert_one(&users, doc! { "name": "Alice", "age": 30 }).await?;
///     let user = store.find_one(&users, doc! { "_id": id }).await?;
///     assert!(user.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> records in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    ///
    /// ```ignore
    /// let store = InMemoryStore::builder().build().await?;
    /// ```
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Applies `update` to the records matching `filter`, at most one if `single`.
    ///
    /// Every matched record is updated on a copy first, so a rejected update leaves the
    /// collection unchanged.
    async fn update_matching(
        &self,
        collection: &CollectionRef,
        filter: Document,
        update: Document,
        single: bool,
    ) -> StoreResult<UpdateOutcome> {
        let update = Update::from_document(&update)?;
        let evaluator = FilterEvaluator::new(&filter);

        let mut store = self.store.write().await;
        let Some(records) = store.get_mut(&collection.name) else {
            return Ok(UpdateOutcome::default());
        };

        let mut changes = Vec::new();
        for (index, record) in records.iter().enumerate() {
            if !evaluator.matches(record)? {
                continue;
            }

            let mut updated = record.clone();
            update.apply_to(&mut updated)?;
            changes.push((index, updated));

            if single {
                break;
            }
        }

        let mut outcome = UpdateOutcome {
            matched: changes.len() as u64,
            modified: 0,
        };
        for (index, updated) in changes {
            if records[index] != updated {
                records[index] = updated;
                outcome.modified += 1;
            }
        }

        trace!(
            collection = %collection.name,
            matched = outcome.matched,
            modified = outcome.modified,
            "Updated records"
        );

        Ok(outcome)
    }

    async fn delete_matching(&self, collection: &CollectionRef, filter: Document, single: bool) -> StoreResult<u64> {
        let evaluator = FilterEvaluator::new(&filter);

        let mut store = self.store.write().await;
        let Some(records) = store.get_mut(&collection.name) else {
            return Ok(0);
        };

        let mut matched = Vec::new();
        for (index, record) in records.iter().enumerate() {
            if evaluator.matches(record)? {
                matched.push(index);
                if single {
                    break;
                }
            }
        }

        for index in matched.iter().rev() {
            records.remove(*index);
        }

        trace!(collection = %collection.name, deleted = matched.len(), "Deleted records");

        Ok(matched.len() as u64)
    }
}

/// Moves `_id` to the front of the record, assigning a fresh `ObjectId` if it is missing.
fn with_identity(mut document: Document) -> (Bson, Document) {
    let id = document
        .remove("_id")
        .unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));

    let mut record = Document::new();
    record.insert("_id", id.clone());
    for (key, value) in document {
        record.insert(key, value);
    }

    (id, record)
}

fn contains_id(records: &[Document], id: &Bson) -> bool {
    records
        .iter()
        .any(|record| record.get("_id") == Some(id))
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn insert_one(&self, collection: &CollectionRef, document: Document) -> StoreResult<Bson> {
        let (id, record) = with_identity(document);

        let mut store = self.store.write().await;
        let records = store
            .entry(collection.name.clone())
            .or_default();

        if contains_id(records, &id) {
            return Err(StoreError::DocumentAlreadyExists(id.to_string(), collection.name.clone()));
        }

        records.push(record);
        trace!(collection = %collection.name, id = %id, "Inserted record");

        Ok(id)
    }

    async fn insert_many(&self, collection: &CollectionRef, documents: Vec<Document>) -> StoreResult<Vec<Bson>> {
        let prepared = documents
            .into_iter()
            .map(with_identity)
            .collect::<Vec<_>>();

        let mut store = self.store.write().await;
        let records = store
            .entry(collection.name.clone())
            .or_default();

        for (position, (id, _)) in prepared.iter().enumerate() {
            if contains_id(records, id) || prepared[..position].iter().any(|(other, _)| other == id) {
                return Err(StoreError::DocumentAlreadyExists(id.to_string(), collection.name.clone()));
            }
        }

        let mut ids = Vec::with_capacity(prepared.len());
        for (id, record) in prepared {
            records.push(record);
            ids.push(id);
        }

        trace!(collection = %collection.name, inserted = ids.len(), "Inserted records");

        Ok(ids)
    }

    async fn update_one(
        &self,
        collection: &CollectionRef,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome> {
        self.update_matching(collection, filter, update, true).await
    }

    async fn update_many(
        &self,
        collection: &CollectionRef,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome> {
        self.update_matching(collection, filter, update, false).await
    }

    async fn delete_one(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64> {
        self.delete_matching(collection, filter, true).await
    }

    async fn delete_many(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64> {
        self.delete_matching(collection, filter, false).await
    }

    async fn find(
        &self,
        collection: &CollectionRef,
        filter: Document,
        options: FindOptions,
    ) -> StoreResult<RecordStream> {
        let mut matched = {
            let store = self.store.read().await;
            match store.get(&collection.name) {
                Some(records) => FilterEvaluator::new(&filter).filter_documents(records)?,
                None => Vec::new(),
            }
        };

        if !options.sort.is_empty() {
            sort_documents(&mut matched, &options.sort);
        }

        let offset = options.offset.unwrap_or(0) as usize;
        let limit = options.limit.map_or(usize::MAX, |limit| limit as usize);

        Ok(
            stream::iter(
                matched
                    .into_iter()
                    .skip(offset)
                    .take(limit)
                    .map(Ok)
            )
            .boxed()
        )
    }

    async fn find_one(&self, collection: &CollectionRef, filter: Document) -> StoreResult<Option<Document>> {
        let evaluator = FilterEvaluator::new(&filter);
        let store = self.store.read().await;

        let Some(records) = store.get(&collection.name) else {
            return Ok(None);
        };

        for record in records {
            if evaluator.matches(record)? {
                return Ok(Some(record.clone()));
            }
        }

        Ok(None)
    }

    async fn count_documents(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64> {
        let evaluator = FilterEvaluator::new(&filter);
        let store = self.store.read().await;

        let Some(records) = store.get(&collection.name) else {
            return Ok(0);
        };

        let mut count = 0;
        for record in records {
            if evaluator.matches(record)? {
                count += 1;
            }
        }

        Ok(count)
    }

    async fn drop_collection(&self, collection: &CollectionRef) -> StoreResult<()> {
        self.store
            .write()
            .await
            .remove(&collection.name);

        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// # Example
///
/// ```ignore
/// use docmapper_memory::InMemoryStore;
/// use docmapper::backend::StoreBackendBuilder;
///
/// #[tokio::main]
/// async fn main() {
///     let store = InMemoryStore::builder().build().await.unwrap();
/// }
/// ```
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
