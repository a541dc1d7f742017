//! The binding between a model type and a store collection.
//!
//! A [`Mapper`] creates bound model instances, wraps fetched records into models and
//! forwards a fixed set of collection operations to the backend.
//!
//! # Example
//!
//! ```ignore
//! let users = store.mapper::<User>();
//!
//! let mut user = users.create(doc! { "username": "Foo Bar" });
//! user.field_mut("logincount")?.inc(1)?;
//! user.save().await?;
//!
//! let mut cursor = users.find(doc! { "username": "Foo Bar" }).await?;
//! while let Some(user) = cursor.next().await? {
//!     println!("{user:?}");
//! }
//! ```

use bson::{Bson, Document, oid::ObjectId};
use std::{
    fmt::{self, Debug},
    marker::PhantomData,
    sync::Arc,
};
use tracing::debug;

use crate::{
    backend::{StoreBackend, UpdateOutcome},
    cursor::ModelCursor,
    error::{ModelResult, StoreResult},
    model::Model,
    options::{CollectionOptions, CollectionRef, FindOptions, id_filter},
    schema::ModelSchema,
};

/// Selects a single record: either a filter document or a bare identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Selector {
    Filter(Document),
    Id(Bson),
}

impl Selector {
    /// The filter document sent to the store.
    pub fn into_filter(self) -> Document {
        match self {
            Selector::Filter(filter) => filter,
            Selector::Id(id) => id_filter(&id),
        }
    }
}

impl From<Document> for Selector {
    fn from(filter: Document) -> Self {
        Selector::Filter(filter)
    }
}

/// Documents become filters; every other value is taken as an identity.
impl From<Bson> for Selector {
    fn from(value: Bson) -> Self {
        match value {
            Bson::Document(filter) => Selector::Filter(filter),
            id => Selector::Id(id),
        }
    }
}

impl From<ObjectId> for Selector {
    fn from(id: ObjectId) -> Self {
        Selector::Id(Bson::ObjectId(id))
    }
}

impl From<&str> for Selector {
    fn from(id: &str) -> Self {
        Selector::Id(Bson::String(id.to_string()))
    }
}

impl From<String> for Selector {
    fn from(id: String) -> Self {
        Selector::Id(Bson::String(id))
    }
}

impl From<i32> for Selector {
    fn from(id: i32) -> Self {
        Selector::Id(Bson::Int32(id))
    }
}

impl From<i64> for Selector {
    fn from(id: i64) -> Self {
        Selector::Id(Bson::Int64(id))
    }
}

/// Pairs a model type with a collection of a store backend.
///
/// Cloning a mapper is cheap; clones share the backend.
pub struct Mapper<S> {
    backend: Arc<dyn StoreBackend>,
    collection: CollectionRef,
    _schema: PhantomData<fn() -> S>,
}

impl<S> Clone for Mapper<S> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            collection: self.collection.clone(),
            _schema: PhantomData,
        }
    }
}

impl<S> Debug for Mapper<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mapper")
            .field("backend", &self.backend)
            .field("collection", &self.collection)
            .finish()
    }
}

impl<S: ModelSchema> Mapper<S> {
    /// Creates a mapper over the named collection of `backend`.
    pub fn new(backend: Arc<dyn StoreBackend>, collection: impl Into<String>) -> Self {
        Self {
            backend,
            collection: CollectionRef::new(collection),
            _schema: PhantomData,
        }
    }

    pub fn collection(&self) -> &CollectionRef {
        &self.collection
    }

    pub fn backend(&self) -> &Arc<dyn StoreBackend> {
        &self.backend
    }

    /// Returns a mapper for the same collection with `options` applied on top of this
    /// mapper's options. The receiver is unchanged.
    pub fn with_options(&self, options: CollectionOptions) -> Self {
        Self {
            backend: self.backend.clone(),
            collection: self.collection
                .clone()
                .with_options(self.collection.options.merge(options)),
            _schema: PhantomData,
        }
    }

    /// Creates a new, unpersisted model bound to this mapper.
    ///
    /// Nothing is sent to the store until the model is saved.
    pub fn create(&self, initial: Document) -> Model<S> {
        let mut model = Model::new(initial);
        model.bind(self.clone());
        model
    }

    /// Creates a new, unpersisted model with only its defaults defined.
    pub fn create_empty(&self) -> Model<S> {
        self.create(Document::new())
    }

    /// Wraps a record fetched from the store into a bound model.
    pub fn wrap(&self, record: Document) -> Model<S> {
        Model::from_record(record, self.clone())
    }

    /// Finds the records matching `filter`.
    pub async fn find(&self, filter: Document) -> ModelResult<ModelCursor<S>> {
        self.find_with(filter, FindOptions::default()).await
    }

    /// Finds the records matching `filter`, paginated and sorted by `options`.
    pub async fn find_with(&self, filter: Document, options: FindOptions) -> ModelResult<ModelCursor<S>> {
        debug!(
            collection = %self.collection.name,
            filter = %filter,
            "Opening model cursor"
        );

        let records = self.backend
            .find(&self.collection, filter, options)
            .await?;

        Ok(ModelCursor::new(self.clone(), records))
    }

    /// Finds the first record matching a filter document or identity.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let by_filter = users.find_one(doc! { "username": "Foo Bar" }).await?;
    /// let by_id = users.find_one("foobar").await?;
    /// ```
    pub async fn find_one(&self, selector: impl Into<Selector>) -> ModelResult<Option<Model<S>>> {
        let record = self.backend
            .find_one(&self.collection, selector.into().into_filter())
            .await?;

        Ok(record.map(|record| self.wrap(record)))
    }

    pub async fn insert_one(&self, document: Document) -> StoreResult<Bson> {
        self.backend
            .insert_one(&self.collection, document)
            .await
    }

    pub async fn insert_many(&self, documents: Vec<Document>) -> StoreResult<Vec<Bson>> {
        self.backend
            .insert_many(&self.collection, documents)
            .await
    }

    pub async fn update_one(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome> {
        self.backend
            .update_one(&self.collection, filter, update)
            .await
    }

    pub async fn update_many(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome> {
        self.backend
            .update_many(&self.collection, filter, update)
            .await
    }

    pub async fn delete_one(&self, filter: Document) -> StoreResult<u64> {
        self.backend
            .delete_one(&self.collection, filter)
            .await
    }

    pub async fn delete_many(&self, filter: Document) -> StoreResult<u64> {
        self.backend
            .delete_many(&self.collection, filter)
            .await
    }

    pub async fn count_documents(&self, filter: Document) -> StoreResult<u64> {
        self.backend
            .count_documents(&self.collection, filter)
            .await
    }

    /// Drops the collection and every record in it.
    pub async fn drop(&self) -> StoreResult<()> {
        self.backend
            .drop_collection(&self.collection)
            .await
    }

    pub(crate) async fn fetch(&self, id: &Bson) -> StoreResult<Option<Document>> {
        self.backend
            .find_one(&self.collection, id_filter(id))
            .await
    }

    pub(crate) async fn update_by_id(&self, id: &Bson, update: Document) -> StoreResult<UpdateOutcome> {
        self.backend
            .update_one(&self.collection, id_filter(id), update)
            .await
    }
}
