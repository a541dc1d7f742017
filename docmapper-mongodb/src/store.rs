use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind, WriteError, WriteFailure},
    options::ClientOptions,
};
use docmapper_core::{
    backend::{RecordStream, StoreBackend, StoreBackendBuilder, UpdateOutcome},
    error::{StoreError, StoreResult},
    options::{CollectionRef, FindOptions},
};
use tracing::trace;

use crate::options::{collection_options, find_options};

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    fn get_collection(&self, collection: &CollectionRef) -> MongoCollection<Document> {
        let database = self.client.database(&self.database);

        if collection.options.is_empty() {
            database.collection(&collection.name)
        } else {
            database.collection_with_options(&collection.name, collection_options(&collection.options))
        }
    }
}

fn is_duplicate_key(error: &MongoError) -> bool {
    matches!(
        *error.kind,
        ErrorKind::Write(WriteFailure::WriteError(WriteError { code: DUPLICATE_KEY, .. }))
    )
}

fn insert_error(error: MongoError, id: Option<&Bson>, collection: &CollectionRef) -> StoreError {
    match id {
        Some(id) if is_duplicate_key(&error) => {
            StoreError::DocumentAlreadyExists(id.to_string(), collection.name.clone())
        },
        _ => StoreError::Backend(error.to_string()),
    }
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn insert_one(&self, collection: &CollectionRef, document: Document) -> StoreResult<Bson> {
        trace!(collection = %collection.name, "insert_one");

        let id = document.get("_id").cloned();

        Ok(
            self.get_collection(collection)
                .insert_one(document)
                .await
                .map_err(|e| insert_error(e, id.as_ref(), collection))?
                .inserted_id
        )
    }

    async fn insert_many(&self, collection: &CollectionRef, documents: Vec<Document>) -> StoreResult<Vec<Bson>> {
        trace!(collection = %collection.name, count = documents.len(), "insert_many");

        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let mut inserted = self.get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?
            .inserted_ids
            .into_iter()
            .collect::<Vec<(usize, Bson)>>();

        inserted.sort_by_key(|(index, _)| *index);

        Ok(
            inserted
                .into_iter()
                .map(|(_, id)| id)
                .collect()
        )
    }

    async fn update_one(
        &self,
        collection: &CollectionRef,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome> {
        trace!(collection = %collection.name, %filter, %update, "update_one");

        let result = self.get_collection(collection)
            .update_one(filter, update)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_many(
        &self,
        collection: &CollectionRef,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome> {
        trace!(collection = %collection.name, %filter, %update, "update_many");

        let result = self.get_collection(collection)
            .update_many(filter, update)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_one(filter)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?
                .deleted_count
        )
    }

    async fn delete_many(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(filter)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?
                .deleted_count
        )
    }

    async fn find(
        &self,
        collection: &CollectionRef,
        filter: Document,
        options: FindOptions,
    ) -> StoreResult<RecordStream> {
        trace!(collection = %collection.name, %filter, ?options, "find");

        let driver_options = find_options(&options)?;

        Ok(
            self.get_collection(collection)
                .find(filter)
                .with_options(driver_options)
                .await
                .map_err(|e| StoreError::Backend(e.to_string()))?
                .map_err(|e| StoreError::Backend(e.to_string()))
                .boxed()
        )
    }

    async fn find_one(&self, collection: &CollectionRef, filter: Document) -> StoreResult<Option<Document>> {
        self.get_collection(collection)
            .find_one(filter)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn count_documents(&self, collection: &CollectionRef, filter: Document) -> StoreResult<u64> {
        self.get_collection(collection)
            .count_documents(filter)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))
    }

    async fn drop_collection(&self, collection: &CollectionRef) -> StoreResult<()> {
        self.get_collection(collection)
            .drop()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }

    async fn shutdown(&self) -> StoreResult<()> {
        self.client
            .clone()
            .shutdown()
            .await;

        Ok(())
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> StoreResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| StoreError::Initialization(e.to_string()))?,
            )
            .map_err(|e| StoreError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
