//! Main docmapper crate providing a unified interface for mapped documents.
//!
//! This crate is the primary entry point for users of the docmapper framework.
//! It re-exports the core types and functionality from the sub-crates and provides
//! convenient access to the different storage backends.
//!
//! # Features
//!
//! - **Mutation tracking** - Local field edits are recorded as update operators
//! - **Minimal writes** - A save sends one operator-grouped partial update, never the whole record
//! - **Lazy loading** - Undefined fields of persisted models are filled from the store on read
//! - **Multiple backends** - In-memory and MongoDB storage behind one backend trait
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryStore};
//!
//! #[derive(ModelSchema)]
//! #[model(collection = "users")]
//! #[field(username)]
//! #[field(logincount, default = 0)]
//! #[field(tags, default_with = Vec::<String>::new)]
//! pub struct User;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Create an in-memory store backend
//!     let store = Store::new(InMemoryStore::builder().build().await?);
//!     let users = store.mapper::<User>();
//!
//!     // Insert a new user with every defined field
//!     let mut user = users.create(doc! { "username": "Foo Bar" });
//!     user.save().await?;
//!
//!     // Record operators locally, then send them as one partial update:
//!     // { "$inc": { "logincount": 1 }, "$push": { "tags": "admin" } }
//!     user.field_mut("logincount")?.inc(1)?;
//!     user.field_mut("tags")?.push("admin")?;
//!     user.save().await?;
//!
//!     // Query through the mapper
//!     let mut cursor = users.find(doc! { "logincount": { "$gt": 0 } }).await?;
//!     while let Some(user) = cursor.next().await? {
//!         println!("{user:?}");
//!     }
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Nested values
//!
//! Operators can target any path below a field:
//!
//! ```ignore
//! let mut user = users.find_one(id).await?.unwrap();
//!
//! user.field_mut("profile")?.at("address").at("city").set("Berlin")?;
//! user.save().await?; // { "$set": { "profile.address.city": "Berlin" } }
//! ```
//!
//! # Backends
//!
//! - [`memory`] - Fast in-memory storage for development and testing
//! - [`mongodb`] - Persistent MongoDB backend (requires `mongodb` feature)

#[allow(unused_extern_crates)]
extern crate self as docmapper;

pub mod prelude;

pub use docmapper_core::{
    backend, cursor, error, field, filter, mapper, model, options, path, schema, store, update,
};
pub use docmapper_core::{
    mapper::Mapper,
    model::{Model, SaveOptions},
    store::Store,
};
pub use docmapper_macros::ModelSchema;

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmapper_memory::{InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB storage backend implementations.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmapper_mongodb::{MongoDbStore, MongoDbStoreBuilder, options::collection_options};
}
