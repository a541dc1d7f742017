//! MongoDB backend implementation for docmapper.
//!
//! This crate provides a MongoDB-based implementation of the `StoreBackend` trait.
//! Filters and update documents are handed to the server unchanged, so every operator
//! the server understands is available to mappers.
//!
//! To use this backend, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmapper = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Features
//!
//! - **Persistent storage** - Data is persisted to MongoDB Atlas or self-hosted MongoDB
//! - **Native queries** - Filtering, sorting and pagination run on the server
//! - **Collection options** - Read concern, write concern and read preference per mapper
//! - **Async/await** - Fully asynchronous API built on MongoDB's async driver
//!
//! # Example
//!
//! ```ignore
//! use docmapper::{backend::StoreBackendBuilder, mongodb::MongoDbStore, Store};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!     let store = Store::new(backend);
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_mongodb;

pub mod options;
pub mod store;

pub use store::{MongoDbStore, MongoDbStoreBuilder};
