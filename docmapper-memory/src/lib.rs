//! In-memory document storage backend for docmapper.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It uses async-aware read-write locks for concurrent access and is ideal for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Native operators** - Filters and update documents use the same operators as MongoDB
//! - **Full query support** - Supports filtering, sorting, and pagination
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryStore};
//!
//! #[derive(ModelSchema)]
//! #[field(name)]
//! pub struct User;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let backend = InMemoryStore::builder().build().await?;
//!     let users = Store::new(backend).mapper::<User>();
//!
//!     let mut user = users.create(doc! { "name": "Alice" });
//!     user.save().await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_memory;

pub mod store;

pub use store::{InMemoryStore, InMemoryStoreBuilder};
