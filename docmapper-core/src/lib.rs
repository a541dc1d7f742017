//! A mutation-tracking object mapper for JSON document stores.
//!
//! This crate is the core of the docmapper project and provides:
//!
//! - **Fields** ([`field`]) - Named value slots that track pending update operations
//! - **Update documents** ([`update`]) - The operator-grouped partial update built from them
//! - **Models** ([`model`]) - Field collections with the save/reload protocol
//! - **Schemas** ([`schema`]) - Explicit descriptors of a model type's declared fields
//! - **Mappers and cursors** ([`mapper`], [`cursor`]) - The link between model types and collections
//! - **Store backend abstraction** ([`backend`]) - The CRUD interface backends implement
//! - **Filter evaluation** ([`filter`]) - Matching filter documents in memory, for backends without a query engine
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmapper::prelude::*;
//!
//! #[derive(ModelSchema)]
//! #[model(collection = "users")]
//! #[field(username)]
//! #[field(logincount, default = 0)]
//! pub struct User;
//!
//! let store = Store::new(InMemoryStore::builder().build().await?);
//! let users = store.mapper::<User>();
//!
//! let mut user = users.create(doc! { "username": "Foo Bar" });
//! user.save().await?;
//!
//! user.field_mut("logincount")?.inc(1)?;
//! user.save().await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_core;

pub mod backend;
pub mod cursor;
pub mod error;
pub mod field;
pub mod filter;
pub mod mapper;
pub mod model;
pub mod options;
pub mod path;
pub mod schema;
pub mod store;
pub mod update;
mod value;
