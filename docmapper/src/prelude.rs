//! Convenient re-exports of commonly used types from docmapper.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docmapper::prelude::*;
//! ```
//!
//! This provides access to:
//! - Models, fields and the schema derive
//! - Mappers, cursors and the store
//! - Store backends and builders
//! - Collection and find options
//! - Error types

pub use bson::{Bson, Document, doc, oid::ObjectId};
pub use docmapper_core::{
    backend::{StoreBackend, StoreBackendBuilder, UpdateOutcome},
    cursor::ModelCursor,
    error::{ModelError, ModelResult, OperatorError, StoreError, StoreResult},
    field::{Field, SubField},
    mapper::{Mapper, Selector},
    model::{Model, SaveOptions},
    options::{
        Acknowledgment, CollectionOptions, FindOptions, ReadConcern, ReadPreference, SortDirection,
        WriteConcern,
    },
    path::FieldPath,
    schema::{FieldSpec, ModelSchema, Schema},
    store::Store,
    update::{Operator, Update, UpdateOp},
};
pub use docmapper_macros::ModelSchema;
