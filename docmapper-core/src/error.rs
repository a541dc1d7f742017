//! Error types and result types for mapper and store operations.
//!
//! Three layers of failure exist:
//!
//! - [`StoreError`] - raised by a [`StoreBackend`](crate::backend::StoreBackend) implementation
//! - [`OperatorError`] - raised while interpreting or applying update and filter operators
//! - [`ModelError`] - the single error kind surfaced by models and mappers, which wraps the
//!   other two without translating them

use bson::error::Error as BsonError;
use thiserror::Error;

use crate::path::FieldPath;

/// Represents all possible errors that can occur when interacting with a store backend.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Serialization/deserialization error when converting between document formats.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A document with the given ID already exists in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document {0} already exists in collection {1}")]
    DocumentAlreadyExists(String, String),
    /// The requested document was not found in the collection.
    /// The first argument is the document ID, the second is the collection name.
    #[error("Document not found {0} in collection {1}")]
    DocumentNotFound(String, String),
    /// The document or update has an invalid structure.
    #[error("Invalid document: {0}")]
    InvalidDocument(String),
    /// An error occurred in the underlying storage backend.
    #[error("Backend error: {0}")]
    Backend(String),
    /// An unknown error occurred.
    #[error("Unknown error: {0}")]
    Unknown(String),
}

/// A specialized `Result` type for store backend operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<OperatorError> for StoreError {
    fn from(err: OperatorError) -> Self {
        StoreError::InvalidDocument(err.to_string())
    }
}

/// Errors raised by update and filter operators.
///
/// Update operators are applied in two places: optimistically to a model's local
/// field values, and by backends that evaluate update documents themselves.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum OperatorError {
    /// Two pending operations on overlapping paths cannot be expressed in one update.
    #[error("Conflicting pending operations on path {path}; save before applying {operator}")]
    Conflict { path: FieldPath, operator: &'static str },
    /// The value at a path does not have the shape the operator requires.
    #[error("Value at path {path} must be {expected}")]
    TypeMismatch { path: FieldPath, expected: &'static str },
    /// The operator name is not supported.
    #[error("Unknown operator: {0}")]
    UnknownOperator(String),
    /// The operator was given an operand it cannot use.
    #[error("Invalid operand for {operator}: {reason}")]
    InvalidOperand { operator: String, reason: String },
    /// The path addresses a field that cannot be modified.
    #[error("Path {0} is immutable")]
    ImmutableField(FieldPath),
}

/// Errors surfaced by models, mappers and cursors.
#[derive(Error, Debug)]
pub enum ModelError {
    /// The operation needs a mapper binding and the model has none.
    #[error("Model is not bound to a mapper")]
    UnboundModel,
    /// The model has never been persisted, so it has no identity to address.
    #[error("Model has not been saved")]
    UnsavedModel,
    /// The field is declared but currently holds no value.
    #[error("Field {0:?} is not defined")]
    UndefinedField(String),
    /// No field with this name exists on the model.
    #[error("Unknown field: {0:?}")]
    UnknownField(String),
    /// Converting a field value to or from a Rust type failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// A field operation was rejected.
    #[error(transparent)]
    Operator(#[from] OperatorError),
    /// The store reported a failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// A specialized `Result` type for model and mapper operations.
pub type ModelResult<T> = Result<T, ModelError>;

impl From<BsonError> for ModelError {
    fn from(err: BsonError) -> Self {
        ModelError::Serialization(err.to_string())
    }
}
