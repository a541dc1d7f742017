//! Explicit schema descriptors for model types.
//!
//! A [`Schema`] is the ordered list of field slots a model type declares. It is built once
//! per type and consulted whenever a model instance is constructed. Model types usually
//! implement [`ModelSchema`] through `#[derive(ModelSchema)]`:
//!
//! ```ignore
//! #[derive(ModelSchema)]
//! #[model(collection = "users")]
//! #[field(username)]
//! #[field(logincount, default = 0)]
//! #[field(created, default_with = bson::DateTime::now)]
//! pub struct User;
//! ```
//!
//! or by hand:
//!
//! ```ignore
//! impl ModelSchema for User {
//!     fn schema() -> &'static Schema {
//!         static SCHEMA: OnceLock<Schema> = OnceLock::new();
//!         SCHEMA.get_or_init(|| {
//!             Schema::builder("User")
//!                 .field(FieldSpec::new("username"))
//!                 .field(FieldSpec::new("logincount").with_default(0))
//!                 .build()
//!         })
//!     }
//!
//!     fn collection_name() -> &'static str {
//!         "users"
//!     }
//! }
//! ```

use bson::Bson;
use std::{
    fmt::{self, Debug},
    sync::Arc,
};

/// The default of a field slot.
#[derive(Clone)]
pub enum FieldDefault {
    /// A static value, cloned into every new model.
    Value(Bson),
    /// A producer, invoked once for every new model.
    Producer(Arc<dyn Fn() -> Bson + Send + Sync>),
}

impl FieldDefault {
    pub fn produce(&self) -> Bson {
        match self {
            FieldDefault::Value(value) => value.clone(),
            FieldDefault::Producer(producer) => producer(),
        }
    }
}

impl Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FieldDefault::Producer(_) => f.write_str("Producer(..)"),
        }
    }
}

/// A declared field slot: a name and an optional default.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    name: String,
    default: Option<FieldDefault>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), default: None }
    }

    pub fn with_default(mut self, value: impl Into<Bson>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    pub fn with_default_fn<F, T>(mut self, producer: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
        T: Into<Bson>,
    {
        self.default = Some(FieldDefault::Producer(Arc::new(move || producer().into())));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn default(&self) -> Option<&FieldDefault> {
        self.default.as_ref()
    }
}

/// The ordered field slots of a model type.
#[derive(Debug, Clone)]
pub struct Schema {
    type_name: String,
    fields: Vec<FieldSpec>,
}

impl Schema {
    pub fn builder(type_name: impl Into<String>) -> SchemaBuilder {
        SchemaBuilder {
            schema: Schema {
                type_name: type_name.into(),
                fields: Vec::new(),
            },
        }
    }

    /// The model's type name, used in its debug representation.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields
            .iter()
            .find(|spec| spec.name == name)
    }
}

/// Builder for [`Schema`].
#[derive(Debug)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Appends a field slot. A later slot with the same name replaces the earlier one.
    pub fn field(mut self, spec: FieldSpec) -> Self {
        match self.schema.fields.iter_mut().find(|existing| existing.name == spec.name) {
            Some(existing) => *existing = spec,
            None => self.schema.fields.push(spec),
        }
        self
    }

    pub fn build(self) -> Schema {
        self.schema
    }
}

/// Binds a model type to its schema descriptor and collection.
pub trait ModelSchema: Send + Sync + 'static {
    /// The schema descriptor, computed once per type.
    fn schema() -> &'static Schema;

    /// The collection records of this type are stored in.
    fn collection_name() -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_ordered_schema() {
        let schema = Schema::builder("User")
            .field(FieldSpec::new("username"))
            .field(FieldSpec::new("logincount").with_default(0))
            .field(FieldSpec::new("answer").with_default_fn(|| 42))
            .field(FieldSpec::new("username").with_default("anonymous"))
            .build();

        let names = schema
            .fields()
            .iter()
            .map(FieldSpec::name)
            .collect::<Vec<_>>();

        assert_eq!(schema.type_name(), "User");
        assert_eq!(names, vec!["username", "logincount", "answer"]);
        assert_eq!(
            schema.field("username").and_then(FieldSpec::default).map(FieldDefault::produce),
            Some(Bson::String("anonymous".to_string())),
        );
        assert_eq!(
            schema.field("answer").and_then(FieldSpec::default).map(FieldDefault::produce),
            Some(Bson::Int32(42)),
        );
        assert!(schema.field("missing").is_none());
    }
}
