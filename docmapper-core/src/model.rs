//! Models: ordered collections of mutation-tracked fields.
//!
//! A [`Model`] is built from the schema descriptor of its type. Mutations go through its
//! [`Field`]s, and [`Model::save`] turns the pending operations of every field into one
//! partial update, so a save never re-sends values it did not touch.
//!
//! # Save and reload protocol
//!
//! - The first save of a model without an identity inserts every defined field and records
//!   the identity the store assigned (or the one supplied via [`SaveOptions::with_id`]).
//! - Later saves send only the pending operations, filtered by identity. Nothing pending
//!   means no round trip.
//! - [`Model::reload`] overwrites every field with the persisted record and discards all
//!   pending operations.
//! - Reading an undefined field of a persisted model fetches the record and fills only the
//!   fields that are undefined and untouched.
//!
//! # Example
//!
//! ```ignore
//! let mut user = users.create_empty();
//! user.field_mut("logincount")?.inc(1)?;
//! user.field_mut("username")?.set("Foo Bar");
//! user.save().await?;
//!
//! user.field_mut("logincount")?.inc(41)?;
//! user.save().await?; // { "$inc": { "logincount": 41 } }
//! ```

use bson::{Bson, Document, de::deserialize_from_bson, ser::serialize_to_bson};
use serde::{Serialize, de::DeserializeOwned};
use std::fmt::{self, Debug};
use tracing::{debug, trace, warn};

use crate::{
    error::{ModelError, ModelResult, StoreError},
    field::Field,
    mapper::Mapper,
    schema::{FieldSpec, ModelSchema},
    update::Update,
};

/// Options for [`Model::save_with`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SaveOptions {
    id: Option<Bson>,
}

impl SaveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the model under `id` instead of a store-assigned identity.
    ///
    /// Only used by the first save of a model.
    pub fn with_id(mut self, id: impl Into<Bson>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn id(&self) -> Option<&Bson> {
        self.id.as_ref()
    }
}

/// An instance of the model type `S`.
pub struct Model<S: ModelSchema> {
    fields: Vec<Field>,
    id: Option<Bson>,
    /// `_id` given at construction, used by the first insert.
    requested_id: Option<Bson>,
    mapper: Option<Mapper<S>>,
}

impl<S: ModelSchema> Model<S> {
    /// Creates an unbound model from initial values.
    ///
    /// Every declared field present in `initial` is defined with that value; the others
    /// take their default, if any. Keys that are not declared fields are ignored. An `_id`
    /// key becomes the identity the first save inserts the model under.
    pub fn new(initial: Document) -> Self {
        let mut fields = S::schema()
            .fields()
            .iter()
            .map(Field::from_spec)
            .collect::<Vec<_>>();
        let mut requested_id = None;

        for (key, value) in initial {
            if key == "_id" {
                requested_id = Some(value);
                continue;
            }

            if let Some(field) = fields.iter_mut().find(|field| field.name() == key) {
                *field = Field::with_value(key, value);
            }
        }

        Self {
            fields,
            id: None,
            requested_id,
            mapper: None,
        }
    }

    /// Wraps a persisted record. Defaults are not applied; fields absent from the record
    /// stay undefined.
    pub(crate) fn from_record(mut record: Document, mapper: Mapper<S>) -> Self {
        let id = record.remove("_id");
        let fields = S::schema()
            .fields()
            .iter()
            .map(|spec| match record.remove(spec.name()) {
                Some(value) => Field::with_value(spec.name(), value),
                None => Field::new(spec.name()),
            })
            .collect();

        Self {
            fields,
            id,
            requested_id: None,
            mapper: Some(mapper),
        }
    }

    pub fn type_name(&self) -> &'static str {
        S::schema().type_name()
    }

    /// Attaches the model to a mapper. Field state is not touched.
    pub fn bind(&mut self, mapper: Mapper<S>) {
        self.mapper = Some(mapper);
    }

    pub fn mapper(&self) -> Option<&Mapper<S>> {
        self.mapper.as_ref()
    }

    /// The persisted identity, `None` if the model has never been saved.
    pub fn id(&self) -> Option<&Bson> {
        self.id.as_ref()
    }

    /// Attaches an existing persisted identity, so that saves update that record.
    pub fn set_id(&mut self, id: impl Into<Bson>) {
        self.id = Some(id.into());
    }

    pub fn contains_field(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// # Errors
    ///
    /// Returns [`ModelError::UnknownField`] if no field is named `name`.
    pub fn field(&self, name: &str) -> ModelResult<&Field> {
        let index = self.index_of(name)?;
        Ok(&self.fields[index])
    }

    /// # Errors
    ///
    /// Returns [`ModelError::UnknownField`] if no field is named `name`.
    pub fn field_mut(&mut self, name: &str) -> ModelResult<&mut Field> {
        let index = self.index_of(name)?;
        Ok(&mut self.fields[index])
    }

    /// Every field, defined or not, in declaration order.
    pub fn fields(&self) -> impl Iterator<Item = &Field> {
        self.fields.iter()
    }

    /// Adds a field after construction, materializing its default.
    ///
    /// A field with the same name is replaced.
    pub fn add_field(&mut self, spec: FieldSpec) -> &mut Field {
        let field = Field::from_spec(&spec);

        let index = match self.position(spec.name()) {
            Some(index) => {
                self.fields[index] = field;
                index
            },
            None => {
                self.fields.push(field);
                self.fields.len() - 1
            },
        };

        &mut self.fields[index]
    }

    /// Removes a field together with its pending operations.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::UnknownField`] if no field is named `name`.
    pub fn remove_field(&mut self, name: &str) -> ModelResult<Field> {
        let index = self.index_of(name)?;
        Ok(self.fields.remove(index))
    }

    /// Returns the value of a field.
    ///
    /// If the field is undefined and the model is bound and persisted, the record is
    /// fetched first and undefined, untouched fields are filled from it. The fetch is
    /// repeated on every read while the field stays undefined.
    ///
    /// # Errors
    ///
    /// - [`ModelError::UnknownField`] if no field is named `name`
    /// - [`ModelError::UndefinedField`] if the field holds no value
    /// - [`ModelError::Store`] if the fetch fails
    pub async fn get(&mut self, name: &str) -> ModelResult<&Bson> {
        let index = self.index_of(name)?;

        if !self.fields[index].is_defined() {
            self.fill_undefined().await?;
        }

        self.fields[index]
            .value()
            .ok_or_else(|| ModelError::UndefinedField(name.to_string()))
    }

    /// Returns the value of a field converted to `T`. See [`get`](Self::get).
    pub async fn get_as<T: DeserializeOwned>(&mut self, name: &str) -> ModelResult<T> {
        let value = self.get(name).await?.clone();
        Ok(deserialize_from_bson(value)?)
    }

    /// Sets the value of a field.
    pub fn set(&mut self, name: &str, value: impl Into<Bson>) -> ModelResult<()> {
        self.field_mut(name)?.set(value);
        Ok(())
    }

    /// Sets the value of a field from any serializable value.
    pub fn set_as<T: Serialize>(&mut self, name: &str, value: &T) -> ModelResult<()> {
        let value = serialize_to_bson(value)?;
        self.set(name, value)
    }

    /// Iterates over the defined fields as `(name, value)` pairs, in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bson)> {
        self.fields
            .iter()
            .filter_map(|field| field.value().map(|value| (field.name(), value)))
    }

    /// The defined fields as a document. The identity is not included.
    pub fn to_document(&self) -> Document {
        self.iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    /// The defined fields as JSON.
    pub fn to_json(&self) -> ModelResult<serde_json::Value> {
        serde_json::to_value(self.to_document())
            .map_err(|e| ModelError::Serialization(e.to_string()))
    }

    /// Returns `true` if any field has operations waiting to be saved.
    pub fn is_dirty(&self) -> bool {
        self.fields
            .iter()
            .any(Field::is_dirty)
    }

    /// The partial update the next save of a persisted model would send.
    pub fn pending_update(&self) -> ModelResult<Update> {
        let mut update = Update::new();

        for field in &self.fields {
            update.extend(field.pending().clone())?;
        }

        Ok(update)
    }

    /// Persists the model. See [`save_with`](Self::save_with).
    pub async fn save(&mut self) -> ModelResult<()> {
        self.save_with(SaveOptions::default()).await
    }

    /// Persists the model.
    ///
    /// A model without an identity is inserted with every defined field. A persisted model
    /// sends its pending operations as one partial update filtered by identity; with
    /// nothing pending, no request is made. Pending operations are cleared on success.
    ///
    /// # Errors
    ///
    /// - [`ModelError::UnboundModel`] if the model has no mapper
    /// - [`ModelError::Store`] if the store rejects the request
    pub async fn save_with(&mut self, options: SaveOptions) -> ModelResult<()> {
        let mapper = self.mapper
            .as_ref()
            .ok_or(ModelError::UnboundModel)?;

        match self.id.clone() {
            None => {
                let mut document = Document::new();
                if let Some(id) = options.id.or_else(|| self.requested_id.clone()) {
                    document.insert("_id", id);
                }
                for (name, value) in self.iter() {
                    document.insert(name, value.clone());
                }

                let fields = document.len();
                let id = mapper.insert_one(document).await?;

                debug!(
                    collection = %mapper.collection().name,
                    id = %id,
                    fields,
                    "Inserted model"
                );

                self.id = Some(id);
                self.requested_id = None;
            },
            Some(id) => {
                if let Some(requested) = options.id() {
                    warn!(
                        id = %id,
                        requested = %requested,
                        "Ignoring identity override for a model that is already persisted"
                    );
                }

                let update = self.pending_update()?;
                if update.is_empty() {
                    trace!(id = %id, "Nothing to save");
                    return Ok(());
                }

                let operators = update
                    .operators()
                    .iter()
                    .map(|operator| operator.as_str())
                    .collect::<Vec<_>>();
                let outcome = mapper
                    .update_by_id(&id, update.to_document())
                    .await?;

                if outcome.matched == 0 {
                    warn!(
                        collection = %mapper.collection().name,
                        id = %id,
                        "Saved model matched no record"
                    );
                } else {
                    debug!(
                        collection = %mapper.collection().name,
                        id = %id,
                        ?operators,
                        "Updated model"
                    );
                }
            },
        }

        self.commit();

        Ok(())
    }

    /// Overwrites every field with the persisted record, discarding pending operations.
    ///
    /// Every declared field is rebuilt, including ones removed with
    /// [`remove_field`](Self::remove_field). Fields added with [`add_field`](Self::add_field)
    /// are kept. Fields absent from the record become undefined.
    ///
    /// # Errors
    ///
    /// - [`ModelError::UnboundModel`] if the model has no mapper
    /// - [`ModelError::UnsavedModel`] if the model has no identity
    /// - [`StoreError::DocumentNotFound`] if the record no longer exists
    pub async fn reload(&mut self) -> ModelResult<()> {
        let mapper = self.mapper
            .as_ref()
            .ok_or(ModelError::UnboundModel)?;
        let id = self.id
            .as_ref()
            .ok_or(ModelError::UnsavedModel)?;

        let record = mapper
            .fetch(id)
            .await?
            .ok_or_else(|| StoreError::DocumentNotFound(id.to_string(), mapper.collection().name.clone()))?;

        debug!(
            collection = %mapper.collection().name,
            id = %id,
            "Reloaded model"
        );

        // Declared fields come back in schema order; dynamically added ones follow
        let mut fields = S::schema()
            .fields()
            .iter()
            .map(|spec| Field::new(spec.name()))
            .collect::<Vec<_>>();
        for field in self.fields.drain(..) {
            if !fields.iter().any(|declared| declared.name() == field.name()) {
                fields.push(field);
            }
        }
        for field in &mut fields {
            field.reset(record.get(field.name()).cloned());
        }
        self.fields = fields;

        Ok(())
    }

    /// Fills undefined, untouched fields from the persisted record.
    ///
    /// Does nothing for unbound or unsaved models.
    async fn fill_undefined(&mut self) -> ModelResult<()> {
        let (Some(mapper), Some(id)) = (self.mapper.as_ref(), self.id.as_ref()) else {
            return Ok(());
        };

        let Some(record) = mapper.fetch(id).await? else {
            debug!(id = %id, "Persisted record is gone, nothing to fill");
            return Ok(());
        };

        let mut filled = Vec::new();
        for field in &mut self.fields {
            if let Some(value) = record.get(field.name()) {
                if field.fill(value) {
                    filled.push(field.name().to_string());
                }
            }
        }

        trace!(id = %id, fields = ?filled, "Filled undefined fields");

        Ok(())
    }

    fn commit(&mut self) {
        for field in &mut self.fields {
            field.commit();
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.fields
            .iter()
            .position(|field| field.name() == name)
    }

    fn index_of(&self, name: &str) -> ModelResult<usize> {
        self.position(name)
            .ok_or_else(|| ModelError::UnknownField(name.to_string()))
    }
}

impl<S: ModelSchema> Default for Model<S> {
    fn default() -> Self {
        Self::new(Document::new())
    }
}

impl<S: ModelSchema> Clone for Model<S> {
    fn clone(&self) -> Self {
        Self {
            fields: self.fields.clone(),
            id: self.id.clone(),
            requested_id: self.requested_id.clone(),
            mapper: self.mapper.clone(),
        }
    }
}

impl<S: ModelSchema> Debug for Model<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.type_name(), self.to_document())
    }
}

#[cfg(test)]
mod tests {
    use bson::{bson, doc};
    use futures::executor::block_on;
    use serde::{Deserialize, Serialize};
    use std::sync::OnceLock;

    use super::*;
    use crate::schema::Schema;

    struct Simple;

    impl ModelSchema for Simple {
        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                Schema::builder("SimpleModel")
                    .field(FieldSpec::new("xbool"))
                    .field(FieldSpec::new("xint"))
                    .field(FieldSpec::new("xfloat"))
                    .field(FieldSpec::new("xlist"))
                    .field(FieldSpec::new("xdict"))
                    .build()
            })
        }

        fn collection_name() -> &'static str {
            "simple"
        }
    }

    struct Counter;

    impl ModelSchema for Counter {
        fn schema() -> &'static Schema {
            static SCHEMA: OnceLock<Schema> = OnceLock::new();
            SCHEMA.get_or_init(|| {
                Schema::builder("Counter")
                    .field(FieldSpec::new("counter").with_default_fn(|| 42))
                    .field(FieldSpec::new("fixed").with_default(100))
                    .build()
            })
        }

        fn collection_name() -> &'static str {
            "counters"
        }
    }

    #[test]
    fn initial_values_and_defaults() {
        let model = Model::<Simple>::new(doc! { "xint": 5, "unknown": 1 });

        assert_eq!(model.field("xint").unwrap().value(), Some(&bson!(5)));
        assert!(!model.field("xbool").unwrap().is_defined());
        assert!(!model.contains_field("unknown"));
        assert!(!model.is_dirty());

        let mut model = Model::<Counter>::default();
        assert_eq!(model.field("counter").unwrap().value(), Some(&bson!(42)));
        assert_eq!(model.field("fixed").unwrap().value(), Some(&bson!(100)));

        model.field_mut("counter").unwrap().inc(8).unwrap();
        assert_eq!(model.field("counter").unwrap().value(), Some(&bson!(50)));

        let model = Model::<Counter>::new(doc! { "fixed": 5 });
        assert_eq!(model.field("fixed").unwrap().value(), Some(&bson!(5)));
    }

    #[test]
    fn iterates_defined_fields() {
        let mut model = Model::<Simple>::new(doc! { "xint": 1, "xbool": true });

        assert_eq!(model.to_document(), doc! { "xbool": true, "xint": 1 });

        model.set("xfloat", 0.5).unwrap();
        let names = model
            .iter()
            .map(|(name, _)| name)
            .collect::<Vec<_>>();
        assert_eq!(names, vec!["xbool", "xint", "xfloat"]);
    }

    #[test]
    fn unknown_and_undefined_fields() {
        let mut model = Model::<Simple>::new(doc! { "xint": 1 });

        assert_eq!(block_on(model.get("xint")).unwrap(), &bson!(1));
        assert!(matches!(
            block_on(model.get("not_existing_key")),
            Err(ModelError::UnknownField(name)) if name == "not_existing_key",
        ));
        assert!(matches!(
            block_on(model.get("xbool")),
            Err(ModelError::UndefinedField(name)) if name == "xbool",
        ));
    }

    #[test]
    fn removes_and_adds_fields() {
        let mut model = Model::<Simple>::new(doc! { "xint": 1 });

        model.remove_field("xint").unwrap();
        assert!(!model.contains_field("xint"));
        assert!(matches!(block_on(model.get("xint")), Err(ModelError::UnknownField(_))));
        assert!(matches!(model.remove_field("xint"), Err(ModelError::UnknownField(_))));

        model.add_field(FieldSpec::new("newfield").with_default("x"));
        assert!(model.contains_field("newfield"));
        assert_eq!(model.field("newfield").unwrap().value(), Some(&bson!("x")));
    }

    #[test]
    fn unbound_models_cannot_persist() {
        let mut model = Model::<Simple>::default();

        assert!(matches!(block_on(model.save()), Err(ModelError::UnboundModel)));
        assert!(matches!(block_on(model.reload()), Err(ModelError::UnboundModel)));
    }

    #[test]
    fn pending_update_spans_fields() {
        let mut model = Model::<Simple>::default();
        model.field_mut("xint").unwrap().inc(1).unwrap();
        model.set("xbool", true).unwrap();
        model.field_mut("xlist").unwrap().push("Foo Bar").unwrap();

        assert!(model.is_dirty());
        assert_eq!(
            model.pending_update().unwrap().to_document(),
            doc! {
                "$set": { "xbool": true },
                "$inc": { "xint": 1 },
                "$push": { "xlist": "Foo Bar" },
            },
        );
    }

    #[test]
    fn subfield_of_undefined_value_reads_none() {
        let mut model = Model::<Simple>::default();

        assert_eq!(model.field_mut("xdict").unwrap().at("subfield").value(), None);
    }

    #[test]
    fn typed_access() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        let mut model = Model::<Simple>::default();
        model.set_as("xdict", &Point { x: 1, y: 2 }).unwrap();

        assert_eq!(model.field("xdict").unwrap().value(), Some(&bson!({ "x": 1, "y": 2 })));
        assert_eq!(block_on(model.get_as::<Point>("xdict")).unwrap(), Point { x: 1, y: 2 });
        assert!(matches!(
            block_on(model.get_as::<String>("xdict")),
            Err(ModelError::Serialization(_)),
        ));
        assert_eq!(model.to_json().unwrap(), serde_json::json!({ "xdict": { "x": 1, "y": 2 } }));
    }

    #[test]
    fn debug_shows_type_and_defined_fields() {
        let model = Model::<Simple>::new(doc! { "xbool": true, "xfloat": 0.1 });
        let repr = format!("{model:?}");

        assert!(repr.starts_with("SimpleModel({"));
        assert!(repr.ends_with("})"));
        assert_eq!(&repr[12..repr.len() - 1], doc! { "xbool": true, "xfloat": 0.1 }.to_string());
    }
}
