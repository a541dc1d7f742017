//! Mutation-tracked field slots.
//!
//! A [`Field`] holds a value (or nothing, when undefined) and the operations that have
//! been applied to it locally but not yet persisted. Every mutation updates the local value
//! the way the store would and records the matching update operator:
//!
//! ```ignore
//! let field = model.field_mut("logincount")?;
//! field.inc(1)?;
//! field.inc(2)?;
//!
//! assert_eq!(field.value(), Some(&Bson::Int32(3)));
//! assert_eq!(field.pending().to_document(), doc! { "$inc": { "logincount": 3 } });
//! ```
//!
//! Values that are embedded documents can be addressed below the field with
//! [`Field::at`]; the resulting [`SubField`] records operations on the dotted path.

use bson::Bson;

use crate::{
    error::ModelResult,
    path::FieldPath,
    schema::FieldSpec,
    update::{PopEnd, Update, UpdateOp},
    value::lookup,
};

/// A named, mutation-tracked value slot.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    value: Option<Bson>,
    pending: Update,
}

impl Field {
    /// Creates an undefined field.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            pending: Update::new(),
        }
    }

    /// Creates a defined field with no pending operations.
    pub fn with_value(name: impl Into<String>, value: impl Into<Bson>) -> Self {
        Self {
            name: name.into(),
            value: Some(value.into()),
            pending: Update::new(),
        }
    }

    /// Creates a field for a declared slot, materializing its default if it has one.
    pub fn from_spec(spec: &FieldSpec) -> Self {
        Self {
            name: spec.name().to_string(),
            value: spec.default().map(|default| default.produce()),
            pending: Update::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The current local value, `None` if the field is undefined.
    pub fn value(&self) -> Option<&Bson> {
        self.value.as_ref()
    }

    pub fn is_defined(&self) -> bool {
        self.value.is_some()
    }

    /// Returns `true` if the field has operations waiting to be saved.
    pub fn is_dirty(&self) -> bool {
        !self.pending.is_empty()
    }

    /// The operations waiting to be saved, keyed by full path.
    pub fn pending(&self) -> &Update {
        &self.pending
    }

    pub fn path(&self) -> FieldPath {
        FieldPath::new(self.name.clone())
    }

    /// Addresses the value stored under `key` inside this field.
    pub fn at(&mut self, key: impl Into<String>) -> SubField<'_> {
        let path = self.path().child(key);
        SubField { field: self, path }
    }

    /// Replaces the value, superseding every pending operation on the field.
    pub fn set(&mut self, value: impl Into<Bson>) {
        let value = value.into();
        self.pending.replace(self.path(), UpdateOp::Set(value.clone()));
        self.value = Some(value);
    }

    /// Removes the value, superseding every pending operation on the field.
    pub fn unset(&mut self) {
        self.pending.replace(self.path(), UpdateOp::Unset);
        self.value = None;
    }

    /// Adds `delta` to the value, treating an undefined value as zero.
    pub fn inc(&mut self, delta: impl Into<Bson>) -> ModelResult<()> {
        self.apply(self.path(), UpdateOp::inc(delta)?)
    }

    /// Appends an item, treating an undefined value as an empty array.
    pub fn push(&mut self, item: impl Into<Bson>) -> ModelResult<()> {
        self.apply(self.path(), UpdateOp::Push(vec![item.into()]))
    }

    pub fn push_all<I, T>(&mut self, items: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        self.apply(self.path(), UpdateOp::Push(items.into_iter().map(Into::into).collect()))
    }

    /// Appends an item unless an equal item is already present.
    pub fn add_to_set(&mut self, item: impl Into<Bson>) -> ModelResult<()> {
        self.apply(self.path(), UpdateOp::AddToSet(vec![item.into()]))
    }

    /// Removes the last element.
    pub fn pop(&mut self) -> ModelResult<()> {
        self.apply(self.path(), UpdateOp::Pop(PopEnd::Last))
    }

    /// Removes the first element.
    pub fn pop_front(&mut self) -> ModelResult<()> {
        self.apply(self.path(), UpdateOp::Pop(PopEnd::First))
    }

    /// Removes every element equal to `condition`, or matching it when it is an operator
    /// document such as `{ "$gte": 6 }`.
    pub fn pull(&mut self, condition: impl Into<Bson>) -> ModelResult<()> {
        self.apply(self.path(), UpdateOp::Pull(condition.into()))
    }

    /// Removes every element equal to one of `items`.
    pub fn pull_all<I, T>(&mut self, items: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        self.apply(self.path(), UpdateOp::PullAll(items.into_iter().map(Into::into).collect()))
    }

    /// Applies `op` at `path` locally and records it.
    ///
    /// The local effect is computed on a copy first, so a rejected operation leaves both
    /// the value and the pending operations untouched.
    fn apply(&mut self, path: FieldPath, op: UpdateOp) -> ModelResult<()> {
        let mut next = self.value.clone();
        op.apply_to_field(&mut next, &path)?;

        // Anything below a pending replacement is folded into that replacement
        match self.pending.replacement_covering(&path).cloned() {
            Some(anchor) => {
                let folded = match value_at(next.as_ref(), &anchor) {
                    Some(value) => UpdateOp::Set(value.clone()),
                    None => UpdateOp::Unset,
                };
                self.pending.replace(anchor, folded);
            },
            None => self.pending.record(path, op)?,
        }

        self.value = next;

        Ok(())
    }

    /// Discards pending operations, keeping the current value as the new baseline.
    pub(crate) fn commit(&mut self) {
        self.pending.clear();
    }

    /// Overwrites the value and discards pending operations.
    pub(crate) fn reset(&mut self, value: Option<Bson>) {
        self.value = value;
        self.pending.clear();
    }

    /// Populates an undefined, untouched field. Returns `true` if the value was taken.
    pub(crate) fn fill(&mut self, value: &Bson) -> bool {
        if self.is_defined() || self.is_dirty() {
            return false;
        }

        self.value = Some(value.clone());
        true
    }
}

fn value_at<'a>(value: Option<&'a Bson>, path: &FieldPath) -> Option<&'a Bson> {
    lookup(value?, path.segments().get(1..).unwrap_or_default())
}

/// A view of the value stored at a dotted path inside a [`Field`].
///
/// The view borrows the field mutably, so it cannot outlive a reload of the model that
/// owns the field.
#[derive(Debug)]
pub struct SubField<'a> {
    field: &'a mut Field,
    path: FieldPath,
}

impl<'a> SubField<'a> {
    pub fn path(&self) -> &FieldPath {
        &self.path
    }

    /// The current local value at this path, if any.
    pub fn value(&self) -> Option<&Bson> {
        value_at(self.field.value(), &self.path)
    }

    /// Addresses the value stored under `key` below this path.
    pub fn at(self, key: impl Into<String>) -> SubField<'a> {
        SubField {
            path: self.path.child(key),
            field: self.field,
        }
    }

    pub fn set(&mut self, value: impl Into<Bson>) -> ModelResult<()> {
        self.field.apply(self.path.clone(), UpdateOp::Set(value.into()))
    }

    pub fn unset(&mut self) -> ModelResult<()> {
        self.field.apply(self.path.clone(), UpdateOp::Unset)
    }

    pub fn inc(&mut self, delta: impl Into<Bson>) -> ModelResult<()> {
        self.field.apply(self.path.clone(), UpdateOp::inc(delta)?)
    }

    pub fn push(&mut self, item: impl Into<Bson>) -> ModelResult<()> {
        self.field.apply(self.path.clone(), UpdateOp::Push(vec![item.into()]))
    }

    pub fn push_all<I, T>(&mut self, items: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        self.field.apply(self.path.clone(), UpdateOp::Push(items.into_iter().map(Into::into).collect()))
    }

    pub fn add_to_set(&mut self, item: impl Into<Bson>) -> ModelResult<()> {
        self.field.apply(self.path.clone(), UpdateOp::AddToSet(vec![item.into()]))
    }

    pub fn pop(&mut self) -> ModelResult<()> {
        self.field.apply(self.path.clone(), UpdateOp::Pop(PopEnd::Last))
    }

    pub fn pop_front(&mut self) -> ModelResult<()> {
        self.field.apply(self.path.clone(), UpdateOp::Pop(PopEnd::First))
    }

    pub fn pull(&mut self, condition: impl Into<Bson>) -> ModelResult<()> {
        self.field.apply(self.path.clone(), UpdateOp::Pull(condition.into()))
    }

    pub fn pull_all<I, T>(&mut self, items: I) -> ModelResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        self.field.apply(self.path.clone(), UpdateOp::PullAll(items.into_iter().map(Into::into).collect()))
    }
}

#[cfg(test)]
mod tests {
    use bson::{bson, doc};

    use super::*;
    use crate::error::{ModelError, OperatorError};

    #[test]
    fn inc_on_undefined_starts_at_zero() {
        let mut field = Field::new("counter");
        field.inc(1).unwrap();

        assert_eq!(field.value(), Some(&bson!(1)));
        assert_eq!(field.pending().to_document(), doc! { "$inc": { "counter": 1 } });
    }

    #[test]
    fn set_then_inc_folds_into_set() {
        let mut field = Field::new("counter");
        field.set(1);
        field.inc(8).unwrap();

        assert_eq!(field.value(), Some(&bson!(9)));
        assert_eq!(field.pending().to_document(), doc! { "$set": { "counter": 9 } });

        field.unset();
        field.push("foo").unwrap();
        assert_eq!(field.pending().to_document(), doc! { "$set": { "counter": ["foo"] } });
    }

    #[test]
    fn array_operators() {
        let mut field = Field::with_value("bar", bson!(["foo", "bar", "baz"]));
        field.pull("bar").unwrap();

        assert_eq!(field.value(), Some(&bson!(["foo", "baz"])));
        assert_eq!(field.pending().to_document(), doc! { "$pull": { "bar": "bar" } });

        let mut field = Field::with_value("bar", bson!(["foo", "bar", "baz"]));
        field.pop().unwrap();
        assert_eq!(field.value(), Some(&bson!(["foo", "bar"])));
        assert_eq!(field.pending().to_document(), doc! { "$pop": { "bar": 1 } });

        let mut field = Field::with_value("bar", bson!(["foo", "bar", "baz"]));
        field.pop_front().unwrap();
        assert_eq!(field.value(), Some(&bson!(["bar", "baz"])));

        let mut field = Field::new("tags");
        field.push("a").unwrap();
        field.push_all(["b", "c"]).unwrap();
        assert_eq!(field.value(), Some(&bson!(["a", "b", "c"])));
        assert_eq!(
            field.pending().to_document(),
            doc! { "$push": { "tags": { "$each": ["a", "b", "c"] } } },
        );
    }

    #[test]
    fn rejected_ops_leave_field_untouched() {
        let mut field = Field::with_value("tags", bson!(["a", "b"]));
        field.push("c").unwrap();

        let err = field.pull("a").unwrap_err();
        assert!(matches!(err, ModelError::Operator(OperatorError::Conflict { .. })));
        assert_eq!(field.value(), Some(&bson!(["a", "b", "c"])));
        assert_eq!(field.pending().to_document(), doc! { "$push": { "tags": "c" } });

        let mut field = Field::with_value("name", "text");
        let err = field.inc(1).unwrap_err();
        assert!(matches!(err, ModelError::Operator(OperatorError::TypeMismatch { .. })));
        assert_eq!(field.value(), Some(&bson!("text")));
        assert!(!field.is_dirty());
    }

    #[test]
    fn subfields_record_dotted_paths() {
        let mut field = Field::with_value("name", doc! { "first": "Foo" });
        field.at("last").set("Bar").unwrap();
        field.at("stats").at("visits").inc(1).unwrap();

        assert_eq!(field.at("last").value(), Some(&bson!("Bar")));
        assert_eq!(
            field.value(),
            Some(&bson!({ "first": "Foo", "last": "Bar", "stats": { "visits": 1 } })),
        );
        assert_eq!(
            field.pending().to_document(),
            doc! {
                "$set": { "name.last": "Bar" },
                "$inc": { "name.stats.visits": 1 },
            },
        );

        field.set(doc! { "first": "Baz" });
        field.at("last").set("Qux").unwrap();
        assert_eq!(
            field.pending().to_document(),
            doc! { "$set": { "name": { "first": "Baz", "last": "Qux" } } },
        );
    }

    #[test]
    fn subfields_of_scalars_are_rejected() {
        let mut field = Field::with_value("name", "Foo");

        assert!(field.at("first").set("Bar").is_err());
        assert_eq!(field.value(), Some(&bson!("Foo")));
        assert!(!field.is_dirty());
    }

    #[test]
    fn far_array_indexes_are_rejected() {
        let mut field = Field::with_value("xs", vec![1]);

        let err = field.at("100000000000").set(1).unwrap_err();

        assert!(matches!(err, ModelError::Operator(OperatorError::InvalidOperand { .. })));
        assert_eq!(field.value(), Some(&bson!([1])));
        assert!(!field.is_dirty());

        field.at("2").set(3).unwrap();
        assert_eq!(field.value(), Some(&bson!([1, null, 3])));
    }

    #[test]
    fn fill_only_touches_untouched_undefined_fields() {
        let mut field = Field::with_value("a", 5);
        assert!(!field.fill(&bson!(1)));
        assert_eq!(field.value(), Some(&bson!(5)));

        let mut field = Field::new("b");
        field.unset();
        assert!(!field.fill(&bson!(1)));
        assert_eq!(field.value(), None);

        let mut field = Field::new("c");
        assert!(field.fill(&bson!(1)));
        assert_eq!(field.value(), Some(&bson!(1)));
        assert!(!field.is_dirty());
    }
}
