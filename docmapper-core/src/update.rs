//! Pending update operations and the canonical partial-update document.
//!
//! An [`Update`] holds at most one [`UpdateOp`] per [`FieldPath`]. Operations recorded on
//! the same path are merged according to the operator:
//!
//! - `$set` and `$unset` supersede whatever was pending on the path and below it
//! - `$inc` deltas are summed
//! - `$push` and `$addToSet` items accumulate into a single `$each`
//! - `$pull` and `$pullAll` of plain values accumulate into a single `$pullAll`
//!
//! Any other combination on overlapping paths cannot be expressed in one update document
//! and is rejected with [`OperatorError::Conflict`].
//!
//! The same types are used by backends that evaluate update documents themselves: an
//! update document parses into an [`Update`] with [`Update::from_document`] and is applied
//! with [`Update::apply_to`].

use bson::{Bson, Document, doc};
use std::collections::BTreeMap;

use crate::{
    error::OperatorError,
    filter::element_matches,
    path::FieldPath,
    value::{add_numbers, is_number, values_equal},
};

/// How many missing elements an operation may pad an array with to reach its index.
pub const MAX_ARRAY_PADDING: usize = 1024;

/// The update operators understood by the mapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Set,
    Unset,
    Inc,
    Push,
    AddToSet,
    Pop,
    Pull,
    PullAll,
}

impl Operator {
    /// All operators, in the order they appear in a rendered update document.
    pub const ALL: [Operator; 8] = [
        Operator::Set,
        Operator::Unset,
        Operator::Inc,
        Operator::Push,
        Operator::AddToSet,
        Operator::Pop,
        Operator::Pull,
        Operator::PullAll,
    ];

    /// The wire name of the operator, e.g. `"$set"`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Set => "$set",
            Operator::Unset => "$unset",
            Operator::Inc => "$inc",
            Operator::Push => "$push",
            Operator::AddToSet => "$addToSet",
            Operator::Pop => "$pop",
            Operator::Pull => "$pull",
            Operator::PullAll => "$pullAll",
        }
    }

    pub fn parse(name: &str) -> Option<Operator> {
        Operator::ALL
            .into_iter()
            .find(|operator| operator.as_str() == name)
    }
}

/// Which end of an array `$pop` removes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PopEnd {
    /// Remove the first element (`$pop: -1`).
    First,
    /// Remove the last element (`$pop: 1`).
    Last,
}

/// A single pending operation on one path.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Replace the value.
    Set(Bson),
    /// Remove the value.
    Unset,
    /// Add a numeric delta.
    Inc(Bson),
    /// Append items to an array.
    Push(Vec<Bson>),
    /// Append items to an array unless already present.
    AddToSet(Vec<Bson>),
    /// Remove the first or last array element.
    Pop(PopEnd),
    /// Remove array elements equal to a value or matching a condition.
    Pull(Bson),
    /// Remove array elements equal to any of the items.
    PullAll(Vec<Bson>),
}

impl UpdateOp {
    pub fn operator(&self) -> Operator {
        match self {
            UpdateOp::Set(_) => Operator::Set,
            UpdateOp::Unset => Operator::Unset,
            UpdateOp::Inc(_) => Operator::Inc,
            UpdateOp::Push(_) => Operator::Push,
            UpdateOp::AddToSet(_) => Operator::AddToSet,
            UpdateOp::Pop(_) => Operator::Pop,
            UpdateOp::Pull(_) => Operator::Pull,
            UpdateOp::PullAll(_) => Operator::PullAll,
        }
    }

    /// Returns `true` for operators that replace the value outright.
    pub fn is_replacement(&self) -> bool {
        matches!(self, UpdateOp::Set(_) | UpdateOp::Unset)
    }

    /// Creates an `$inc` operation, rejecting non-numeric deltas.
    pub fn inc(delta: impl Into<Bson>) -> Result<UpdateOp, OperatorError> {
        let delta = delta.into();

        if !is_number(&delta) {
            return Err(OperatorError::InvalidOperand {
                operator: Operator::Inc.as_str().to_string(),
                reason: format!("cannot increment by non-numeric value {delta}"),
            });
        }

        Ok(UpdateOp::Inc(delta))
    }

    /// The operand as it appears in the rendered update document.
    pub fn operand(&self) -> Bson {
        match self {
            UpdateOp::Set(value) => value.clone(),
            UpdateOp::Unset => Bson::String(String::new()),
            UpdateOp::Inc(delta) => delta.clone(),
            UpdateOp::Push(items) | UpdateOp::AddToSet(items) => match items.as_slice() {
                [single] => single.clone(),
                _ => Bson::Document(doc! { "$each": items.clone() }),
            },
            UpdateOp::Pop(PopEnd::First) => Bson::Int32(-1),
            UpdateOp::Pop(PopEnd::Last) => Bson::Int32(1),
            UpdateOp::Pull(condition) => condition.clone(),
            UpdateOp::PullAll(items) => Bson::Array(items.clone()),
        }
    }

    /// Parses the operand of `operator` as found in an update document.
    pub fn parse(operator: Operator, operand: Bson) -> Result<UpdateOp, OperatorError> {
        let invalid = |reason: &str| OperatorError::InvalidOperand {
            operator: operator.as_str().to_string(),
            reason: reason.to_string(),
        };

        Ok(match operator {
            Operator::Set => UpdateOp::Set(operand),
            Operator::Unset => UpdateOp::Unset,
            Operator::Inc => UpdateOp::inc(operand)?,
            Operator::Push => UpdateOp::Push(each_items(operator, operand)?),
            Operator::AddToSet => UpdateOp::AddToSet(each_items(operator, operand)?),
            Operator::Pop => match operand {
                Bson::Int32(1) | Bson::Int64(1) => UpdateOp::Pop(PopEnd::Last),
                Bson::Int32(-1) | Bson::Int64(-1) => UpdateOp::Pop(PopEnd::First),
                Bson::Double(n) if n == 1.0 => UpdateOp::Pop(PopEnd::Last),
                Bson::Double(n) if n == -1.0 => UpdateOp::Pop(PopEnd::First),
                _ => return Err(invalid("expected 1 or -1")),
            },
            Operator::Pull => UpdateOp::Pull(operand),
            Operator::PullAll => match operand {
                Bson::Array(items) => UpdateOp::PullAll(items),
                _ => return Err(invalid("expected an array")),
            },
        })
    }

    /// Folds `next` into this operation.
    ///
    /// Returns `next` back unchanged when the two cannot share a path.
    pub fn merge(&mut self, next: UpdateOp) -> Result<(), UpdateOp> {
        let current = std::mem::replace(self, UpdateOp::Unset);

        match merge_ops(current, next) {
            Ok(merged) => {
                *self = merged;
                Ok(())
            },
            Err((current, next)) => {
                *self = current;
                Err(next)
            },
        }
    }

    /// Whether the operation materializes missing parents on the way to its target.
    fn creates_path(&self) -> bool {
        matches!(
            self,
            UpdateOp::Set(_) | UpdateOp::Inc(_) | UpdateOp::Push(_) | UpdateOp::AddToSet(_)
        )
    }

    /// Applies the operation to a value slot, where `None` means the value is absent.
    ///
    /// On error the slot is left as it was.
    pub(crate) fn apply(&self, slot: &mut Option<Bson>, path: &FieldPath) -> Result<(), OperatorError> {
        match self {
            UpdateOp::Set(value) => *slot = Some(value.clone()),
            UpdateOp::Unset => *slot = None,
            UpdateOp::Inc(delta) => {
                let next = match slot.as_ref() {
                    None => delta.clone(),
                    Some(current) if !is_number(current) => return Err(mismatch(path, "numeric")),
                    Some(current) => add_numbers(current, delta).ok_or_else(|| inc_overflow(path))?,
                };
                *slot = Some(next);
            },
            UpdateOp::Push(items) => {
                if let Some(array) = array_mut(slot, path, true)? {
                    array.extend(items.iter().cloned());
                }
            },
            UpdateOp::AddToSet(items) => {
                if let Some(array) = array_mut(slot, path, true)? {
                    for item in items {
                        if !array.iter().any(|existing| values_equal(existing, item)) {
                            array.push(item.clone());
                        }
                    }
                }
            },
            UpdateOp::Pop(end) => {
                if let Some(array) = array_mut(slot, path, false)? {
                    if !array.is_empty() {
                        match end {
                            PopEnd::First => {
                                array.remove(0);
                            },
                            PopEnd::Last => {
                                array.pop();
                            },
                        }
                    }
                }
            },
            UpdateOp::Pull(condition) => {
                if let Some(array) = array_mut(slot, path, false)? {
                    let mut kept = Vec::with_capacity(array.len());
                    for item in array.iter() {
                        if !element_matches(item, condition)? {
                            kept.push(item.clone());
                        }
                    }
                    *array = kept;
                }
            },
            UpdateOp::PullAll(items) => {
                if let Some(array) = array_mut(slot, path, false)? {
                    array.retain(|existing| !items.iter().any(|item| values_equal(existing, item)));
                }
            },
        }

        Ok(())
    }

    /// Applies the operation to the value of the top-level field `path` starts at.
    ///
    /// `slot` holds the field's value, `None` if it is undefined.
    pub(crate) fn apply_to_field(&self, slot: &mut Option<Bson>, path: &FieldPath) -> Result<(), OperatorError> {
        let rest = match path.segments().split_first() {
            Some((_, rest)) if !rest.is_empty() => rest,
            _ => return self.apply(slot, path),
        };

        if slot.is_none() {
            if !self.creates_path() {
                return Ok(());
            }
            *slot = Some(Bson::Document(Document::new()));
        }

        match slot {
            Some(value) => self.apply_in(value, path, rest),
            None => Ok(()),
        }
    }

    /// Applies the operation to the value found at `segments` below `container`.
    pub(crate) fn apply_in(
        &self,
        container: &mut Bson,
        path: &FieldPath,
        segments: &[String],
    ) -> Result<(), OperatorError> {
        match container {
            Bson::Document(document) => self.apply_in_document(document, path, segments),
            Bson::Array(items) => self.apply_in_array(items, path, segments),
            _ => Err(mismatch(path, "reachable through embedded documents")),
        }
    }

    pub(crate) fn apply_in_document(
        &self,
        document: &mut Document,
        path: &FieldPath,
        segments: &[String],
    ) -> Result<(), OperatorError> {
        let Some((head, rest)) = segments.split_first() else {
            return Err(mismatch(path, "a non-empty path"));
        };

        if rest.is_empty() {
            let mut slot = document.get(head).cloned();
            self.apply(&mut slot, path)?;

            match (slot, document.get_mut(head)) {
                (Some(value), Some(existing)) => *existing = value,
                (Some(value), None) => {
                    document.insert(head.clone(), value);
                },
                (None, _) => {
                    document.remove(head);
                },
            }

            return Ok(());
        }

        if !document.contains_key(head) {
            if !self.creates_path() {
                return Ok(());
            }
            document.insert(head.clone(), Document::new());
        }

        match document.get_mut(head) {
            Some(child) => self.apply_in(child, path, rest),
            None => Ok(()),
        }
    }

    fn apply_in_array(
        &self,
        items: &mut Vec<Bson>,
        path: &FieldPath,
        segments: &[String],
    ) -> Result<(), OperatorError> {
        let Some((head, rest)) = segments.split_first() else {
            return Err(mismatch(path, "a non-empty path"));
        };
        let index = head
            .parse::<usize>()
            .map_err(|_| mismatch(path, "indexed numerically inside arrays"))?;

        if index >= items.len() {
            if !self.creates_path() {
                return Ok(());
            }
            if !rest.is_empty() {
                return Err(mismatch(path, "an existing array element"));
            }
            if index - items.len() > MAX_ARRAY_PADDING {
                return Err(OperatorError::InvalidOperand {
                    operator: self.operator().as_str().to_string(),
                    reason: format!("index {index} at {path} is too far past the end of the array"),
                });
            }
            items.resize(index, Bson::Null);
            let mut slot = None;
            self.apply(&mut slot, path)?;
            items.push(slot.unwrap_or(Bson::Null));
            return Ok(());
        }

        if !rest.is_empty() {
            return self.apply_in(&mut items[index], path, rest);
        }

        let mut slot = Some(items[index].clone());
        self.apply(&mut slot, path)?;
        // Unsetting an array element leaves a null in its place
        items[index] = slot.unwrap_or(Bson::Null);

        Ok(())
    }
}

fn inc_overflow(path: &FieldPath) -> OperatorError {
    OperatorError::InvalidOperand {
        operator: Operator::Inc.as_str().to_string(),
        reason: format!("incrementing {path} overflows"),
    }
}

fn mismatch(path: &FieldPath, expected: &'static str) -> OperatorError {
    OperatorError::TypeMismatch { path: path.clone(), expected }
}

fn array_mut<'a>(
    slot: &'a mut Option<Bson>,
    path: &FieldPath,
    create: bool,
) -> Result<Option<&'a mut Vec<Bson>>, OperatorError> {
    if slot.is_none() {
        if !create {
            return Ok(None);
        }
        *slot = Some(Bson::Array(Vec::new()));
    }

    match slot {
        Some(Bson::Array(items)) => Ok(Some(items)),
        _ => Err(mismatch(path, "an array")),
    }
}

fn each_items(operator: Operator, operand: Bson) -> Result<Vec<Bson>, OperatorError> {
    match operand {
        Bson::Document(mut modifiers) if modifiers.contains_key("$each") => {
            let each = modifiers.remove("$each");

            if let Some(extra) = modifiers.keys().next() {
                return Err(OperatorError::InvalidOperand {
                    operator: operator.as_str().to_string(),
                    reason: format!("unsupported modifier {extra}"),
                });
            }

            match each {
                Some(Bson::Array(items)) => Ok(items),
                _ => Err(OperatorError::InvalidOperand {
                    operator: operator.as_str().to_string(),
                    reason: "$each expects an array".to_string(),
                }),
            }
        },
        single => Ok(vec![single]),
    }
}

fn is_plain(value: &Bson) -> bool {
    !matches!(value, Bson::Document(_))
}

#[allow(clippy::type_complexity)]
fn merge_ops(current: UpdateOp, next: UpdateOp) -> Result<UpdateOp, (UpdateOp, UpdateOp)> {
    match (current, next) {
        (UpdateOp::Set(_) | UpdateOp::Unset, next @ (UpdateOp::Set(_) | UpdateOp::Unset)) => Ok(next),
        (UpdateOp::Inc(total), UpdateOp::Inc(delta)) => match add_numbers(&total, &delta) {
            Some(sum) => Ok(UpdateOp::Inc(sum)),
            None => Err((UpdateOp::Inc(total), UpdateOp::Inc(delta))),
        },
        (UpdateOp::Push(mut items), UpdateOp::Push(more)) => {
            items.extend(more);
            Ok(UpdateOp::Push(items))
        },
        (UpdateOp::AddToSet(mut items), UpdateOp::AddToSet(more)) => {
            for item in more {
                if !items.iter().any(|existing| values_equal(existing, &item)) {
                    items.push(item);
                }
            }
            Ok(UpdateOp::AddToSet(items))
        },
        (UpdateOp::Pull(first), UpdateOp::Pull(second)) if is_plain(&first) && is_plain(&second) => {
            Ok(UpdateOp::PullAll(vec![first, second]))
        },
        (UpdateOp::Pull(first), UpdateOp::PullAll(more)) if is_plain(&first) => {
            Ok(UpdateOp::PullAll(std::iter::once(first).chain(more).collect()))
        },
        (UpdateOp::PullAll(mut items), UpdateOp::Pull(value)) if is_plain(&value) => {
            items.push(value);
            Ok(UpdateOp::PullAll(items))
        },
        (UpdateOp::PullAll(mut items), UpdateOp::PullAll(more)) => {
            items.extend(more);
            Ok(UpdateOp::PullAll(items))
        },
        (current, next) => Err((current, next)),
    }
}

/// An accumulator of pending operations keyed by path.
///
/// # Example
///
/// ```ignore
/// let mut update = Update::new();
/// update.set("username", "Foo Bar");
/// update.inc("logincount", 1)?;
/// update.push("usernames", "Foo Bar")?;
///
/// assert_eq!(
///     update.to_document(),
///     doc! {
///         "$set": { "username": "Foo Bar" },
///         "$inc": { "logincount": 1 },
///         "$push": { "usernames": "Foo Bar" },
///     },
/// );
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Update {
    ops: BTreeMap<FieldPath, UpdateOp>,
}

impl Update {
    pub fn new() -> Self {
        Self { ops: BTreeMap::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn get(&self, path: &FieldPath) -> Option<&UpdateOp> {
        self.ops.get(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&FieldPath, &UpdateOp)> {
        self.ops.iter()
    }

    pub fn clear(&mut self) {
        self.ops.clear();
    }

    /// The distinct operators present, in rendering order.
    pub fn operators(&self) -> Vec<Operator> {
        Operator::ALL
            .into_iter()
            .filter(|operator| self.ops.values().any(|op| op.operator() == *operator))
            .collect()
    }

    /// Records `op` on `path`, merging with what is already pending.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError::Conflict`] if the operation cannot be combined with a
    /// pending operation on the same, an enclosing or an enclosed path. The log is
    /// unchanged in that case.
    pub fn record(&mut self, path: FieldPath, op: UpdateOp) -> Result<(), OperatorError> {
        let conflict = |path: &FieldPath, op: &UpdateOp| OperatorError::Conflict {
            path: path.clone(),
            operator: op.operator().as_str(),
        };

        if op.is_replacement() {
            if self.ops.keys().any(|pending| pending != &path && pending.contains(&path)) {
                return Err(conflict(&path, &op));
            }
            self.replace(path, op);
            return Ok(());
        }

        if self.ops.keys().any(|pending| pending != &path && pending.overlaps(&path)) {
            return Err(conflict(&path, &op));
        }

        match self.ops.get_mut(&path) {
            Some(existing) => existing
                .merge(op)
                .map_err(|op| match (&*existing, &op) {
                    (UpdateOp::Inc(_), UpdateOp::Inc(_)) => inc_overflow(&path),
                    _ => conflict(&path, &op),
                }),
            None => {
                self.ops.insert(path, op);
                Ok(())
            },
        }
    }

    /// Drops everything pending on `path` and below, then records `op` there.
    pub(crate) fn replace(&mut self, path: FieldPath, op: UpdateOp) {
        self.ops.retain(|pending, _| !path.contains(pending));
        self.ops.insert(path, op);
    }

    /// The path of a pending `$set` or `$unset` on `path` or one of its ancestors.
    pub(crate) fn replacement_covering(&self, path: &FieldPath) -> Option<&FieldPath> {
        self.ops
            .iter()
            .find(|(pending, op)| op.is_replacement() && pending.contains(path))
            .map(|(pending, _)| pending)
    }

    /// Returns `true` if anything is pending on `path`, above it or below it.
    pub fn touches(&self, path: &FieldPath) -> bool {
        self.ops.keys().any(|pending| pending.overlaps(path))
    }

    pub fn set(&mut self, path: impl Into<FieldPath>, value: impl Into<Bson>) -> Result<&mut Self, OperatorError> {
        self.record(path.into(), UpdateOp::Set(value.into()))?;
        Ok(self)
    }

    pub fn unset(&mut self, path: impl Into<FieldPath>) -> Result<&mut Self, OperatorError> {
        self.record(path.into(), UpdateOp::Unset)?;
        Ok(self)
    }

    pub fn inc(&mut self, path: impl Into<FieldPath>, delta: impl Into<Bson>) -> Result<&mut Self, OperatorError> {
        self.record(path.into(), UpdateOp::inc(delta)?)?;
        Ok(self)
    }

    pub fn push(&mut self, path: impl Into<FieldPath>, item: impl Into<Bson>) -> Result<&mut Self, OperatorError> {
        self.record(path.into(), UpdateOp::Push(vec![item.into()]))?;
        Ok(self)
    }

    pub fn push_all<I, T>(&mut self, path: impl Into<FieldPath>, items: I) -> Result<&mut Self, OperatorError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        self.record(path.into(), UpdateOp::Push(items.into_iter().map(Into::into).collect()))?;
        Ok(self)
    }

    pub fn add_to_set(&mut self, path: impl Into<FieldPath>, item: impl Into<Bson>) -> Result<&mut Self, OperatorError> {
        self.record(path.into(), UpdateOp::AddToSet(vec![item.into()]))?;
        Ok(self)
    }

    pub fn pop(&mut self, path: impl Into<FieldPath>, end: PopEnd) -> Result<&mut Self, OperatorError> {
        self.record(path.into(), UpdateOp::Pop(end))?;
        Ok(self)
    }

    pub fn pull(&mut self, path: impl Into<FieldPath>, condition: impl Into<Bson>) -> Result<&mut Self, OperatorError> {
        self.record(path.into(), UpdateOp::Pull(condition.into()))?;
        Ok(self)
    }

    pub fn pull_all<I, T>(&mut self, path: impl Into<FieldPath>, items: I) -> Result<&mut Self, OperatorError>
    where
        I: IntoIterator<Item = T>,
        T: Into<Bson>,
    {
        self.record(path.into(), UpdateOp::PullAll(items.into_iter().map(Into::into).collect()))?;
        Ok(self)
    }

    /// Merges every operation of `other` into this log.
    pub fn extend(&mut self, other: Update) -> Result<(), OperatorError> {
        for (path, op) in other.ops {
            self.record(path, op)?;
        }

        Ok(())
    }

    /// Renders the log as an update document grouped by operator.
    pub fn to_document(&self) -> Document {
        let mut update = Document::new();

        for operator in Operator::ALL {
            let operands = self.ops
                .iter()
                .filter(|(_, op)| op.operator() == operator)
                .map(|(path, op)| (path.to_string(), op.operand()))
                .collect::<Document>();

            if !operands.is_empty() {
                update.insert(operator.as_str(), operands);
            }
        }

        update
    }

    /// Parses an update document.
    ///
    /// # Errors
    ///
    /// Fails on non-operator keys, unknown operators, malformed operands and overlapping
    /// paths.
    pub fn from_document(document: &Document) -> Result<Self, OperatorError> {
        let mut update = Update::new();

        for (name, operands) in document {
            let operator = Operator::parse(name)
                .ok_or_else(|| OperatorError::UnknownOperator(name.to_string()))?;
            let operands = operands
                .as_document()
                .ok_or_else(|| OperatorError::InvalidOperand {
                    operator: name.to_string(),
                    reason: "expected a document of paths".to_string(),
                })?;

            for (path, operand) in operands {
                let path = FieldPath::parse(path);
                let op = UpdateOp::parse(operator, operand.clone())?;

                if update.touches(&path) {
                    return Err(OperatorError::Conflict { path, operator: operator.as_str() });
                }
                update.ops.insert(path, op);
            }
        }

        Ok(update)
    }

    /// Applies every operation to `document`.
    ///
    /// Nothing is written unless every operation succeeds.
    pub fn apply_to(&self, document: &mut Document) -> Result<(), OperatorError> {
        let mut next = document.clone();

        for (path, op) in &self.ops {
            if path.root() == "_id" {
                return Err(OperatorError::ImmutableField(path.clone()));
            }
            op.apply_in_document(&mut next, path, path.segments())?;
        }

        *document = next;

        Ok(())
    }
}

impl IntoIterator for Update {
    type Item = (FieldPath, UpdateOp);
    type IntoIter = std::collections::btree_map::IntoIter<FieldPath, UpdateOp>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use bson::{bson, doc};

    use super::*;

    #[test]
    fn renders_one_entry_per_path() {
        let mut update = Update::new();
        update.inc("logincount", 1).unwrap();
        update.set("username", "Foo Bar").unwrap();
        update.push("usernames", "Foo Bar").unwrap();

        assert_eq!(
            update.to_document(),
            doc! {
                "$set": { "username": "Foo Bar" },
                "$inc": { "logincount": 1 },
                "$push": { "usernames": "Foo Bar" },
            },
        );
        assert_eq!(update.operators(), vec![Operator::Set, Operator::Inc, Operator::Push]);
    }

    #[test]
    fn merges_by_operator() {
        let mut update = Update::new();
        update.inc("counter", 1).unwrap();
        update.inc("counter", 41).unwrap();
        update.push("tags", "a").unwrap();
        update.push_all("tags", ["b", "c"]).unwrap();
        update.add_to_set("roles", "x").unwrap();
        update.add_to_set("roles", "x").unwrap();
        update.add_to_set("roles", "y").unwrap();
        update.pull("bar", "foo").unwrap();
        update.pull("bar", "baz").unwrap();

        assert_eq!(
            update.to_document(),
            doc! {
                "$inc": { "counter": 42 },
                "$push": { "tags": { "$each": ["a", "b", "c"] } },
                "$addToSet": { "roles": { "$each": ["x", "y"] } },
                "$pullAll": { "bar": ["foo", "baz"] },
            },
        );
    }

    #[test]
    fn set_supersedes_pending_ops() {
        let mut update = Update::new();
        update.push("tags", "a").unwrap();
        update.set("name.first", "Foo").unwrap();
        update.set("tags", bson!(["z"])).unwrap();
        update.unset("name").unwrap();

        assert_eq!(
            update.to_document(),
            doc! {
                "$set": { "tags": ["z"] },
                "$unset": { "name": "" },
            },
        );
    }

    #[test]
    fn rejects_conflicting_ops() {
        let mut update = Update::new();
        update.push("tags", "a").unwrap();

        let err = update.pull("tags", "a").unwrap_err();
        assert!(matches!(err, OperatorError::Conflict { operator: "$pull", .. }));

        update.set("name", "x").unwrap();
        assert!(update.inc("name.count", 1).is_err());
        assert!(update.set("name.first", "y").is_err());

        update.pop("stack", PopEnd::Last).unwrap();
        assert!(update.pop("stack", PopEnd::Last).is_err());

        assert_eq!(
            update.to_document(),
            doc! {
                "$set": { "name": "x" },
                "$push": { "tags": "a" },
                "$pop": { "stack": 1 },
            },
        );
    }

    #[test]
    fn rejects_non_numeric_inc() {
        assert!(matches!(
            Update::new().inc("counter", "one"),
            Err(OperatorError::InvalidOperand { .. }),
        ));
    }

    #[test]
    fn parses_update_documents() {
        let update = Update::from_document(&doc! {
            "$set": { "name.first": "Foo" },
            "$inc": { "counter": 2 },
            "$push": { "tags": { "$each": ["a", "b"] } },
            "$pop": { "stack": -1 },
            "$unset": { "gone": 1 },
        })
        .unwrap();

        assert_eq!(update.len(), 5);
        assert_eq!(update.get(&FieldPath::new("stack")), Some(&UpdateOp::Pop(PopEnd::First)));
        assert_eq!(
            update.get(&FieldPath::new("tags")),
            Some(&UpdateOp::Push(vec![bson!("a"), bson!("b")])),
        );

        assert!(Update::from_document(&doc! { "$rename": { "a": "b" } }).is_err());
        assert!(Update::from_document(&doc! { "name": "replacement" }).is_err());
        assert!(Update::from_document(&doc! { "$set": { "a": 1 }, "$inc": { "a.b": 1 } }).is_err());
        assert!(Update::from_document(&doc! { "$push": { "a": { "$each": [1], "$slice": 2 } } }).is_err());
    }

    #[test]
    fn applies_to_documents() {
        let mut document = doc! {
            "_id": 1,
            "counter": 1,
            "tags": ["foo", "bar", "baz"],
            "scores": [3, 6, 9],
            "name": { "first": "Foo" },
        };

        Update::from_document(&doc! {
            "$inc": { "counter": 41, "visits": 1 },
            "$pull": { "tags": "bar", "scores": { "$gte": 6 } },
            "$set": { "name.last": "Bar", "address.city": "Berlin" },
            "$unset": { "name.first": "" },
        })
        .unwrap()
        .apply_to(&mut document)
        .unwrap();

        assert_eq!(
            document,
            doc! {
                "_id": 1,
                "counter": 42,
                "tags": ["foo", "baz"],
                "scores": [3],
                "name": { "last": "Bar" },
                "address": { "city": "Berlin" },
                "visits": 1,
            },
        );
    }

    #[test]
    fn apply_is_atomic() {
        let original = doc! { "_id": 1, "counter": "text", "n": 1 };
        let mut document = original.clone();

        let result = Update::from_document(&doc! { "$inc": { "n": 1, "counter": 1 } })
            .unwrap()
            .apply_to(&mut document);

        assert!(matches!(result, Err(OperatorError::TypeMismatch { .. })));
        assert_eq!(document, original);

        let result = Update::from_document(&doc! { "$set": { "_id": 2 } })
            .unwrap()
            .apply_to(&mut document);
        assert!(matches!(result, Err(OperatorError::ImmutableField(_))));
    }

    #[test]
    fn local_effects() {
        let path = FieldPath::new("v");

        let mut slot = None;
        UpdateOp::Inc(bson!(1)).apply(&mut slot, &path).unwrap();
        assert_eq!(slot, Some(bson!(1)));

        let mut slot = None;
        UpdateOp::Push(vec![bson!("foo")]).apply(&mut slot, &path).unwrap();
        assert_eq!(slot, Some(bson!(["foo"])));

        let mut slot = Some(bson!(["foo", "bar", "baz"]));
        UpdateOp::Pop(PopEnd::Last).apply(&mut slot, &path).unwrap();
        assert_eq!(slot, Some(bson!(["foo", "bar"])));
        UpdateOp::Pop(PopEnd::First).apply(&mut slot, &path).unwrap();
        assert_eq!(slot, Some(bson!(["bar"])));

        let mut slot = Some(bson!(["foo", "bar", "baz"]));
        UpdateOp::PullAll(vec![bson!("bar"), bson!("baz")]).apply(&mut slot, &path).unwrap();
        assert_eq!(slot, Some(bson!(["foo"])));

        let mut slot = Some(bson!(["a"]));
        UpdateOp::AddToSet(vec![bson!("a"), bson!("b")]).apply(&mut slot, &path).unwrap();
        assert_eq!(slot, Some(bson!(["a", "b"])));

        let mut slot = None;
        UpdateOp::Pop(PopEnd::Last).apply(&mut slot, &path).unwrap();
        assert_eq!(slot, None);

        let mut slot = Some(bson!("text"));
        assert!(UpdateOp::Push(vec![bson!(1)]).apply(&mut slot, &path).is_err());
        assert_eq!(slot, Some(bson!("text")));
    }

    #[test]
    fn array_index_paths() {
        let mut document = doc! { "items": [{ "qty": 1 }, { "qty": 2 }] };

        Update::from_document(&doc! { "$inc": { "items.1.qty": 3 }, "$set": { "items.3": "x" } })
            .unwrap()
            .apply_to(&mut document)
            .unwrap();

        assert_eq!(document, doc! { "items": [{ "qty": 1 }, { "qty": 5 }, null, "x"] });
    }

    #[test]
    fn rejects_indexes_far_past_the_end() {
        let original = doc! { "xs": [1] };
        let mut document = original.clone();

        let result = Update::from_document(&doc! { "$set": { "xs.100000000000": 1 } })
            .unwrap()
            .apply_to(&mut document);

        assert!(matches!(result, Err(OperatorError::InvalidOperand { .. })));
        assert_eq!(document, original);

        let edge = format!("xs.{}", MAX_ARRAY_PADDING + 1);
        Update::from_document(&doc! { "$set": { edge: 2 } })
            .unwrap()
            .apply_to(&mut document)
            .unwrap();

        assert_eq!(document.get_array("xs").unwrap().len(), MAX_ARRAY_PADDING + 2);
    }

    #[test]
    fn overflowing_inc_merge_is_invalid_operand() {
        let mut update = Update::new();
        update.inc("n", i64::MAX).unwrap();

        let err = update.inc("n", 1i64).unwrap_err();

        assert!(matches!(
            &err,
            OperatorError::InvalidOperand { operator, reason }
                if operator == "$inc" && reason.contains("overflows")
        ));
        assert_eq!(update.get(&FieldPath::new("n")), Some(&UpdateOp::Inc(Bson::Int64(i64::MAX))));
    }
}
