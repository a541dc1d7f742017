//! Value comparison and navigation helpers shared by the update and filter engines.

use bson::{Bson, Document, datetime::DateTime};
use std::cmp::Ordering;

/// Type-erased, comparable representation of BSON values.
///
/// Integers and doubles compare by numeric value regardless of width, the way the
/// store compares them. Types without a natural order fall back to plain BSON equality.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    DateTime(DateTime),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    /// Field order is significant, as it is for embedded document equality in the store.
    Map(Vec<(&'a str, Comparable<'a>)>),
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Int(*value as i64),
            Bson::Int64(value) => Comparable::Int(*value),
            Bson::Double(value) => Comparable::Double(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<Vec<_>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Int(a), Comparable::Int(b)) => a == b,
            (Comparable::Double(a), Comparable::Double(b)) => a == b,
            (Comparable::Int(a), Comparable::Double(b)) | (Comparable::Double(b), Comparable::Int(a)) => {
                (*a as f64) == *b
            },
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Int(b)) => a.partial_cmp(b),
            (Comparable::Double(a), Comparable::Double(b)) => a.partial_cmp(b),
            (Comparable::Int(a), Comparable::Double(b)) => (*a as f64).partial_cmp(b),
            (Comparable::Double(a), Comparable::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Equality with the store's numeric semantics (`1 == 1.0`).
pub(crate) fn values_equal(left: &Bson, right: &Bson) -> bool {
    Comparable::from(left) == Comparable::from(right)
}

pub(crate) fn is_number(value: &Bson) -> bool {
    matches!(value, Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_))
}

/// Adds two numeric values, keeping integer width where possible.
///
/// Two int32 values widen to int64 on overflow; any double produces a double.
/// Returns `None` for non-numeric operands or int64 overflow.
pub(crate) fn add_numbers(left: &Bson, right: &Bson) -> Option<Bson> {
    match (left, right) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(
            a.checked_add(*b)
                .map(Bson::Int32)
                .unwrap_or(Bson::Int64(*a as i64 + *b as i64))
        ),
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            as_i64(left)?
                .checked_add(as_i64(right)?)
                .map(Bson::Int64)
        },
        (Bson::Double(_), _) | (_, Bson::Double(_)) => Some(Bson::Double(as_f64(left)? + as_f64(right)?)),
        _ => None,
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(v) => Some(*v as i64),
        Bson::Int64(v) => Some(*v),
        _ => None,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

/// Follows `segments` through embedded documents and array indexes.
pub(crate) fn lookup<'a>(value: &'a Bson, segments: &[String]) -> Option<&'a Bson> {
    let Some((head, rest)) = segments.split_first() else {
        return Some(value);
    };

    match value {
        Bson::Document(doc) => lookup(doc.get(head)?, rest),
        Bson::Array(items) => lookup(items.get(head.parse::<usize>().ok()?)?, rest),
        _ => None,
    }
}

/// Collects every value reachable at `segments`, fanning out over arrays of documents
/// the way filter paths do.
pub(crate) fn resolve<'a>(document: &'a Document, segments: &[String]) -> Vec<&'a Bson> {
    let mut out = Vec::new();

    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = document.get(head) {
            collect(value, rest, &mut out);
        }
    }

    out
}

fn collect<'a>(value: &'a Bson, segments: &[String], out: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        out.push(value);
        return;
    };

    match value {
        Bson::Document(doc) => {
            if let Some(inner) = doc.get(head) {
                collect(inner, rest, out);
            }
        },
        Bson::Array(items) => match head.parse::<usize>() {
            Ok(index) => {
                if let Some(item) = items.get(index) {
                    collect(item, rest, out);
                }
            },
            Err(_) => {
                for item in items.iter().filter(|item| matches!(item, Bson::Document(_))) {
                    collect(item, segments, out);
                }
            },
        },
        _ => {},
    }
}

#[cfg(test)]
mod tests {
    use bson::{bson, doc};

    use super::*;

    #[test]
    fn numeric_equality_ignores_width() {
        assert!(values_equal(&Bson::Int32(1), &Bson::Double(1.0)));
        assert!(values_equal(&Bson::Int64(7), &Bson::Int32(7)));
        assert!(!values_equal(&Bson::Int32(1), &Bson::String("1".into())));
        assert!(values_equal(&bson!({ "a": 1 }), &bson!({ "a": 1.0 })));
        assert!(!values_equal(&bson!({ "a": 1, "b": 2 }), &bson!({ "b": 2, "a": 1 })));
    }

    #[test]
    fn add_keeps_width() {
        assert_eq!(add_numbers(&Bson::Int32(1), &Bson::Int32(2)), Some(Bson::Int32(3)));
        assert_eq!(add_numbers(&Bson::Int32(i32::MAX), &Bson::Int32(1)), Some(Bson::Int64(i32::MAX as i64 + 1)));
        assert_eq!(add_numbers(&Bson::Int64(1), &Bson::Int32(2)), Some(Bson::Int64(3)));
        assert_eq!(add_numbers(&Bson::Int32(1), &Bson::Double(0.5)), Some(Bson::Double(1.5)));
        assert_eq!(add_numbers(&Bson::Int64(i64::MAX), &Bson::Int32(1)), None);
        assert_eq!(add_numbers(&Bson::String("a".into()), &Bson::Int32(1)), None);
    }

    #[test]
    fn resolve_fans_out_over_arrays() {
        let document = doc! {
            "tags": ["a", "b"],
            "items": [{ "sku": 1 }, { "sku": 2 }, 3],
        };

        assert_eq!(resolve(&document, &["tags".to_string()]).len(), 1);
        assert_eq!(
            resolve(&document, &["items".to_string(), "sku".to_string()]),
            vec![&Bson::Int32(1), &Bson::Int32(2)],
        );
        assert_eq!(
            lookup(&Bson::Document(document), &["items".to_string(), "1".to_string(), "sku".to_string()]),
            Some(&Bson::Int32(2)),
        );
    }
}
