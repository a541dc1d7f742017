//! Evaluation of store-style filter documents against in-memory documents.
//!
//! Filters use the same shape the store accepts on the wire:
//!
//! ```ignore
//! doc! { "name": "Alice", "age": { "$gte": 18 }, "$or": [{ "tags": "admin" }, { "tags": "owner" }] }
//! ```
//!
//! Supported operators: `$and`, `$or`, `$nor` at the top level and `$eq`, `$ne`, `$gt`,
//! `$gte`, `$lt`, `$lte`, `$in`, `$nin`, `$exists`, `$not`, `$size`, `$all` on fields.
//! A field condition that is not an operator document is an equality match, which also
//! matches arrays containing the value. Paths are dot-joined and fan out over arrays of
//! embedded documents.
//!
//! [`sort_documents`] orders query results the way the store does.

use bson::{Bson, Document};
use std::cmp::Ordering;

use crate::{
    error::OperatorError,
    options::SortDirection,
    path::FieldPath,
    value::{Comparable, lookup, resolve, values_equal},
};

/// Matches documents against a filter document.
#[derive(Debug, Clone, Copy)]
pub struct FilterEvaluator<'a> {
    filter: &'a Document,
}

impl<'a> FilterEvaluator<'a> {
    pub fn new(filter: &'a Document) -> Self {
        Self { filter }
    }

    /// Returns `true` if `document` satisfies every condition of the filter.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError`] for unknown operators or malformed operands.
    pub fn matches(&self, document: &Document) -> Result<bool, OperatorError> {
        matches_document(document, self.filter)
    }

    /// Returns clones of the documents that satisfy the filter, preserving order.
    pub fn filter_documents<'b>(
        &self,
        documents: impl IntoIterator<Item = &'b Document>,
    ) -> Result<Vec<Document>, OperatorError> {
        let mut matched = Vec::new();

        for document in documents {
            if self.matches(document)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }
}

fn matches_document(document: &Document, filter: &Document) -> Result<bool, OperatorError> {
    for (key, condition) in filter {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for clause in clauses(condition, key)? {
                    if !matches_document(document, clause)? {
                        all = false;
                        break;
                    }
                }
                all
            },
            "$or" => any_clause(document, condition, key)?,
            "$nor" => !any_clause(document, condition, key)?,
            operator if operator.starts_with('$') => {
                return Err(OperatorError::UnknownOperator(operator.to_string()));
            },
            path => field_matches(
                &resolve(document, FieldPath::parse(path).segments()),
                condition,
            )?,
        };

        if !matched {
            return Ok(false);
        }
    }

    Ok(true)
}

fn any_clause(document: &Document, condition: &Bson, operator: &str) -> Result<bool, OperatorError> {
    for clause in clauses(condition, operator)? {
        if matches_document(document, clause)? {
            return Ok(true);
        }
    }

    Ok(false)
}

fn clauses<'a>(condition: &'a Bson, operator: &str) -> Result<Vec<&'a Document>, OperatorError> {
    let invalid = || OperatorError::InvalidOperand {
        operator: operator.to_string(),
        reason: "expected an array of documents".to_string(),
    };

    condition
        .as_array()
        .ok_or_else(invalid)?
        .iter()
        .map(|clause| clause.as_document().ok_or_else(invalid))
        .collect()
}

pub(crate) fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

/// Evaluates a field condition against every value found at the field's path.
pub(crate) fn field_matches(values: &[&Bson], condition: &Bson) -> Result<bool, OperatorError> {
    match condition {
        Bson::Document(operators) if is_operator_document(operators) => {
            for (operator, operand) in operators {
                if !operator_matches(values, operator, operand)? {
                    return Ok(false);
                }
            }
            Ok(true)
        },
        _ => Ok(equals_any(values, condition)),
    }
}

/// Decides whether a single array element is removed by a `$pull` condition.
pub(crate) fn element_matches(element: &Bson, condition: &Bson) -> Result<bool, OperatorError> {
    match condition {
        Bson::Document(operators) if is_operator_document(operators) => field_matches(&[element], condition),
        Bson::Document(query) => match element {
            Bson::Document(inner) => matches_document(inner, query),
            _ => Ok(false),
        },
        _ => Ok(values_equal(element, condition)),
    }
}

fn equals_any(values: &[&Bson], target: &Bson) -> bool {
    // A missing field matches an equality test against null
    if values.is_empty() {
        return matches!(target, Bson::Null);
    }

    values.iter().any(|value| {
        values_equal(value, target)
            || matches!(value, Bson::Array(items) if items.iter().any(|item| values_equal(item, target)))
    })
}

fn compare_any(values: &[&Bson], operand: &Bson, accept: fn(Ordering) -> bool) -> bool {
    let right = Comparable::from(operand);

    values
        .iter()
        .flat_map(|value| match value {
            Bson::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![*other],
        })
        .any(|value| {
            Comparable::from(value)
                .partial_cmp(&right)
                .is_some_and(accept)
        })
}

fn operand_array<'a>(operator: &str, operand: &'a Bson) -> Result<&'a Vec<Bson>, OperatorError> {
    operand
        .as_array()
        .ok_or_else(|| OperatorError::InvalidOperand {
            operator: operator.to_string(),
            reason: "expected an array".to_string(),
        })
}

fn operator_matches(values: &[&Bson], operator: &str, operand: &Bson) -> Result<bool, OperatorError> {
    match operator {
        "$eq" => Ok(equals_any(values, operand)),
        "$ne" => Ok(!equals_any(values, operand)),
        "$gt" => Ok(compare_any(values, operand, |o| o == Ordering::Greater)),
        "$gte" => Ok(compare_any(values, operand, |o| o != Ordering::Less)),
        "$lt" => Ok(compare_any(values, operand, |o| o == Ordering::Less)),
        "$lte" => Ok(compare_any(values, operand, |o| o != Ordering::Greater)),
        "$in" => Ok(
            operand_array(operator, operand)?
                .iter()
                .any(|candidate| equals_any(values, candidate))
        ),
        "$nin" => Ok(
            !operand_array(operator, operand)?
                .iter()
                .any(|candidate| equals_any(values, candidate))
        ),
        "$all" => Ok(
            operand_array(operator, operand)?
                .iter()
                .all(|candidate| equals_any(values, candidate))
        ),
        "$exists" => {
            let should_exist = match operand {
                Bson::Boolean(flag) => *flag,
                Bson::Int32(n) => *n != 0,
                Bson::Int64(n) => *n != 0,
                Bson::Double(n) => *n != 0.0,
                Bson::Null => false,
                _ => true,
            };
            Ok(values.is_empty() != should_exist)
        },
        "$not" => match operand {
            Bson::Document(inner) if is_operator_document(inner) => Ok(!field_matches(values, operand)?),
            _ => Err(OperatorError::InvalidOperand {
                operator: operator.to_string(),
                reason: "expected an operator document".to_string(),
            }),
        },
        "$size" => {
            let size = match operand {
                Bson::Int32(n) if *n >= 0 => *n as usize,
                Bson::Int64(n) if *n >= 0 => *n as usize,
                _ => {
                    return Err(OperatorError::InvalidOperand {
                        operator: operator.to_string(),
                        reason: "expected a non-negative integer".to_string(),
                    });
                },
            };
            Ok(values.iter().any(|value| matches!(value, Bson::Array(items) if items.len() == size)))
        },
        other => Err(OperatorError::UnknownOperator(other.to_string())),
    }
}

/// Sorts documents by the given keys, earlier keys taking precedence.
///
/// Values of different types order by type (missing and null first, then numbers,
/// strings, documents, arrays, booleans and dates); values of the same type by value.
pub fn sort_documents(documents: &mut [Document], keys: &[(String, SortDirection)]) {
    let keys = keys
        .iter()
        .map(|(field, direction)| (FieldPath::parse(field), *direction))
        .collect::<Vec<_>>();

    documents.sort_by(|a, b| {
        keys.iter()
            .map(|(path, direction)| {
                let ordering = compare_for_sort(sort_value(a, path), sort_value(b, path));
                match direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            })
            .find(|ordering| *ordering != Ordering::Equal)
            .unwrap_or(Ordering::Equal)
    });
}

fn sort_value<'a>(document: &'a Document, path: &FieldPath) -> Option<&'a Bson> {
    let (head, rest) = path.segments().split_first()?;
    lookup(document.get(head)?, rest)
}

fn type_rank(value: Option<&Bson>) -> u8 {
    match value {
        None | Some(Bson::Null | Bson::Undefined) => 0,
        Some(Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_)) => 1,
        Some(Bson::String(_) | Bson::Symbol(_)) => 2,
        Some(Bson::Document(_)) => 3,
        Some(Bson::Array(_)) => 4,
        Some(Bson::Binary(_)) => 5,
        Some(Bson::ObjectId(_)) => 6,
        Some(Bson::Boolean(_)) => 7,
        Some(Bson::DateTime(_)) => 8,
        Some(Bson::Timestamp(_)) => 9,
        Some(_) => 10,
    }
}

fn compare_for_sort(left: Option<&Bson>, right: Option<&Bson>) -> Ordering {
    type_rank(left)
        .cmp(&type_rank(right))
        .then_with(|| match (left, right) {
            (Some(Bson::ObjectId(a)), Some(Bson::ObjectId(b))) => a.cmp(b),
            (Some(a), Some(b)) => Comparable::from(a)
                .partial_cmp(&Comparable::from(b))
                .unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        })
}
