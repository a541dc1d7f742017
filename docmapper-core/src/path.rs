//! Dotted field paths addressing values inside a document.

use std::fmt::{self, Display};

/// A path to a value inside a document, stored as a sequence of segments.
///
/// On the wire a path is dot-joined (`"name.first"`); internally the segments are
/// kept separate so that ancestor and descendant relations are cheap to test.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FieldPath {
    segments: Vec<String>,
}

impl FieldPath {
    /// Creates a single-segment path for a top-level field.
    pub fn new(name: impl Into<String>) -> Self {
        Self { segments: vec![name.into()] }
    }

    /// Parses a dot-joined path.
    pub fn parse(dotted: &str) -> Self {
        Self {
            segments: dotted
                .split('.')
                .map(str::to_string)
                .collect(),
        }
    }

    /// Returns a new path with `key` appended.
    pub fn child(&self, key: impl Into<String>) -> Self {
        let mut segments = self.segments.clone();
        segments.push(key.into());
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// The top-level field name this path starts at.
    pub fn root(&self) -> &str {
        &self.segments[0]
    }

    pub fn len(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Returns `true` if `self` equals `other` or is one of its ancestors.
    pub fn contains(&self, other: &FieldPath) -> bool {
        other.segments.starts_with(&self.segments)
    }

    /// Returns `true` if the two paths address overlapping parts of a document.
    pub fn overlaps(&self, other: &FieldPath) -> bool {
        self.contains(other) || other.contains(self)
    }

    /// The segments below `ancestor`, or `None` if `ancestor` does not contain this path.
    pub fn strip_prefix(&self, ancestor: &FieldPath) -> Option<&[String]> {
        self.segments.strip_prefix(ancestor.segments.as_slice())
    }
}

impl Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

impl From<&str> for FieldPath {
    fn from(dotted: &str) -> Self {
        FieldPath::parse(dotted)
    }
}

impl From<String> for FieldPath {
    fn from(dotted: String) -> Self {
        FieldPath::parse(&dotted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotted_round_trip() {
        let path = FieldPath::parse("name.first");

        assert_eq!(path.len(), 2);
        assert_eq!(path.root(), "name");
        assert_eq!(path.to_string(), "name.first");
        assert_eq!(FieldPath::new("name").child("first"), path);
    }

    #[test]
    fn ancestry() {
        let name = FieldPath::new("name");
        let first = name.child("first");
        let names = FieldPath::new("names");

        assert!(name.contains(&name));
        assert!(name.contains(&first));
        assert!(!first.contains(&name));
        assert!(first.overlaps(&name));
        assert!(!names.overlaps(&name));
        assert_eq!(first.strip_prefix(&name), Some(&["first".to_string()][..]));
        assert_eq!(name.strip_prefix(&first), None);
    }
}
