//! Query and collection-level options.
//!
//! - [`FindOptions`] - pagination and sorting for `find`
//! - [`CollectionOptions`] - read concern, write concern and read preference a mapper
//!   applies to every call against its collection

use bson::{Document, doc};

/// Sort direction for a single sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    /// The numeric form used in sort documents.
    pub fn as_i32(&self) -> i32 {
        match self {
            SortDirection::Asc => 1,
            SortDirection::Desc => -1,
        }
    }
}

/// Options for a `find` call.
///
/// # Example
///
/// ```ignore
/// let options = FindOptions::builder()
///     .sort("age", SortDirection::Desc)
///     .offset(10)
///     .limit(10)
///     .build();
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindOptions {
    pub limit: Option<u64>,
    pub offset: Option<u64>,
    pub sort: Vec<(String, SortDirection)>,
}

impl FindOptions {
    pub fn builder() -> FindOptionsBuilder {
        FindOptionsBuilder::default()
    }

    /// The sort keys as a sort document, or `None` if unsorted.
    pub fn sort_document(&self) -> Option<Document> {
        if self.sort.is_empty() {
            return None;
        }

        Some(
            self.sort
                .iter()
                .map(|(field, direction)| (field.clone(), direction.as_i32().into()))
                .collect(),
        )
    }
}

/// Builder for [`FindOptions`].
#[derive(Debug, Clone, Default)]
pub struct FindOptionsBuilder {
    options: FindOptions,
}

impl FindOptionsBuilder {
    /// Sets the maximum number of records returned.
    pub fn limit(mut self, limit: u64) -> Self {
        self.options.limit = Some(limit);
        self
    }

    /// Sets the number of matching records skipped.
    pub fn offset(mut self, offset: u64) -> Self {
        self.options.offset = Some(offset);
        self
    }

    /// Appends a sort key. Earlier keys take precedence.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.options.sort.push((field.into(), direction));
        self
    }

    pub fn build(self) -> FindOptions {
        self.options
    }
}

/// Isolation level for reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadConcern {
    Local,
    Available,
    Majority,
    Linearizable,
    Snapshot,
}

/// How many nodes must acknowledge a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acknowledgment {
    Unacknowledged,
    Nodes(u32),
    Majority,
}

/// Durability requirements for writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteConcern {
    pub acknowledgment: Acknowledgment,
    pub journal: Option<bool>,
}

impl WriteConcern {
    pub fn new(acknowledgment: Acknowledgment) -> Self {
        Self { acknowledgment, journal: None }
    }

    pub fn majority() -> Self {
        Self::new(Acknowledgment::Majority)
    }

    /// Requires the write to reach the on-disk journal.
    pub fn with_journal(mut self, journal: bool) -> Self {
        self.journal = Some(journal);
        self
    }
}

/// Which members of a replicated store may serve reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadPreference {
    Primary,
    PrimaryPreferred,
    Secondary,
    SecondaryPreferred,
    Nearest,
}

/// Collection-level options carried by a mapper.
///
/// Backends without replication accept and ignore them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionOptions {
    pub read_concern: Option<ReadConcern>,
    pub write_concern: Option<WriteConcern>,
    pub read_preference: Option<ReadPreference>,
}

impl CollectionOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_read_concern(mut self, read_concern: ReadConcern) -> Self {
        self.read_concern = Some(read_concern);
        self
    }

    pub fn with_write_concern(mut self, write_concern: WriteConcern) -> Self {
        self.write_concern = Some(write_concern);
        self
    }

    pub fn with_read_preference(mut self, read_preference: ReadPreference) -> Self {
        self.read_preference = Some(read_preference);
        self
    }

    /// Returns `self` with every option set in `other` taking precedence.
    pub fn merge(self, other: CollectionOptions) -> Self {
        Self {
            read_concern: other.read_concern.or(self.read_concern),
            write_concern: other.write_concern.or(self.write_concern),
            read_preference: other.read_preference.or(self.read_preference),
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &CollectionOptions::default()
    }
}

/// Addresses one collection of a backend, together with the options to apply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRef {
    pub name: String,
    pub options: CollectionOptions,
}

impl CollectionRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: CollectionOptions::default(),
        }
    }

    pub fn with_options(mut self, options: CollectionOptions) -> Self {
        self.options = options;
        self
    }
}

/// The filter addressing a single record by identity.
pub(crate) fn id_filter(id: &bson::Bson) -> Document {
    doc! { "_id": id.clone() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_find_options() {
        let options = FindOptions::builder()
            .sort("age", SortDirection::Desc)
            .sort("name", SortDirection::Asc)
            .offset(5)
            .limit(10)
            .build();

        assert_eq!(options.limit, Some(10));
        assert_eq!(options.offset, Some(5));
        assert_eq!(options.sort_document(), Some(doc! { "age": -1, "name": 1 }));
        assert_eq!(FindOptions::default().sort_document(), None);
    }

    #[test]
    fn merge_prefers_newer_options() {
        let base = CollectionOptions::new()
            .with_read_concern(ReadConcern::Local)
            .with_read_preference(ReadPreference::Primary);
        let merged = base.merge(
            CollectionOptions::new()
                .with_read_concern(ReadConcern::Majority)
                .with_write_concern(WriteConcern::majority().with_journal(true)),
        );

        assert_eq!(merged.read_concern, Some(ReadConcern::Majority));
        assert_eq!(merged.read_preference, Some(ReadPreference::Primary));
        assert_eq!(
            merged.write_concern,
            Some(WriteConcern { acknowledgment: Acknowledgment::Majority, journal: Some(true) }),
        );
        assert!(CollectionOptions::new().is_empty());
        assert!(!merged.is_empty());
    }
}
