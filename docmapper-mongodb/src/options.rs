//! Translation of mapper collection options into driver options.

use docmapper_core::{
    error::{StoreError, StoreResult},
    options::{
        Acknowledgment, CollectionOptions, FindOptions, ReadConcern, ReadPreference, WriteConcern,
    },
};
use mongodb::options::{
    Acknowledgment as MongoAcknowledgment, CollectionOptions as MongoCollectionOptions,
    FindOptions as MongoFindOptions, ReadConcern as MongoReadConcern, ReadPreference as MongoReadPreference, SelectionCriteria,
    WriteConcern as MongoWriteConcern,
};

/// Builds the driver's collection options from the ones a mapper carries.
pub fn collection_options(options: &CollectionOptions) -> MongoCollectionOptions {
    let mut translated = MongoCollectionOptions::default();

    translated.read_concern = options.read_concern.map(read_concern);
    translated.write_concern = options.write_concern.map(write_concern);
    translated.selection_criteria = options
        .read_preference
        .map(|preference| SelectionCriteria::ReadPreference(read_preference(preference)));

    translated
}

/// Builds the driver's find options.
///
/// # Errors
///
/// Returns [`StoreError::InvalidDocument`] if the limit does not fit the driver's signed limit.
pub fn find_options(options: &FindOptions) -> StoreResult<MongoFindOptions> {
    let mut translated = MongoFindOptions::default();

    if let Some(limit) = options.limit {
        let limit = i64::try_from(limit)
            .map_err(|_| StoreError::InvalidDocument(format!("limit {limit} is out of range")))?;
        translated.limit = Some(limit);
    }
    translated.skip = options.offset;
    translated.sort = options.sort_document();

    Ok(translated)
}

pub fn read_concern(concern: ReadConcern) -> MongoReadConcern {
    match concern {
        ReadConcern::Local => MongoReadConcern::local(),
        ReadConcern::Available => MongoReadConcern::available(),
        ReadConcern::Majority => MongoReadConcern::majority(),
        ReadConcern::Linearizable => MongoReadConcern::linearizable(),
        ReadConcern::Snapshot => MongoReadConcern::snapshot(),
    }
}

pub fn write_concern(concern: WriteConcern) -> MongoWriteConcern {
    let mut translated = MongoWriteConcern::default();

    translated.w = Some(match concern.acknowledgment {
        Acknowledgment::Unacknowledged => MongoAcknowledgment::Nodes(0),
        Acknowledgment::Nodes(nodes) => MongoAcknowledgment::Nodes(nodes),
        Acknowledgment::Majority => MongoAcknowledgment::Majority,
    });
    translated.journal = concern.journal;

    translated
}

pub fn read_preference(preference: ReadPreference) -> MongoReadPreference {
    match preference {
        ReadPreference::Primary => MongoReadPreference::Primary,
        ReadPreference::PrimaryPreferred => MongoReadPreference::PrimaryPreferred { options: None },
        ReadPreference::Secondary => MongoReadPreference::Secondary { options: None },
        ReadPreference::SecondaryPreferred => MongoReadPreference::SecondaryPreferred { options: None },
        ReadPreference::Nearest => MongoReadPreference::Nearest { options: None },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::options::ReadConcernLevel;

    #[test]
    fn empty_options_translate_to_driver_defaults() {
        let translated = collection_options(&CollectionOptions::new());

        assert!(translated.read_concern.is_none());
        assert!(translated.write_concern.is_none());
        assert!(translated.selection_criteria.is_none());
    }

    #[test]
    fn translates_every_option() {
        let options = CollectionOptions::new()
            .with_read_concern(ReadConcern::Majority)
            .with_write_concern(WriteConcern::new(Acknowledgment::Nodes(2)).with_journal(true))
            .with_read_preference(ReadPreference::Nearest);

        let translated = collection_options(&options);

        assert_eq!(
            translated.read_concern.map(|concern| concern.level),
            Some(ReadConcernLevel::Majority),
        );

        let write = translated.write_concern.unwrap();
        assert_eq!(write.w, Some(MongoAcknowledgment::Nodes(2)));
        assert_eq!(write.journal, Some(true));

        assert!(matches!(
            translated.selection_criteria,
            Some(SelectionCriteria::ReadPreference(MongoReadPreference::Nearest { .. })),
        ));
    }

    #[test]
    fn translates_find_options() {
        let options = FindOptions::builder()
            .sort("count", docmapper_core::options::SortDirection::Desc)
            .offset(5)
            .limit(10)
            .build();

        let translated = find_options(&options).unwrap();

        assert_eq!(translated.limit, Some(10));
        assert_eq!(translated.skip, Some(5));
        assert_eq!(translated.sort, Some(bson::doc! { "count": -1 }));

        let unbounded = find_options(&FindOptions::default()).unwrap();
        assert!(unbounded.limit.is_none());
        assert!(unbounded.sort.is_none());
    }

    #[test]
    fn rejects_limits_past_the_signed_range() {
        let options = FindOptions::builder().limit(u64::MAX).build();

        assert!(matches!(find_options(&options), Err(StoreError::InvalidDocument(_))));
        assert!(find_options(&FindOptions::builder().limit(i64::MAX as u64).build()).is_ok());
    }

    #[test]
    fn unacknowledged_writes_request_zero_nodes() {
        let write = write_concern(WriteConcern::new(Acknowledgment::Unacknowledged));

        assert_eq!(write.w, Some(MongoAcknowledgment::Nodes(0)));
        assert_eq!(write.journal, None);
    }
}
