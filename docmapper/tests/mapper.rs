use docmapper::{
    memory::InMemoryStore,
    prelude::*,
};
use futures::StreamExt;

#[derive(ModelSchema)]
#[field(name)]
#[field(count, default = 0)]
struct AuditEntry;

async fn store() -> Store {
    Store::new(InMemoryStore::builder().build().await.unwrap())
}

async fn seeded() -> Mapper<AuditEntry> {
    let entries = store().await.mapper::<AuditEntry>();

    entries
        .insert_many(vec![
            doc! { "_id": 1, "name": "a", "count": 1 },
            doc! { "_id": 2, "name": "b", "count": 2 },
            doc! { "_id": 3, "name": "c", "count": 3 },
        ])
        .await
        .unwrap();

    entries
}

fn names(models: &[Model<AuditEntry>]) -> Vec<&str> {
    models
        .iter()
        .filter_map(|model| model.field("name").ok()?.value()?.as_str())
        .collect()
}

#[tokio::test]
async fn collection_defaults_to_snake_case_type_name() {
    let store = store().await;

    assert_eq!(store.mapper::<AuditEntry>().collection().name, "audit_entry");
    assert_eq!(store.mapper_for::<AuditEntry>("archive").collection().name, "archive");
}

#[tokio::test]
async fn find_streams_matching_models() {
    let entries = seeded().await;

    let found = entries
        .find(doc! { "count": { "$gte": 2 } })
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(names(&found), vec!["b", "c"]);
    assert!(found.iter().all(|model| model.mapper().is_some()));

    let mut cursor = entries.find(doc! {}).await.unwrap();
    assert_eq!(cursor.next().await.unwrap().unwrap().id(), Some(&Bson::Int32(1)));
    assert_eq!(cursor.nth(1).await.unwrap().unwrap().id(), Some(&Bson::Int32(3)));
    assert!(cursor.next().await.unwrap().is_none());

    let streamed = entries
        .find(doc! {})
        .await
        .unwrap()
        .count()
        .await;
    assert_eq!(streamed, 3);
}

#[tokio::test]
async fn find_with_sorts_and_paginates() {
    let entries = seeded().await;

    let options = FindOptions::builder()
        .sort("count", SortDirection::Desc)
        .offset(1)
        .limit(5)
        .build();
    let found = entries
        .find_with(doc! {}, options)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap();

    assert_eq!(names(&found), vec!["b", "a"]);
}

#[tokio::test]
async fn find_one_by_identity_or_filter() {
    let entries = seeded().await;

    let by_id = entries.find_one(2).await.unwrap().unwrap();
    assert_eq!(by_id.field("name").unwrap().value(), Some(&Bson::String("b".to_string())));

    let by_filter = entries.find_one(doc! { "name": "c" }).await.unwrap().unwrap();
    assert_eq!(by_filter.id(), Some(&Bson::Int32(3)));

    assert!(entries.find_one(99).await.unwrap().is_none());
    assert!(entries.find_one(doc! { "name": "z" }).await.unwrap().is_none());
}

#[tokio::test]
async fn found_models_save_partial_updates() {
    let entries = seeded().await;

    let mut entry = entries.find_one(1).await.unwrap().unwrap();
    entry.field_mut("count").unwrap().inc(10).unwrap();
    entry.save().await.unwrap();

    let raw = entries
        .backend()
        .find_one(entries.collection(), doc! { "_id": 1 })
        .await
        .unwrap();

    assert_eq!(raw, Some(doc! { "_id": 1, "name": "a", "count": 11 }));
}

#[tokio::test]
async fn wrapped_records_skip_defaults() {
    let entries = store().await.mapper::<AuditEntry>();

    let mut entry = entries.wrap(doc! { "_id": 5, "name": "wrapped" });
    assert_eq!(entry.id(), Some(&Bson::Int32(5)));
    assert!(entry.field("count").unwrap().value().is_none());

    // Saving a wrapped record updates by identity and never inserts
    entry.set("name", "renamed").unwrap();
    entry.save().await.unwrap();
    assert_eq!(entries.count_documents(doc! {}).await.unwrap(), 0);

    let mut fresh = entries.create_empty();
    assert!(fresh.id().is_none());
    assert_eq!(fresh.get("count").await.unwrap(), &Bson::Int32(0));
    assert!(matches!(fresh.get("name").await, Err(ModelError::UndefinedField(_))));
}

#[tokio::test]
async fn pass_through_operations() {
    let entries = seeded().await;

    let outcome = entries
        .update_many(doc! { "count": { "$lt": 3 } }, doc! { "$inc": { "count": 1 } })
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome { matched: 2, modified: 2 });

    let outcome = entries
        .update_one(doc! { "_id": 42 }, doc! { "$set": { "name": "nobody" } })
        .await
        .unwrap();
    assert_eq!(outcome, UpdateOutcome::default());

    assert_eq!(entries.count_documents(doc! { "count": 3 }).await.unwrap(), 2);
    assert_eq!(entries.delete_many(doc! { "count": 3 }).await.unwrap(), 2);
    assert_eq!(entries.count_documents(doc! {}).await.unwrap(), 1);

    entries.drop().await.unwrap();
    assert_eq!(entries.count_documents(doc! {}).await.unwrap(), 0);
}

#[tokio::test]
async fn options_are_carried_by_derived_mappers() {
    let entries = seeded().await;

    let majority = entries.with_options(
        CollectionOptions::new()
            .with_read_concern(ReadConcern::Majority)
            .with_write_concern(WriteConcern::majority()),
    );
    let nearest = majority.with_options(CollectionOptions::new().with_read_preference(ReadPreference::Nearest));

    assert!(entries.collection().options.is_empty());
    assert_eq!(nearest.collection().name, entries.collection().name);
    assert_eq!(nearest.collection().options.read_concern, Some(ReadConcern::Majority));
    assert_eq!(nearest.collection().options.write_concern, Some(WriteConcern::majority()));
    assert_eq!(nearest.collection().options.read_preference, Some(ReadPreference::Nearest));

    // Same backend, same collection
    assert_eq!(nearest.count_documents(doc! {}).await.unwrap(), 3);
}
