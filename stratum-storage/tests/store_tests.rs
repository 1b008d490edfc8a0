//! Tests for the Store contract, run against both bundled stores.

use pretty_assertions::assert_eq;
use serde_json::json;
use stratum_mask::FieldMask;
use stratum_storage::{
    DeleteRequest, FindQuery, FindRequest, LoadRequest, MemoryStore, Record, SaveRequest,
    SqliteStore, StorageError, Store,
};
use stratum_types::{EntityId, SortKey};

fn movie(id: &str, title: &str, year: i64) -> Record {
    let mut record = Record::new("Movie", EntityId::parse(id).unwrap())
        .with_attribute("title", json!(title))
        .with_attribute("year", json!(year))
        .with_attribute(
            "director",
            json!({"_type": "Director", "_id": "d1", "_ref": true}),
        )
        .with_attribute(
            "location",
            json!({"_type": "Address", "_id": format!("a-{id}"), "city": "Paris", "street": "Main"}),
        );
    record.is_new = true;
    record
}

fn reference(id: &str) -> Record {
    Record::reference("Movie", EntityId::parse(id).unwrap())
}

fn lenient_load(fields: FieldMask) -> LoadRequest {
    LoadRequest {
        fields,
        reload: false,
        throw_if_not_found: false,
    }
}

fn stores() -> Vec<Box<dyn Store>> {
    vec![
        Box::new(MemoryStore::new("memory")),
        Box::new(SqliteStore::open_in_memory().unwrap().with_id("sqlite-test")),
    ]
}

async fn seed(store: &dyn Store) {
    store
        .save(
            &[
                movie("m1", "Inception", 2010),
                movie("m2", "Memento", 2000),
                movie("m3", "Tenet", 2020),
            ],
            &SaveRequest::default(),
        )
        .await
        .unwrap();
}

// ── Save ────────────────────────────────────────────────────────

#[tokio::test]
async fn save_returns_stored_records_without_flags() {
    for store in stores() {
        let saved = store
            .save(&[movie("m1", "Inception", 2010)], &SaveRequest::default())
            .await
            .unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!saved[0].is_new);
        assert_eq!(saved[0].attribute("title"), Some(&json!("Inception")));
    }
}

#[tokio::test]
async fn save_merges_into_existing_records() {
    for store in stores() {
        seed(store.as_ref()).await;
        let update = Record::new("Movie", EntityId::parse("m1").unwrap())
            .with_attribute("year", json!(2011));
        let saved = store.save(&[update], &SaveRequest::default()).await.unwrap();

        assert_eq!(saved[0].attribute("title"), Some(&json!("Inception")));
        assert_eq!(saved[0].attribute("year"), Some(&json!(2011)));
    }
}

#[tokio::test]
async fn saving_a_new_record_over_an_existing_one_fails() {
    for store in stores() {
        seed(store.as_ref()).await;
        let err = store
            .save(&[movie("m1", "Other", 1999)], &SaveRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        let lenient = SaveRequest {
            throw_if_already_exists: false,
            ..SaveRequest::default()
        };
        let saved = store.save(&[movie("m1", "Other", 1999)], &lenient).await.unwrap();
        assert_eq!(saved[0].attribute("title"), Some(&json!("Other")));
    }
}

#[tokio::test]
async fn saving_a_missing_existing_record_fails() {
    for store in stores() {
        let update = Record::new("Movie", EntityId::parse("ghost").unwrap())
            .with_attribute("title", json!("Ghost"));
        let err = store
            .save(&[update.clone()], &SaveRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        assert_eq!(err.to_string(), "record not found: Movie(ghost)");

        let lenient = SaveRequest {
            throw_if_not_found: false,
            ..SaveRequest::default()
        };
        assert_eq!(store.save(&[update], &lenient).await.unwrap().len(), 1);
    }
}

#[tokio::test]
async fn failed_save_batch_writes_nothing() {
    for store in stores() {
        seed(store.as_ref()).await;
        let batch = [movie("m4", "Dunkirk", 2017), movie("m1", "Again", 2010)];
        assert!(store.save(&batch, &SaveRequest::default()).await.is_err());

        let loaded = store
            .load(&[reference("m4")], &lenient_load(FieldMask::all()))
            .await
            .unwrap();
        assert_eq!(loaded, vec![None]);
    }
}

// ── Load ────────────────────────────────────────────────────────

#[tokio::test]
async fn load_is_aligned_and_projected() {
    for store in stores() {
        seed(store.as_ref()).await;
        let fields = FieldMask::from_paths(["title", "location.city"]).unwrap();
        let loaded = store
            .load(&[reference("m2"), reference("nope"), reference("m1")], &lenient_load(fields))
            .await
            .unwrap();

        assert_eq!(loaded.len(), 3);
        assert!(loaded[1].is_none());
        assert_eq!(
            loaded[0].as_ref().unwrap().to_value(),
            json!({
                "_type": "Movie",
                "_id": "m2",
                "title": "Memento",
                "location": {"_type": "Address", "_id": "a-m2", "city": "Paris"}
            })
        );
        assert_eq!(loaded[2].as_ref().unwrap().id.as_str(), "m1");
    }
}

#[tokio::test]
async fn load_of_missing_record_fails_by_default() {
    for store in stores() {
        let err = store
            .load(&[reference("nope")], &LoadRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}

#[tokio::test]
async fn identifier_only_load_returns_bare_records() {
    for store in stores() {
        seed(store.as_ref()).await;
        let loaded = store
            .load(&[reference("m1")], &lenient_load(FieldMask::identifier_only()))
            .await
            .unwrap();
        assert_eq!(
            loaded[0].as_ref().unwrap().to_value(),
            json!({"_type": "Movie", "_id": "m1"})
        );
    }
}

// ── Delete ──────────────────────────────────────────────────────

#[tokio::test]
async fn delete_removes_records() {
    for store in stores() {
        seed(store.as_ref()).await;
        store
            .delete(&[reference("m1")], &DeleteRequest::default())
            .await
            .unwrap();

        let loaded = store
            .load(&[reference("m1")], &lenient_load(FieldMask::all()))
            .await
            .unwrap();
        assert_eq!(loaded, vec![None]);

        let err = store
            .delete(&[reference("m1")], &DeleteRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
        store
            .delete(
                &[reference("m1")],
                &DeleteRequest {
                    throw_if_not_found: false,
                },
            )
            .await
            .unwrap();
    }
}

// ── Find ────────────────────────────────────────────────────────

fn ids(records: &[Record]) -> Vec<&str> {
    records.iter().map(|r| r.id.as_str()).collect()
}

#[tokio::test]
async fn find_filters_sorts_and_paginates() {
    for store in stores() {
        seed(store.as_ref()).await;

        let all = store
            .find(
                &FindQuery::new("Movie"),
                &FindRequest {
                    sort: vec![SortKey::descending("year")],
                    ..FindRequest::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(ids(&all), vec!["m3", "m1", "m2"]);

        let page = store
            .find(
                &FindQuery::new("Movie"),
                &FindRequest {
                    sort: vec![SortKey::ascending("title")],
                    skip: Some(1),
                    limit: Some(1),
                    fields: FieldMask::from_paths(["title"]).unwrap(),
                },
            )
            .await
            .unwrap();
        assert_eq!(
            page.iter().map(Record::to_value).collect::<Vec<_>>(),
            vec![json!({"_type": "Movie", "_id": "m2", "title": "Memento"})]
        );

        let filtered = store
            .find(
                &FindQuery::new("Movie").filter("year", json!(2020)),
                &FindRequest::default(),
            )
            .await
            .unwrap();
        assert_eq!(ids(&filtered), vec!["m3"]);
    }
}

#[tokio::test]
async fn find_matches_references_by_identity() {
    for store in stores() {
        seed(store.as_ref()).await;
        let query = FindQuery::new("Movie")
            .filter("director", json!({"_type": "Director", "_id": "d1"}));
        let found = store.find(&query, &FindRequest::default()).await.unwrap();
        assert_eq!(found.len(), 3);

        let none = store
            .find(&FindQuery::new("Director"), &FindRequest::default())
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}

// ── Backend specifics ───────────────────────────────────────────

#[tokio::test]
async fn store_ids() {
    let stores = stores();
    assert_eq!(stores[0].id(), "memory");
    assert_eq!(stores[1].id(), "sqlite-test");
}

#[tokio::test]
async fn sqlite_store_persists_across_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("records.db");

    {
        let store = SqliteStore::open(&path).unwrap();
        seed(&store).await;
    }

    let store = SqliteStore::open(&path).unwrap();
    let loaded = store
        .load(&[reference("m3")], &LoadRequest::default())
        .await
        .unwrap();
    assert_eq!(
        loaded[0].as_ref().unwrap().attribute("title"),
        Some(&json!("Tenet"))
    );
}

#[tokio::test]
async fn memory_store_exposes_raw_records() {
    let store = MemoryStore::new("memory");
    assert!(store.is_empty());
    seed(&store).await;
    assert_eq!(store.len(), 3);
    let raw = store
        .get("Movie", &EntityId::parse("m1").unwrap())
        .unwrap();
    assert_eq!(raw.attribute("year"), Some(&json!(2010)));
}
