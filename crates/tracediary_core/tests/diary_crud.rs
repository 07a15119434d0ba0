use std::collections::HashSet;
use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use tracediary_core::db::DbError;
use tracediary_core::{
    DiaryProviding, DiaryStoreError, DiaryStoring, FixedDateProvider, SqliteDiaryStore,
};

#[test]
fn ids_start_at_one_and_increment_per_table() {
    let store = fixed_store(date(2024, 1, 24));

    assert_eq!(store.add_contact_person("Alice").unwrap(), 1);
    assert_eq!(store.add_contact_person("Bob").unwrap(), 2);
    assert_eq!(store.add_location("Busy Bakery").unwrap(), 1);
    assert_eq!(
        store
            .add_contact_person_encounter(1, date(2024, 1, 24))
            .unwrap(),
        1
    );
    assert_eq!(store.add_location_visit(1, date(2024, 1, 24)).unwrap(), 1);
}

#[test]
fn add_and_rename_contact_person_roundtrip() {
    let store = fixed_store(date(2024, 1, 24));

    let id = store.add_contact_person("Alise").unwrap();
    store.update_contact_person(id, "Alice").unwrap();

    let persons = store.contact_persons().unwrap();
    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0].id, id);
    assert_eq!(persons[0].name, "Alice");
}

#[test]
fn add_and_rename_location_roundtrip() {
    let store = fixed_store(date(2024, 1, 24));

    let id = store.add_location("Bakeryy").unwrap();
    store.update_location(id, "Bakery").unwrap();

    let locations = store.locations().unwrap();
    assert_eq!(locations.len(), 1);
    assert_eq!(locations[0].name, "Bakery");
}

#[test]
fn updates_with_absent_ids_fail() {
    let store = fixed_store(date(2024, 1, 24));

    let err = store.update_contact_person(42, "Nobody").unwrap_err();
    assert!(matches!(
        err,
        DiaryStoreError::Database(DbError::RowNotFound {
            table: "contact_person",
            id: 42
        })
    ));

    let err = store.update_location(7, "Nowhere").unwrap_err();
    assert!(matches!(
        err,
        DiaryStoreError::Database(DbError::RowNotFound {
            table: "location",
            id: 7
        })
    ));
}

#[test]
fn removes_with_absent_ids_are_no_ops() {
    let store = fixed_store(date(2024, 1, 24));

    store.remove_contact_person(42).unwrap();
    store.remove_location(42).unwrap();
    store.remove_contact_person_encounter(42).unwrap();
    store.remove_location_visit(42).unwrap();
}

#[test]
fn entries_for_unknown_parents_report_the_foreign_key_code() {
    let store = fixed_store(date(2024, 1, 24));

    let err = store
        .add_contact_person_encounter(999, date(2024, 1, 24))
        .unwrap_err();
    assert_eq!(err.sqlite_error_code(), Some(787));

    let err = store.add_location_visit(999, date(2024, 1, 24)).unwrap_err();
    assert_eq!(err.sqlite_error_code(), Some(787));
}

#[test]
fn removing_a_contact_person_cascades_to_encounters() {
    let store = fixed_store(date(2024, 1, 24));

    let person = store.add_contact_person("Alice").unwrap();
    store
        .add_contact_person_encounter(person, date(2024, 1, 23))
        .unwrap();
    store
        .add_contact_person_encounter(person, date(2024, 1, 24))
        .unwrap();

    store.remove_contact_person(person).unwrap();

    assert!(store.contact_persons().unwrap().is_empty());
    assert!(store.encounters().unwrap().is_empty());
}

#[test]
fn removing_a_location_cascades_to_visits() {
    let store = fixed_store(date(2024, 1, 24));

    let location = store.add_location("Busy Bakery").unwrap();
    store
        .add_location_visit(location, date(2024, 1, 24))
        .unwrap();

    store.remove_location(location).unwrap();

    assert!(store.locations().unwrap().is_empty());
    assert!(store.location_visits().unwrap().is_empty());
}

#[test]
fn removing_one_encounter_leaves_the_others() {
    let store = fixed_store(date(2024, 1, 24));

    let person = store.add_contact_person("Alice").unwrap();
    let first = store
        .add_contact_person_encounter(person, date(2024, 1, 23))
        .unwrap();
    store
        .add_contact_person_encounter(person, date(2024, 1, 24))
        .unwrap();

    store.remove_contact_person_encounter(first).unwrap();

    let encounters = store.encounters().unwrap();
    assert_eq!(encounters.len(), 1);
    assert_eq!(encounters[0].date, date(2024, 1, 24));
}

#[test]
fn remove_all_contact_persons_does_not_touch_locations() {
    let store = fixed_store(date(2024, 1, 24));

    let person = store.add_contact_person("Alice").unwrap();
    store
        .add_contact_person_encounter(person, date(2024, 1, 24))
        .unwrap();
    let location = store.add_location("Busy Bakery").unwrap();
    store
        .add_location_visit(location, date(2024, 1, 24))
        .unwrap();

    store.remove_all_contact_persons().unwrap();

    assert!(store.contact_persons().unwrap().is_empty());
    assert!(store.encounters().unwrap().is_empty());
    assert_eq!(store.locations().unwrap().len(), 1);
    assert_eq!(store.location_visits().unwrap().len(), 1);
}

#[test]
fn remove_all_locations_does_not_touch_contact_persons() {
    let store = fixed_store(date(2024, 1, 24));

    let person = store.add_contact_person("Alice").unwrap();
    store
        .add_contact_person_encounter(person, date(2024, 1, 24))
        .unwrap();
    let location = store.add_location("Busy Bakery").unwrap();
    store
        .add_location_visit(location, date(2024, 1, 24))
        .unwrap();

    store.remove_all_locations().unwrap();

    assert!(store.locations().unwrap().is_empty());
    assert!(store.location_visits().unwrap().is_empty());
    assert_eq!(store.contact_persons().unwrap().len(), 1);
    assert_eq!(store.encounters().unwrap().len(), 1);
}

#[test]
fn reset_clears_all_tables_and_restarts_ids() {
    let store = fixed_store(date(2024, 1, 24));

    let person = store.add_contact_person("Alice").unwrap();
    store
        .add_contact_person_encounter(person, date(2024, 1, 24))
        .unwrap();
    let location = store.add_location("Busy Bakery").unwrap();
    store
        .add_location_visit(location, date(2024, 1, 24))
        .unwrap();

    store.reset().unwrap();

    assert!(store.contact_persons().unwrap().is_empty());
    assert!(store.locations().unwrap().is_empty());
    assert!(store.encounters().unwrap().is_empty());
    assert!(store.location_visits().unwrap().is_empty());
    assert_eq!(store.add_contact_person("Fresh").unwrap(), 1);
    assert_eq!(store.add_location("Fresh").unwrap(), 1);
}

#[test]
fn operations_after_close_fail_with_connection_closed() {
    let store = fixed_store(date(2024, 1, 24));

    store.close();

    let err = store.add_contact_person("Late").unwrap_err();
    assert!(matches!(
        err,
        DiaryStoreError::Database(DbError::ConnectionClosed)
    ));
    let err = store.export().unwrap_err();
    assert!(matches!(
        err,
        DiaryStoreError::Database(DbError::ConnectionClosed)
    ));

    // Second close is a no-op.
    store.close();
}

#[test]
fn retention_constants_are_exposed_through_the_read_surface() {
    let store = fixed_store(date(2024, 1, 24));

    assert_eq!(store.data_retention_period_in_days(), 17);
    assert_eq!(store.user_visible_period_in_days(), 15);
}

#[test]
fn store_reopens_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("diary.db");
    let provider = Arc::new(FixedDateProvider::new(date(2024, 1, 24)));

    {
        let store = SqliteDiaryStore::open_with_date_provider(&path, provider.clone()).unwrap();
        store.add_contact_person("Alice").unwrap();
        store.close();
    }

    let store = SqliteDiaryStore::open_with_date_provider(&path, provider).unwrap();
    let persons = store.contact_persons().unwrap();
    assert_eq!(persons.len(), 1);
    assert_eq!(persons[0].name, "Alice");
}

#[test]
fn concurrent_adds_serialize_without_id_reuse() {
    let store = fixed_store(date(2024, 1, 24));

    thread::scope(|scope| {
        for _ in 0..4 {
            scope.spawn(|| {
                for _ in 0..25 {
                    store.add_contact_person("Concurrent").unwrap();
                }
            });
        }
    });

    let persons = store.contact_persons().unwrap();
    assert_eq!(persons.len(), 100);
    let ids: HashSet<i64> = persons.iter().map(|person| person.id).collect();
    assert_eq!(ids.len(), 100);
}

fn fixed_store(today: NaiveDate) -> SqliteDiaryStore {
    SqliteDiaryStore::open_in_memory_with_date_provider(Arc::new(FixedDateProvider::new(today)))
        .unwrap()
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}
