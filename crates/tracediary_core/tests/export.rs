use std::sync::Arc;

use chrono::NaiveDate;
use tracediary_core::{DiaryProviding, DiaryStoring, FixedDateProvider, SqliteDiaryStore};

#[test]
fn empty_store_exports_headers_only() {
    let store = fixed_store(date(2024, 1, 24));

    assert_eq!(
        store.export().unwrap(),
        "# tracediary export v1\n# generated 2024-01-24\n"
    );
}

#[test]
fn export_is_stable_byte_for_byte() {
    let store = fixed_store(date(2024, 1, 24));

    let alice = store.add_contact_person("Alice").unwrap();
    let bob = store.add_contact_person("bob").unwrap();
    let bakery = store.add_location("Busy Bakery").unwrap();

    store
        .add_contact_person_encounter(bob, date(2024, 1, 24))
        .unwrap();
    store
        .add_contact_person_encounter(alice, date(2024, 1, 24))
        .unwrap();
    store.add_location_visit(bakery, date(2024, 1, 24)).unwrap();
    store
        .add_contact_person_encounter(alice, date(2024, 1, 23))
        .unwrap();

    // Newest date first; persons before locations within a date; names
    // ordered case-insensitively.
    assert_eq!(
        store.export().unwrap(),
        "# tracediary export v1\n\
         # generated 2024-01-24\n\
         2024-01-24 person Alice\n\
         2024-01-24 person bob\n\
         2024-01-24 location Busy Bakery\n\
         2024-01-23 person Alice\n"
    );
}

#[test]
fn export_includes_entries_beyond_the_visible_window() {
    let store = fixed_store(date(2024, 1, 24));

    let person = store.add_contact_person("Alice").unwrap();
    // One day older than the oldest visible date (2024-01-10), still
    // inside retention.
    store
        .add_contact_person_encounter(person, date(2024, 1, 9))
        .unwrap();

    let export = store.export().unwrap();
    assert!(export.contains("2024-01-09 person Alice\n"));
}

#[test]
fn export_flattens_multi_line_names() {
    let store = fixed_store(date(2024, 1, 24));

    let person = store.add_contact_person("Ali\nce").unwrap();
    store
        .add_contact_person_encounter(person, date(2024, 1, 24))
        .unwrap();

    let export = store.export().unwrap();
    assert!(export.contains("2024-01-24 person Ali ce\n"));
    assert_eq!(export.lines().count(), 3);
}

#[test]
fn persons_without_dated_entries_produce_no_lines() {
    let store = fixed_store(date(2024, 1, 24));

    store.add_contact_person("Alice").unwrap();
    store.add_location("Busy Bakery").unwrap();

    assert_eq!(
        store.export().unwrap(),
        "# tracediary export v1\n# generated 2024-01-24\n"
    );
}

fn fixed_store(today: NaiveDate) -> SqliteDiaryStore {
    SqliteDiaryStore::open_in_memory_with_date_provider(Arc::new(FixedDateProvider::new(today)))
        .unwrap()
}

fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}
