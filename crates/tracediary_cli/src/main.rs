//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `tracediary_core` linkage.
//! - Exercise one in-memory store round-trip with deterministic output
//!   shape for quick local sanity checks.

use tracediary_core::{
    DateProviding, DiaryProviding, DiaryStoring, LocalDateProvider, SqliteDiaryStore,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("tracediary_core version={}", tracediary_core::core_version());

    let store = SqliteDiaryStore::open_in_memory()?;
    let today = LocalDateProvider.today();

    let person_id = store.add_contact_person("Ada")?;
    store.add_contact_person_encounter(person_id, today)?;
    let location_id = store.add_location("Corner Cafe")?;
    store.add_location_visit(location_id, today)?;

    let days = store.diary_days_publisher().value();
    let days_with_entries = days.iter().filter(|day| !day.is_empty()).count();
    println!(
        "diary window_days={} days_with_entries={days_with_entries}",
        days.len()
    );
    print!("{}", store.export()?);

    store.close();
    Ok(())
}
