//! Core contact diary storage for TraceDiary.
//! This crate is the single source of truth for diary persistence invariants.

pub mod clock;
pub mod db;
pub mod logging;
pub mod model;
pub mod observer;
pub mod store;

pub use clock::{DateProviding, FixedDateProvider, LocalDateProvider};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::diary::{
    ContactPerson, ContactPersonEncounter, DayEncounter, DayVisit, DiaryDay, DiaryEntityId,
    Location, LocationVisit,
};
pub use observer::subject::{Subject, Subscription};
pub use store::diary_store::{
    DiaryProviding, DiaryStoreError, DiaryStoreResult, DiaryStoring, DiaryStoringProviding,
    DATA_RETENTION_PERIOD_IN_DAYS, DEFAULT_CLEANUP_TIMEOUT, USER_VISIBLE_PERIOD_IN_DAYS,
};
pub use store::sqlite::SqliteDiaryStore;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
