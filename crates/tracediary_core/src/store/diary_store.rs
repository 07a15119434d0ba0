//! Diary store contract: failure taxonomy, retention constants, traits.
//!
//! # Responsibility
//! - Define the two-kind failure surface every store operation reports.
//! - Define the storage and read traits implemented by the SQLite store.
//! - Provide the retention window math shared by store and cleanup.
//!
//! # Invariants
//! - Every operation returns a definitive success or typed failure.
//! - Retention covers 17 trailing days, the visible window 15, both
//!   inclusive of today.
//!
//! # See also
//! - docs/architecture/data-model.md

use crate::db::DbError;
use crate::model::diary::DiaryDay;
use crate::observer::subject::Subject;
use chrono::{Days, NaiveDate};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Days of raw diary data kept before cleanup may purge, inclusive of today.
pub const DATA_RETENTION_PERIOD_IN_DAYS: u32 = 17;

/// Days surfaced to the user, inclusive of today. Narrower than retention
/// to tolerate timezone and day-boundary skew.
pub const USER_VISIBLE_PERIOD_IN_DAYS: u32 = 15;

/// Deadline applied by `cleanup` when no explicit timeout is given.
pub const DEFAULT_CLEANUP_TIMEOUT: Duration = Duration::from_secs(10);

pub type DiaryStoreResult<T> = Result<T, DiaryStoreError>;

/// Failure taxonomy for store operations.
///
/// Callers distinguish "the engine rejected the operation" from "the
/// operation ran out of time"; nothing else leaks through.
#[derive(Debug)]
pub enum DiaryStoreError {
    /// The storage layer reported an error. Engine result codes are
    /// preserved verbatim and reachable via [`Self::sqlite_error_code`].
    Database(DbError),
    /// A deadline-bounded cleanup did not finish in time. Prior state is
    /// fully intact.
    Timeout,
}

impl DiaryStoreError {
    /// Returns the engine's extended result code when one exists.
    pub fn sqlite_error_code(&self) -> Option<i32> {
        match self {
            Self::Database(DbError::Sqlite(rusqlite::Error::SqliteFailure(err, _))) => {
                Some(err.extended_code)
            }
            _ => None,
        }
    }
}

impl Display for DiaryStoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Database(err) => write!(f, "{err}"),
            Self::Timeout => write!(f, "cleanup did not finish within its deadline"),
        }
    }
}

impl Error for DiaryStoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Database(err) => Some(err),
            Self::Timeout => None,
        }
    }
}

impl From<DbError> for DiaryStoreError {
    fn from(value: DbError) -> Self {
        Self::Database(value)
    }
}

impl From<rusqlite::Error> for DiaryStoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Database(DbError::Sqlite(value))
    }
}

/// Mutating operations of the contact diary store.
///
/// Implementations serialize mutations internally; methods take `&self`
/// and are safe to call from multiple threads.
pub trait DiaryStoring {
    /// Inserts a contact person and returns the store-assigned id.
    ///
    /// Names are stored verbatim; emptiness is a caller convention.
    fn add_contact_person(&self, name: &str) -> DiaryStoreResult<i64>;

    /// Inserts a location and returns the store-assigned id.
    fn add_location(&self, name: &str) -> DiaryStoreResult<i64>;

    /// Records an encounter with `contact_person_id` on `date`.
    ///
    /// Fails with the engine's foreign-key code when the person is unknown.
    fn add_contact_person_encounter(
        &self,
        contact_person_id: i64,
        date: NaiveDate,
    ) -> DiaryStoreResult<i64>;

    /// Records a visit to `location_id` on `date`.
    fn add_location_visit(&self, location_id: i64, date: NaiveDate) -> DiaryStoreResult<i64>;

    /// Renames an existing contact person. Fails when `id` is absent.
    fn update_contact_person(&self, id: i64, name: &str) -> DiaryStoreResult<()>;

    /// Renames an existing location. Fails when `id` is absent.
    fn update_location(&self, id: i64, name: &str) -> DiaryStoreResult<()>;

    /// Deletes a person and, in the same transaction, their encounters.
    /// Absent ids are a no-op.
    fn remove_contact_person(&self, id: i64) -> DiaryStoreResult<()>;

    /// Deletes a location and, in the same transaction, its visits.
    /// Absent ids are a no-op.
    fn remove_location(&self, id: i64) -> DiaryStoreResult<()>;

    /// Deletes one encounter. Absent ids are a no-op.
    fn remove_contact_person_encounter(&self, id: i64) -> DiaryStoreResult<()>;

    /// Deletes one visit. Absent ids are a no-op.
    fn remove_location_visit(&self, id: i64) -> DiaryStoreResult<()>;

    /// Deletes all contact persons and their encounters. Locations and
    /// visits are untouched.
    fn remove_all_contact_persons(&self) -> DiaryStoreResult<()>;

    /// Deletes all locations and their visits. Contact persons and
    /// encounters are untouched.
    fn remove_all_locations(&self) -> DiaryStoreResult<()>;

    /// Purges entries older than the retention period under
    /// [`DEFAULT_CLEANUP_TIMEOUT`].
    fn cleanup(&self) -> DiaryStoreResult<()>;

    /// Purges entries older than the retention period, aborting with
    /// [`DiaryStoreError::Timeout`] when `timeout` elapses first. An
    /// aborted sweep rolls back entirely; no partial purge is observable.
    fn cleanup_with_timeout(&self, timeout: Duration) -> DiaryStoreResult<()>;

    /// Deletes all diary data in one transaction. Id assignment restarts
    /// from 1 afterwards.
    fn reset(&self) -> DiaryStoreResult<()>;

    /// Releases the underlying database. Safe to call repeatedly; later
    /// operations fail with `Database(ConnectionClosed)`. Engine errors
    /// during close are logged, not surfaced.
    fn close(&self);
}

/// Read-side surface of the contact diary store.
pub trait DiaryProviding {
    /// Days of raw data kept before cleanup purges, inclusive of today.
    fn data_retention_period_in_days(&self) -> u32 {
        DATA_RETENTION_PERIOD_IN_DAYS
    }

    /// Days surfaced to the user, inclusive of today.
    fn user_visible_period_in_days(&self) -> u32 {
        USER_VISIBLE_PERIOD_IN_DAYS
    }

    /// Current-value publisher of the visible diary-day window.
    ///
    /// Emits the current window on subscribe and after every committed
    /// mutation, most recent day first.
    fn diary_days_publisher(&self) -> &Subject<Vec<DiaryDay>>;

    /// Renders all retained entries as a stable text blob.
    fn export(&self) -> DiaryStoreResult<String>;
}

/// Combined storage and read surface.
pub trait DiaryStoringProviding: DiaryStoring + DiaryProviding {}

impl<T: DiaryStoring + DiaryProviding> DiaryStoringProviding for T {}

/// Dates of the user-visible window, most recent first.
pub fn visible_window(today: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::with_capacity(USER_VISIBLE_PERIOD_IN_DAYS as usize);
    let mut day = today;
    for _ in 0..USER_VISIBLE_PERIOD_IN_DAYS {
        dates.push(day);
        match day.checked_sub_days(Days::new(1)) {
            Some(previous) => day = previous,
            None => break,
        }
    }
    dates
}

/// Oldest date still covered by the retention period. Entries dated
/// strictly before this are eligible for cleanup.
pub fn retention_cutoff(today: NaiveDate) -> NaiveDate {
    today
        .checked_sub_days(Days::new(u64::from(DATA_RETENTION_PERIOD_IN_DAYS - 1)))
        .unwrap_or(NaiveDate::MIN)
}
