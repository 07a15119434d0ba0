//! Calendar date source for retention and window computation.

use chrono::{Local, NaiveDate};

/// Source of the current calendar day.
///
/// Retention math depends on "today"; routing it through a trait keeps
/// window and cleanup behavior deterministic under test.
pub trait DateProviding: Send + Sync {
    /// Returns today's date in the local timezone.
    fn today(&self) -> NaiveDate;
}

/// Default provider backed by the system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalDateProvider;

impl DateProviding for LocalDateProvider {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Provider pinned to one caller-chosen date.
///
/// Used by tests and previews that need a stable "today".
#[derive(Debug, Clone, Copy)]
pub struct FixedDateProvider {
    date: NaiveDate,
}

impl FixedDateProvider {
    pub fn new(date: NaiveDate) -> Self {
        Self { date }
    }
}

impl DateProviding for FixedDateProvider {
    fn today(&self) -> NaiveDate {
        self.date
    }
}
