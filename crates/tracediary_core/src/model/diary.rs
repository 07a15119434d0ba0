//! Diary entity and read-model types.
//!
//! # Responsibility
//! - Define the canonical records persisted by the diary store.
//! - Define the derived `DiaryDay` aggregate published to subscribers.
//!
//! # Invariants
//! - Ids are store-assigned and unique per table for the lifetime of a
//!   database file.
//! - `DiaryDay` is derived from stored state and never persisted itself.
//!
//! # See also
//! - docs/architecture/data-model.md

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Store-assigned identifier for persisted diary entities.
///
/// Kept as a type alias to make semantic intent explicit in signatures.
pub type DiaryEntityId = i64;

/// A person the user records encounters with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPerson {
    /// Store-assigned row id.
    pub id: DiaryEntityId,
    /// Display name as entered by the user. Stored verbatim.
    pub name: String,
}

impl ContactPerson {
    pub fn new(id: DiaryEntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// A place the user records visits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Store-assigned row id.
    pub id: DiaryEntityId,
    /// Display name as entered by the user. Stored verbatim.
    pub name: String,
}

impl Location {
    pub fn new(id: DiaryEntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }
}

/// One recorded encounter with a contact person on a calendar day.
///
/// Several encounters may link the same person to the same date; the store
/// treats them as distinct events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactPersonEncounter {
    pub id: DiaryEntityId,
    pub date: NaiveDate,
    pub contact_person_id: DiaryEntityId,
}

/// One recorded visit to a location on a calendar day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationVisit {
    pub id: DiaryEntityId,
    pub date: NaiveDate,
    pub location_id: DiaryEntityId,
}

/// An encounter joined with its person's current name, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEncounter {
    pub encounter_id: DiaryEntityId,
    pub contact_person_id: DiaryEntityId,
    pub name: String,
}

/// A visit joined with its location's current name, ready for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayVisit {
    pub visit_id: DiaryEntityId,
    pub location_id: DiaryEntityId,
    pub name: String,
}

/// One calendar day of the user-visible diary window.
///
/// The published window always contains one `DiaryDay` per covered date,
/// including days without any recorded entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiaryDay {
    pub date: NaiveDate,
    /// Encounters recorded for `date`, name-ordered case-insensitively.
    pub encounters: Vec<DayEncounter>,
    /// Visits recorded for `date`, name-ordered case-insensitively.
    pub visits: Vec<DayVisit>,
}

impl DiaryDay {
    /// Creates a day with no recorded entries.
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            encounters: Vec::new(),
            visits: Vec::new(),
        }
    }

    /// Returns whether the day has neither encounters nor visits.
    pub fn is_empty(&self) -> bool {
        self.encounters.is_empty() && self.visits.is_empty()
    }
}
