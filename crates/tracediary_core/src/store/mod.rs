//! Diary store contract and SQLite implementation.
//!
//! # Responsibility
//! - Define the failure taxonomy, retention constants, and store traits.
//! - Provide the conforming SQLite-backed store and the text export.
//!
//! # Invariants
//! - Every committed mutation publishes a fresh diary-day snapshot.
//! - Readers never observe partially applied mutations.
//!
//! # See also
//! - docs/architecture/data-model.md

pub mod diary_store;
pub mod export;
pub mod sqlite;

/// Date column encoding. Zero-padded so lexicographic order on the TEXT
/// column is chronological order.
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";
