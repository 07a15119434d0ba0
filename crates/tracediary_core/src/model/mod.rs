//! Contact diary domain model.
//!
//! # Responsibility
//! - Define the persisted diary entities and the derived per-day read model.
//!
//! # Invariants
//! - Every persisted entity is identified by a store-assigned integer id.
//! - Dates are calendar days without a time component.
//!
//! # See also
//! - docs/architecture/data-model.md

pub mod diary;
