//! Observer primitives for read-only store subscriptions.
//!
//! # Responsibility
//! - Provide the current-value subject used to publish diary snapshots.
//!
//! # Invariants
//! - Subscribers receive the current value synchronously on subscribe.
//! - Emission order matches commit order of the publishing store.

pub mod subject;
