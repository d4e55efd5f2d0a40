//! Replica implementation
//!
//! A replica stands in for a remote storage node: it owns a volatile
//! key → record map and serializes every access to it.

pub mod record;
pub mod store;

pub use record::{Version, VersionedRecord};
pub use store::{ApplyOutcome, Replica};
