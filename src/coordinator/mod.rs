//! Coordinator implementation
//!
//! The coordinator is responsible for:
//! - Version stamping of writes
//! - Synchronous W-of-N write staging
//! - R-of-N reads resolved by highest version
//! - Background propagation to every replica
//!
//! It keeps no per-key state of its own.

pub mod cluster;
pub mod replicator;
pub mod version;

pub use cluster::{Cluster, ReadOutcome, WriteReceipt};
pub use replicator::{AsyncReplicator, ReplicationReport, ReplicationTicket};
pub use version::VersionClock;
