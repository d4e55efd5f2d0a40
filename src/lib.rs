//! # quorumkv
//!
//! Quorum-replicated in-memory key-value storage:
//! - N replicas, each an in-process store behind its own lock
//! - Writes acknowledged after W synchronous applies
//! - Reads resolved from up to R replicas by highest version
//! - Background propagation of every write to all replicas
//!
//! ## Architecture
//!
//! ```text
//!            write(k, v)            read(k)
//!                 │                    │
//! ┌───────────────▼────────────────────▼───────────┐
//! │                   Cluster                      │
//! │  version clock · W-of-N stage · R-of-N poll    │
//! └──────┬─────────────────────────────┬───────────┘
//!        │ sync (first W)              │ async (all N)
//! ┌──────▼─────┐  ┌────────────┐  ┌────▼───────────┐
//! │ Replica 0  │  │ Replica 1  │  │ AsyncReplicator│
//! │ Mutex<map> │  │ Mutex<map> │  │ JoinSet fan-out│
//! └────────────┘  └────────────┘  └────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```no_run
//! use quorumkv::{Cluster, ClusterConfig};
//!
//! # async fn demo() -> quorumkv::Result<()> {
//! let cluster = Cluster::new(ClusterConfig::new(3, 2, 2))?;
//! cluster.write("user:1", "alice")?;
//! assert_eq!(cluster.read("user:1")?.as_deref(), Some("alice"));
//! cluster.drain_replication().await;
//! # Ok(())
//! # }
//! ```

pub mod common;
pub mod coordinator;
pub mod replica;

// Re-export commonly used types
pub use common::{ClusterConfig, Error, Result};
pub use coordinator::Cluster;
pub use replica::{Replica, VersionedRecord};

/// Current version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
