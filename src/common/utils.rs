//! Utility functions for quorumkv

use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// Get current Unix timestamp (nanoseconds)
pub fn timestamp_now_nanos() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as i64)
        .unwrap_or(0)
}

/// Replica availability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Alive,
    /// Serves reads, rejects writes
    Draining,
    Dead,
}

impl NodeState {
    /// Can this replica accept new writes?
    pub fn can_write(&self) -> bool {
        matches!(self, NodeState::Alive)
    }

    /// Can this replica serve reads?
    pub fn can_read(&self) -> bool {
        matches!(self, NodeState::Alive | NodeState::Draining)
    }
}

impl std::fmt::Display for NodeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeState::Alive => write!(f, "alive"),
            NodeState::Draining => write!(f, "draining"),
            NodeState::Dead => write!(f, "dead"),
        }
    }
}

/// Validate key (must be non-empty)
pub fn validate_key(key: &str) -> crate::Result<()> {
    if key.is_empty() {
        return Err(crate::Error::InvalidKey("key cannot be empty".into()));
    }
    Ok(())
}
