//! In-memory replica store
//!
//! Each replica owns one map guarded by its own lock. The lock is held only
//! for a single insert or lookup and never across replicas.

use crate::common::{Error, NodeState, Result};
use crate::replica::record::VersionedRecord;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError, RwLock};

/// Result of applying a record to a replica
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The record is now the current value for its key
    Applied,
    /// The replica already held a record at least as new; nothing changed
    Stale,
}

impl ApplyOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, ApplyOutcome::Applied)
    }
}

pub struct Replica {
    id: usize,
    state: RwLock<NodeState>,
    store: Mutex<HashMap<String, VersionedRecord>>,
}

impl Replica {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            state: RwLock::new(NodeState::Alive),
            store: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn state(&self) -> NodeState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Simulate a replica going down or coming back. The replica keeps its
    /// store and its place in the iteration order.
    pub fn set_state(&self, state: NodeState) {
        let mut current = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let previous = *current;
        if previous != state {
            tracing::info!(replica = self.id, from = %previous, to = %state, "replica state changed");
            *current = state;
        }
    }

    /// Store `record` unless a record with an equal or higher version is
    /// already present for its key.
    pub fn apply(&self, record: &VersionedRecord) -> Result<ApplyOutcome> {
        if !self.state().can_write() {
            return Err(Error::ReplicaUnavailable(self.id));
        }

        let mut store = self.lock_store();
        let stale = store
            .get(&record.key)
            .is_some_and(|current| !record.supersedes(current));
        let outcome = if stale {
            ApplyOutcome::Stale
        } else {
            store.insert(record.key.clone(), record.clone());
            ApplyOutcome::Applied
        };
        drop(store);

        tracing::debug!(
            replica = self.id,
            key = %record.key,
            version = record.version,
            ?outcome,
            "apply"
        );
        Ok(outcome)
    }

    pub fn lookup(&self, key: &str) -> Result<Option<VersionedRecord>> {
        if !self.state().can_read() {
            return Err(Error::ReplicaUnavailable(self.id));
        }
        Ok(self.lock_store().get(key).cloned())
    }

    /// Number of keys held
    pub fn len(&self) -> usize {
        self.lock_store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every critical section is one insert or lookup; poisoning leaves the map intact.
    fn lock_store(&self) -> MutexGuard<'_, HashMap<String, VersionedRecord>> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for Replica {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replica")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("keys", &self.len())
            .finish()
    }
}
