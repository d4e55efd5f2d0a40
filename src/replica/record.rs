//! Versioned record format

use serde::{Deserialize, Serialize};

/// Version stamp: write-time wall clock in nanoseconds
pub type Version = i64;

/// A value for a single key, stamped with the version of the write that
/// produced it. Never mutated after creation; replicas replace it wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionedRecord {
    pub key: String,
    pub value: String,
    pub version: Version,
}

impl VersionedRecord {
    pub fn new(key: impl Into<String>, value: impl Into<String>, version: Version) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            version,
        }
    }

    /// Is this record strictly newer than `other`?
    pub fn supersedes(&self, other: &VersionedRecord) -> bool {
        self.version > other.version
    }
}
