//! Error types for quorumkv

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    // === Quorum Errors ===
    #[error("Quorum not reached: need {needed}, acked {acked}")]
    QuorumNotReached { needed: usize, acked: usize },

    #[error("Replica {0} unavailable")]
    ReplicaUnavailable(usize),

    // === Request Errors ===
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    // === Config Errors ===
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Config source error: {0}")]
    Config(#[from] config::ConfigError),

    // === Runtime Errors ===
    #[error("No tokio runtime available for asynchronous replication")]
    NoRuntime,
}

impl Error {
    /// Could the same operation succeed later without a config change?
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::QuorumNotReached { .. } | Error::ReplicaUnavailable(_)
        )
    }
}
