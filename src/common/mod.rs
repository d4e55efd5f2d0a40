//! Common utilities and types shared across quorumkv

pub mod config;
pub mod error;
pub mod metrics;
pub mod utils;

pub use config::ClusterConfig;
pub use error::{Error, Result};
pub use metrics::{ClusterMetrics, MetricsSnapshot};
pub use utils::{timestamp_now_nanos, validate_key, NodeState};
