//! Configuration for a quorum cluster

use crate::common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Environment variable prefix, e.g. `QUORUMKV_WRITE_QUORUM=3`
pub const ENV_PREFIX: &str = "QUORUMKV";

/// Cluster configuration (N/W/R)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterConfig {
    /// Total replica count (N)
    #[serde(default = "default_replicas")]
    pub replicas: usize,

    /// Write quorum (W): synchronous acks required before a write returns
    #[serde(default = "default_quorum")]
    pub write_quorum: usize,

    /// Read quorum (R): records collected before a read stops polling
    #[serde(default = "default_quorum")]
    pub read_quorum: usize,

    /// Reject configurations where R + W <= N
    #[serde(default = "default_require_overlap")]
    pub require_overlap: bool,
}

fn default_replicas() -> usize {
    3
}
fn default_quorum() -> usize {
    2
}
fn default_require_overlap() -> bool {
    true
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            replicas: default_replicas(),
            write_quorum: default_quorum(),
            read_quorum: default_quorum(),
            require_overlap: default_require_overlap(),
        }
    }
}

impl ClusterConfig {
    pub fn new(replicas: usize, write_quorum: usize, read_quorum: usize) -> Self {
        Self {
            replicas,
            write_quorum,
            read_quorum,
            require_overlap: true,
        }
    }

    /// Accept R + W <= N (reads may miss the latest write)
    pub fn allow_weak_quorum(mut self) -> Self {
        self.require_overlap = false;
        self
    }

    /// Do read and write quorums always intersect?
    pub fn quorums_overlap(&self) -> bool {
        self.read_quorum + self.write_quorum > self.replicas
    }

    pub fn validate(&self) -> Result<()> {
        if self.replicas == 0 {
            return Err(Error::InvalidConfig("replicas must be at least 1".into()));
        }
        if self.write_quorum == 0 || self.write_quorum > self.replicas {
            return Err(Error::InvalidConfig(format!(
                "write_quorum must be in 1..={}, got {}",
                self.replicas, self.write_quorum
            )));
        }
        if self.read_quorum == 0 || self.read_quorum > self.replicas {
            return Err(Error::InvalidConfig(format!(
                "read_quorum must be in 1..={}, got {}",
                self.replicas, self.read_quorum
            )));
        }
        if !self.quorums_overlap() {
            if self.require_overlap {
                return Err(Error::InvalidConfig(format!(
                    "read_quorum + write_quorum must exceed replicas ({} + {} <= {})",
                    self.read_quorum, self.write_quorum, self.replicas
                )));
            }
            tracing::warn!(
                n = self.replicas,
                w = self.write_quorum,
                r = self.read_quorum,
                "R + W <= N: reads may return stale values"
            );
        }
        Ok(())
    }

    /// Load defaults, then an optional TOML file, then `QUORUMKV_*` env vars.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .set_default("replicas", default_replicas() as u64)?
            .set_default("write_quorum", default_quorum() as u64)?
            .set_default("read_quorum", default_quorum() as u64)?
            .set_default("require_overlap", default_require_overlap())?;

        if let Some(path) = path {
            builder = builder.add_source(
                config::File::from(path)
                    .required(true)
                    .format(config::FileFormat::Toml),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .try_parsing(true),
        );

        let config: ClusterConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_is_valid() {
        let config = ClusterConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.quorums_overlap());
    }

    #[test]
    fn test_quorum_bounds() {
        assert!(ClusterConfig::new(0, 1, 1).validate().is_err());
        assert!(ClusterConfig::new(3, 0, 3).validate().is_err());
        assert!(ClusterConfig::new(3, 4, 3).validate().is_err());
        assert!(ClusterConfig::new(3, 3, 0).validate().is_err());
        assert!(ClusterConfig::new(3, 3, 4).validate().is_err());
        assert!(ClusterConfig::new(3, 3, 1).validate().is_ok());
    }

    #[test]
    fn test_overlap_enforced() {
        let weak = ClusterConfig::new(5, 2, 2);
        assert!(matches!(weak.validate(), Err(Error::InvalidConfig(_))));
        assert!(weak.allow_weak_quorum().validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "replicas = 5\nwrite_quorum = 3\nread_quorum = 3\nrequire_overlap = true"
        )
        .unwrap();

        let config = ClusterConfig::load(Some(file.path())).unwrap();
        assert_eq!(config, ClusterConfig::new(5, 3, 3));
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "replicas = 2\nwrite_quorum = 3").unwrap();

        assert!(ClusterConfig::load(Some(file.path())).is_err());
    }
}
