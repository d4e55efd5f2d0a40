//! Quorum coordinator
//!
//! Writes are applied synchronously to replicas in their fixed order until
//! W have acknowledged, then handed to the [`AsyncReplicator`] for every
//! replica. Reads poll replicas in the same order until R records are
//! found and return the one with the highest version.
//!
//! Reads only observe the latest write when R + W > N. That is checked in
//! [`ClusterConfig::validate`] unless the config opts out.

use crate::common::{validate_key, ClusterConfig, ClusterMetrics, Error, Result};
use crate::coordinator::replicator::{AsyncReplicator, ReplicationReport, ReplicationTicket};
use crate::coordinator::version::VersionClock;
use crate::replica::{Replica, Version, VersionedRecord};
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;

/// Acknowledgement of a write that reached its synchronous quorum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteReceipt {
    pub version: Version,
    pub acks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOutcome {
    /// Highest-version record among the replicas consulted
    pub record: Option<VersionedRecord>,
    /// Replicas polled before the read stopped
    pub consulted: usize,
}

#[derive(Debug)]
pub struct Cluster {
    config: ClusterConfig,
    replicas: Arc<[Arc<Replica>]>,
    clock: VersionClock,
    replicator: AsyncReplicator,
    metrics: Arc<ClusterMetrics>,
}

impl Cluster {
    /// Build a cluster of `config.replicas` empty replicas. Replication tasks
    /// run on the current tokio runtime.
    pub fn new(config: ClusterConfig) -> Result<Self> {
        let runtime = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        Self::with_runtime(config, runtime)
    }

    pub fn with_runtime(config: ClusterConfig, runtime: Handle) -> Result<Self> {
        config.validate()?;

        let replicas: Arc<[Arc<Replica>]> =
            (0..config.replicas).map(|id| Arc::new(Replica::new(id))).collect();
        let metrics = Arc::new(ClusterMetrics::new());
        let replicator = AsyncReplicator::new(replicas.clone(), runtime, metrics.clone());

        tracing::info!(
            n = config.replicas,
            w = config.write_quorum,
            r = config.read_quorum,
            "cluster ready"
        );

        Ok(Self {
            config,
            replicas,
            clock: VersionClock::new(),
            replicator,
            metrics,
        })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Replicas in fan-out order
    pub fn replicas(&self) -> &[Arc<Replica>] {
        &self.replicas
    }

    pub fn metrics(&self) -> &ClusterMetrics {
        &self.metrics
    }

    /// Write `value` under `key`. Returns once W replicas hold the record;
    /// propagation to the rest continues in the background.
    pub fn write(&self, key: &str, value: &str) -> Result<WriteReceipt> {
        self.stage(key, value).map(|(receipt, _)| receipt)
    }

    /// Like [`Cluster::write`], then wait for the background fan-out of
    /// this write to finish.
    pub async fn write_and_wait(
        &self,
        key: &str,
        value: &str,
    ) -> Result<(WriteReceipt, Option<ReplicationReport>)> {
        let (receipt, ticket) = self.stage(key, value)?;
        Ok((receipt, ticket.wait().await))
    }

    /// Boolean form of [`Cluster::write`]: true iff the write quorum was reached.
    pub fn put(&self, key: &str, value: &str) -> bool {
        match self.write(key, value) {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(key, error = %e, "write failed");
                false
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self, value), fields(version))]
    fn stage(&self, key: &str, value: &str) -> Result<(WriteReceipt, ReplicationTicket)> {
        validate_key(key)?;
        let started = Instant::now();

        let record = VersionedRecord::new(key, value, self.clock.next());
        tracing::Span::current().record("version", record.version);

        let needed = self.config.write_quorum;
        let mut acks = 0;
        for replica in self.replicas.iter() {
            if acks >= needed {
                break;
            }
            match replica.apply(&record) {
                Ok(_) => acks += 1,
                Err(e) => {
                    tracing::warn!(replica = replica.id(), error = %e, "replica skipped in synchronous phase")
                }
            }
        }

        let reached = acks >= needed;
        self.metrics.record_write(started.elapsed(), reached);
        if !reached {
            // Partial applies stay in place; only committed writes propagate.
            return Err(Error::QuorumNotReached { needed, acked: acks });
        }

        let version = record.version;
        let ticket = self.replicator.replicate(record);
        Ok((WriteReceipt { version, acks }, ticket))
    }

    /// Value of the highest-version record among the first R replicas that
    /// hold `key`, or `None` if no consulted replica has it.
    pub fn read(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_record(key)?.record.map(|r| r.value))
    }

    /// Tuple form of [`Cluster::read`]. Invalid keys read as not found.
    pub fn get(&self, key: &str) -> (String, bool) {
        match self.read(key) {
            Ok(Some(value)) => (value, true),
            Ok(None) => (String::new(), false),
            Err(e) => {
                tracing::debug!(key, error = %e, "read rejected");
                (String::new(), false)
            }
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub fn read_record(&self, key: &str) -> Result<ReadOutcome> {
        validate_key(key)?;
        let started = Instant::now();

        let needed = self.config.read_quorum;
        let mut found: Vec<VersionedRecord> = Vec::with_capacity(needed);
        let mut consulted = 0;
        for replica in self.replicas.iter() {
            if found.len() >= needed {
                break;
            }
            consulted += 1;
            match replica.lookup(key) {
                Ok(Some(record)) => found.push(record),
                Ok(None) => {}
                Err(e) => tracing::warn!(replica = replica.id(), error = %e, "replica skipped in read"),
            }
        }

        // First-seen wins among equal versions.
        let record = found
            .into_iter()
            .reduce(|best, next| if next.supersedes(&best) { next } else { best });

        self.metrics.record_read(started.elapsed(), record.is_some());
        Ok(ReadOutcome { record, consulted })
    }

    /// Wait for all background replication started so far.
    pub async fn drain_replication(&self) -> Vec<ReplicationReport> {
        self.replicator.drain().await
    }

    /// Fan-outs still running
    pub fn replication_in_flight(&self) -> u64 {
        self.replicator.in_flight()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::NodeState;

    #[tokio::test]
    async fn test_new_requires_valid_config() {
        assert!(Cluster::new(ClusterConfig::new(3, 4, 1)).is_err());
        assert!(matches!(
            Cluster::new(ClusterConfig::new(4, 2, 2)),
            Err(Error::InvalidConfig(_))
        ));
        let cluster = Cluster::new(ClusterConfig::new(4, 2, 2).allow_weak_quorum()).unwrap();
        assert_eq!(cluster.replicas().len(), 4);
    }

    #[test]
    fn test_new_outside_runtime() {
        assert!(matches!(
            Cluster::new(ClusterConfig::default()),
            Err(Error::NoRuntime)
        ));
    }

    #[tokio::test]
    async fn test_synchronous_phase_touches_first_w() {
        let cluster = Cluster::new(ClusterConfig::new(5, 3, 3)).unwrap();

        let receipt = cluster.write("k", "v").unwrap();
        assert_eq!(receipt.acks, 3);

        // Current-thread runtime: the fan-out has not run yet.
        let holding: Vec<bool> = cluster
            .replicas()
            .iter()
            .map(|r| r.lookup("k").unwrap().is_some())
            .collect();
        assert_eq!(holding, vec![true, true, true, false, false]);

        cluster.drain_replication().await;
        assert!(cluster.replicas().iter().all(|r| r.lookup("k").unwrap().is_some()));
    }

    #[tokio::test]
    async fn test_write_skips_unavailable_replicas() {
        let cluster = Cluster::new(ClusterConfig::new(3, 2, 2)).unwrap();
        cluster.replicas()[0].set_state(NodeState::Dead);

        let receipt = cluster.write("k", "v").unwrap();
        assert_eq!(receipt.acks, 2);
        assert_eq!(cluster.read("k").unwrap().as_deref(), Some("v"));
    }

    #[tokio::test]
    async fn test_quorum_not_reached() {
        let cluster = Cluster::new(ClusterConfig::new(3, 2, 2)).unwrap();
        cluster.replicas()[1].set_state(NodeState::Dead);
        cluster.replicas()[2].set_state(NodeState::Draining);

        let err = cluster.write("k", "v").unwrap_err();
        assert!(matches!(err, Error::QuorumNotReached { needed: 2, acked: 1 }));
        assert!(!cluster.put("k", "v"));
        assert_eq!(cluster.metrics().writes_failed.get(), 2);
        assert_eq!(cluster.replication_in_flight(), 0);
        assert_eq!(cluster.metrics().replication_failed_total.get(), 0);
    }

    #[tokio::test]
    async fn test_read_stops_at_r() {
        let cluster = Cluster::new(ClusterConfig::new(5, 5, 1)).unwrap();
        cluster.write("k", "v").unwrap();

        let outcome = cluster.read_record("k").unwrap();
        assert_eq!(outcome.consulted, 1);
        assert_eq!(outcome.record.unwrap().value, "v");

        let missing = cluster.read_record("absent").unwrap();
        assert_eq!(missing.consulted, 5);
        assert!(missing.record.is_none());
    }

    #[tokio::test]
    async fn test_read_picks_highest_version_first_seen_on_tie() {
        let cluster = Cluster::new(ClusterConfig::new(3, 1, 3)).unwrap();
        let replicas = cluster.replicas();

        replicas[0].apply(&VersionedRecord::new("k", "old", 1)).unwrap();
        replicas[1].apply(&VersionedRecord::new("k", "new", 2)).unwrap();
        replicas[2].apply(&VersionedRecord::new("k", "twin", 2)).unwrap();

        assert_eq!(cluster.read("k").unwrap().as_deref(), Some("new"));
    }

    #[tokio::test]
    async fn test_invalid_key() {
        let cluster = Cluster::new(ClusterConfig::default()).unwrap();
        assert!(matches!(cluster.write("", "v"), Err(Error::InvalidKey(_))));
        assert_eq!(cluster.get(""), (String::new(), false));
    }

    #[tokio::test]
    async fn test_empty_value() {
        let cluster = Cluster::new(ClusterConfig::default()).unwrap();
        assert!(cluster.put("k", ""));
        assert_eq!(cluster.get("k"), (String::new(), true));
    }
}
