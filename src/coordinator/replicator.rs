//! Asynchronous replication fan-out
//!
//! After a write reaches its synchronous quorum the committed record is
//! handed here and delivered to every replica in the cluster, one task per
//! replica. The writer never waits on this. Deliveries are best-effort:
//! a failed delivery is counted and logged, never retried.

use crate::common::{ClusterMetrics, Error};
use crate::replica::{ApplyOutcome, Replica, Version, VersionedRecord};
use serde::Serialize;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::{JoinHandle, JoinSet};

/// Outcome of one record's fan-out
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplicationReport {
    pub version: Version,
    pub applied: usize,
    pub stale: usize,
    pub failed: usize,
}

impl ReplicationReport {
    fn new(version: Version) -> Self {
        Self {
            version,
            applied: 0,
            stale: 0,
            failed: 0,
        }
    }

    /// Number of replicas that hold this record or something newer
    pub fn converged(&self) -> usize {
        self.applied + self.stale
    }
}

/// Completion signal for a single fan-out
#[derive(Debug)]
pub struct ReplicationTicket {
    version: Version,
    done: oneshot::Receiver<ReplicationReport>,
}

impl ReplicationTicket {
    pub fn version(&self) -> Version {
        self.version
    }

    /// Wait for every delivery of this record to finish.
    /// Returns `None` if the fan-out task was lost (runtime shut down).
    pub async fn wait(self) -> Option<ReplicationReport> {
        self.done.await.ok()
    }
}

#[derive(Debug)]
pub struct AsyncReplicator {
    replicas: Arc<[Arc<Replica>]>,
    runtime: Handle,
    metrics: Arc<ClusterMetrics>,
    pending: Mutex<Vec<JoinHandle<ReplicationReport>>>,
}

impl AsyncReplicator {
    pub fn new(replicas: Arc<[Arc<Replica>]>, runtime: Handle, metrics: Arc<ClusterMetrics>) -> Self {
        Self {
            replicas,
            runtime,
            metrics,
            pending: Mutex::new(Vec::new()),
        }
    }

    /// Start delivering `record` to every replica and return immediately.
    pub fn replicate(&self, record: VersionedRecord) -> ReplicationTicket {
        let version = record.version;
        let (tx, rx) = oneshot::channel();

        let in_flight = InFlight::enter(self.metrics.clone());
        let handle = self.runtime.spawn(fan_out(
            self.replicas.clone(),
            record,
            in_flight,
            tx,
        ));

        let mut pending = self.pending.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|h| !h.is_finished());
        pending.push(handle);

        ReplicationTicket { version, done: rx }
    }

    /// Fan-outs started and not yet finished
    pub fn in_flight(&self) -> u64 {
        self.metrics.replication_in_flight.get()
    }

    /// Wait until every fan-out started so far (and any started while
    /// waiting) has finished. Returns the reports of those not yet reaped.
    pub async fn drain(&self) -> Vec<ReplicationReport> {
        let mut reports = Vec::new();
        loop {
            let batch = std::mem::take(
                &mut *self.pending.lock().unwrap_or_else(PoisonError::into_inner),
            );
            if batch.is_empty() {
                return reports;
            }
            for handle in batch {
                match handle.await {
                    Ok(report) => reports.push(report),
                    Err(e) => tracing::warn!(error = %e, "replication fan-out task lost"),
                }
            }
        }
    }
}

/// Holds one unit of `replication_in_flight` until dropped, including when
/// the fan-out future is dropped unfinished by a shutting-down runtime.
struct InFlight {
    metrics: Arc<ClusterMetrics>,
}

impl InFlight {
    fn enter(metrics: Arc<ClusterMetrics>) -> Self {
        metrics.replication_in_flight.inc();
        Self { metrics }
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.metrics.replication_in_flight.dec();
    }
}

async fn fan_out(
    replicas: Arc<[Arc<Replica>]>,
    record: VersionedRecord,
    in_flight: InFlight,
    done: oneshot::Sender<ReplicationReport>,
) -> ReplicationReport {
    let metrics = &in_flight.metrics;
    let record = Arc::new(record);
    let mut report = ReplicationReport::new(record.version);

    let mut deliveries = JoinSet::new();
    for replica in replicas.iter() {
        let replica = replica.clone();
        let record = record.clone();
        deliveries.spawn(async move { (replica.id(), replica.apply(&record)) });
    }

    while let Some(joined) = deliveries.join_next().await {
        match joined {
            Ok((_, Ok(ApplyOutcome::Applied))) => report.applied += 1,
            Ok((_, Ok(ApplyOutcome::Stale))) => report.stale += 1,
            Ok((id, Err(e))) => {
                report.failed += 1;
                log_failed_delivery(id, &record, &e);
            }
            Err(e) => {
                report.failed += 1;
                tracing::warn!(key = %record.key, error = %e, "delivery task aborted");
            }
        }
    }

    metrics.replication_applied_total.add(report.applied as u64);
    metrics.replication_stale_total.add(report.stale as u64);
    metrics.replication_failed_total.add(report.failed as u64);
    tracing::debug!(
        key = %record.key,
        version = report.version,
        applied = report.applied,
        stale = report.stale,
        failed = report.failed,
        "replication finished"
    );

    drop(in_flight);
    // Nobody listening is the common case.
    let _ = done.send(report);
    report
}

fn log_failed_delivery(replica: usize, record: &VersionedRecord, error: &Error) {
    tracing::debug!(
        replica,
        key = %record.key,
        version = record.version,
        error = %error,
        "delivery failed, not retried"
    );
}
