//! Cluster metrics
//!
//! Counters for the foreground quorum paths and for the background
//! replication fan-out, which has no other way to report failures.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Histogram bucket boundaries for latency measurements (in milliseconds)
const LATENCY_BUCKETS: [f64; 10] = [0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0, 500.0];

/// A simple histogram implementation for latency tracking
#[derive(Debug)]
pub struct Histogram {
    buckets: Vec<AtomicU64>,
    boundaries: Vec<f64>,
    sum: AtomicU64,
    count: AtomicU64,
}

impl Histogram {
    /// Create a new histogram with default latency buckets
    pub fn new() -> Self {
        Self::with_buckets(&LATENCY_BUCKETS)
    }

    /// Create a histogram with custom bucket boundaries
    pub fn with_buckets(boundaries: &[f64]) -> Self {
        let buckets = (0..=boundaries.len()).map(|_| AtomicU64::new(0)).collect();
        Self {
            buckets,
            boundaries: boundaries.to_vec(),
            sum: AtomicU64::new(0),
            count: AtomicU64::new(0),
        }
    }

    /// Record a value in the histogram
    pub fn observe(&self, value: f64) {
        let bucket_idx = self
            .boundaries
            .iter()
            .position(|&boundary| value <= boundary)
            .unwrap_or(self.boundaries.len());

        self.buckets[bucket_idx].fetch_add(1, Ordering::Relaxed);
        self.sum
            .fetch_add((value * 1000.0) as u64, Ordering::Relaxed); // Store as microseconds for precision
        self.count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn observe_duration(&self, duration: Duration) {
        self.observe(duration.as_secs_f64() * 1000.0);
    }

    /// Cumulative (upper bound, count) pairs, ending with +Inf
    pub fn get_buckets(&self) -> Vec<(f64, u64)> {
        let mut cumulative = 0u64;
        let mut result = Vec::with_capacity(self.boundaries.len() + 1);

        for (i, &boundary) in self.boundaries.iter().enumerate() {
            cumulative += self.buckets[i].load(Ordering::Relaxed);
            result.push((boundary, cumulative));
        }

        cumulative += self.buckets[self.boundaries.len()].load(Ordering::Relaxed);
        result.push((f64::INFINITY, cumulative));

        result
    }

    /// Get sum of all observed values
    pub fn sum(&self) -> f64 {
        self.sum.load(Ordering::Relaxed) as f64 / 1000.0
    }

    /// Get count of observations
    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }
}

impl Default for Histogram {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicU64,
}

impl Counter {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add(&self, n: u64) {
        self.value.fetch_add(n, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
pub struct Gauge {
    value: AtomicU64,
}

impl Gauge {
    pub fn new() -> Self {
        Self {
            value: AtomicU64::new(0),
        }
    }

    pub fn inc(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    pub fn dec(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }
}

/// Point-in-time copy of the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub writes_total: u64,
    pub writes_failed: u64,
    pub reads_total: u64,
    pub reads_not_found: u64,
    pub replication_applied_total: u64,
    pub replication_stale_total: u64,
    pub replication_failed_total: u64,
    pub replication_in_flight: u64,
    pub uptime_seconds: u64,
}

/// Per-cluster metrics registry
#[derive(Debug)]
pub struct ClusterMetrics {
    pub writes_total: Counter,
    pub writes_failed: Counter,
    pub reads_total: Counter,
    pub reads_not_found: Counter,

    /// Background deliveries, one per replica per write
    pub replication_applied_total: Counter,
    pub replication_stale_total: Counter,
    pub replication_failed_total: Counter,
    pub replication_in_flight: Gauge,

    /// Synchronous-phase latencies (ms)
    pub write_latency: Histogram,
    pub read_latency: Histogram,

    start_time: Instant,
}

impl ClusterMetrics {
    pub fn new() -> Self {
        Self {
            writes_total: Counter::new(),
            writes_failed: Counter::new(),
            reads_total: Counter::new(),
            reads_not_found: Counter::new(),
            replication_applied_total: Counter::new(),
            replication_stale_total: Counter::new(),
            replication_failed_total: Counter::new(),
            replication_in_flight: Gauge::new(),
            write_latency: Histogram::new(),
            read_latency: Histogram::new(),
            start_time: Instant::now(),
        }
    }

    pub fn record_write(&self, duration: Duration, success: bool) {
        self.writes_total.inc();
        self.write_latency.observe_duration(duration);
        if !success {
            self.writes_failed.inc();
        }
    }

    pub fn record_read(&self, duration: Duration, found: bool) {
        self.reads_total.inc();
        self.read_latency.observe_duration(duration);
        if !found {
            self.reads_not_found.inc();
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            writes_total: self.writes_total.get(),
            writes_failed: self.writes_failed.get(),
            reads_total: self.reads_total.get(),
            reads_not_found: self.reads_not_found.get(),
            replication_applied_total: self.replication_applied_total.get(),
            replication_stale_total: self.replication_stale_total.get(),
            replication_failed_total: self.replication_failed_total.get(),
            replication_in_flight: self.replication_in_flight.get(),
            uptime_seconds: self.uptime_seconds(),
        }
    }

    /// Generate Prometheus-compatible metrics output
    pub fn to_prometheus(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();

        let counters = [
            ("quorumkv_writes_total", "Total writes", &self.writes_total),
            ("quorumkv_writes_failed_total", "Writes that missed the write quorum", &self.writes_failed),
            ("quorumkv_reads_total", "Total reads", &self.reads_total),
            ("quorumkv_reads_not_found_total", "Reads that found no record", &self.reads_not_found),
            ("quorumkv_replication_applied_total", "Background deliveries that stored a record", &self.replication_applied_total),
            ("quorumkv_replication_stale_total", "Background deliveries superseded by a newer record", &self.replication_stale_total),
            ("quorumkv_replication_failed_total", "Background deliveries that failed", &self.replication_failed_total),
        ];
        for (name, help, counter) in counters {
            let _ = writeln!(out, "# HELP {} {}", name, help);
            let _ = writeln!(out, "# TYPE {} counter", name);
            let _ = writeln!(out, "{} {}", name, counter.get());
        }

        out.push_str("# HELP quorumkv_replication_in_flight Replication fan-outs still running\n");
        out.push_str("# TYPE quorumkv_replication_in_flight gauge\n");
        let _ = writeln!(
            out,
            "quorumkv_replication_in_flight {}",
            self.replication_in_flight.get()
        );

        out.push_str("# HELP quorumkv_uptime_seconds Cluster uptime in seconds\n");
        out.push_str("# TYPE quorumkv_uptime_seconds gauge\n");
        let _ = writeln!(out, "quorumkv_uptime_seconds {}", self.uptime_seconds());

        for (name, hist) in [
            ("quorumkv_write_duration_ms", &self.write_latency),
            ("quorumkv_read_duration_ms", &self.read_latency),
        ] {
            let _ = writeln!(out, "# TYPE {} histogram", name);
            for (le, count) in hist.get_buckets() {
                if le.is_infinite() {
                    let _ = writeln!(out, "{}_bucket{{le=\"+Inf\"}} {}", name, count);
                } else {
                    let _ = writeln!(out, "{}_bucket{{le=\"{}\"}} {}", name, le, count);
                }
            }
            let _ = writeln!(out, "{}_sum {}", name, hist.sum());
            let _ = writeln!(out, "{}_count {}", name, hist.count());
        }

        out
    }
}

impl Default for ClusterMetrics {
    fn default() -> Self {
        Self::new()
    }
}
