//! Simulation driver: builds a cluster, runs a concurrent write/read
//! workload against it and prints the resulting metrics.

use clap::Parser;
use quorumkv::common::NodeState;
use quorumkv::{Cluster, ClusterConfig};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "quorumkv-sim")]
#[command(about = "Run a write/read workload against an in-process quorum cluster")]
struct Cli {
    /// TOML config file (QUORUMKV_* env vars override it)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Total replica count (N)
    #[arg(long)]
    replicas: Option<usize>,

    /// Write quorum (W)
    #[arg(long)]
    write_quorum: Option<usize>,

    /// Read quorum (R)
    #[arg(long)]
    read_quorum: Option<usize>,

    /// Accept R + W <= N
    #[arg(long)]
    allow_weak_quorum: bool,

    /// Replica ids to mark dead before the run (comma-separated)
    #[arg(long, value_delimiter = ',')]
    fail: Vec<usize>,

    /// Distinct keys written per writer
    #[arg(long, default_value = "1000")]
    keys: usize,

    /// Concurrent writer tasks
    #[arg(long, default_value = "4")]
    writers: usize,

    /// Print Prometheus text instead of JSON
    #[arg(long)]
    prometheus: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    // File/env first, CLI flags have priority
    let mut config = ClusterConfig::load(cli.config.as_deref())?;
    if let Some(n) = cli.replicas {
        config.replicas = n;
    }
    if let Some(w) = cli.write_quorum {
        config.write_quorum = w;
    }
    if let Some(r) = cli.read_quorum {
        config.read_quorum = r;
    }
    if cli.allow_weak_quorum {
        config.require_overlap = false;
    }

    let cluster = Arc::new(Cluster::new(config)?);
    for id in &cli.fail {
        match cluster.replicas().get(*id) {
            Some(replica) => replica.set_state(NodeState::Dead),
            None => anyhow::bail!("no replica with id {}", id),
        }
    }

    let started = Instant::now();
    let mut writers = Vec::with_capacity(cli.writers);
    for writer in 0..cli.writers {
        let cluster = cluster.clone();
        let keys = cli.keys;
        writers.push(tokio::spawn(async move {
            let mut acked = 0usize;
            for i in 0..keys {
                if cluster.put(&format!("w{}-k{}", writer, i), &format!("v{}", i)) {
                    acked += 1;
                }
                tokio::task::yield_now().await;
            }
            acked
        }));
    }

    let mut acked = 0;
    for handle in writers {
        acked += handle.await?;
    }
    let write_time = started.elapsed();

    let reports = cluster.drain_replication().await;
    let failed_deliveries: usize = reports.iter().map(|r| r.failed).sum();

    let mut missing = 0;
    for writer in 0..cli.writers {
        for i in 0..cli.keys {
            if !cluster.get(&format!("w{}-k{}", writer, i)).1 {
                missing += 1;
            }
        }
    }

    tracing::info!(
        acked,
        attempted = cli.writers * cli.keys,
        missing,
        failed_deliveries,
        elapsed = ?write_time,
        "workload finished"
    );

    if cli.prometheus {
        print!("{}", cluster.metrics().to_prometheus());
    } else {
        println!(
            "{}",
            serde_json::to_string_pretty(&cluster.metrics().snapshot())?
        );
    }

    Ok(())
}
