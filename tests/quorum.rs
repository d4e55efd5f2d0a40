//! Quorum read/write behaviour of a whole cluster

use quorumkv::common::NodeState;
use quorumkv::{Cluster, ClusterConfig, VersionedRecord};

#[tokio::test]
async fn test_unwritten_keys_are_not_found() {
    let cluster = Cluster::new(ClusterConfig::new(3, 2, 2)).unwrap();
    cluster.write("present", "v").unwrap();

    for key in ["absent", "present-not", "PRESENT"] {
        assert_eq!(cluster.get(key), (String::new(), false));
        assert!(cluster.read(key).unwrap().is_none());
    }
    assert_eq!(cluster.metrics().reads_not_found.get(), 6);
}

#[tokio::test]
async fn test_read_your_write_after_synchronous_phase() {
    let cluster = Cluster::new(ClusterConfig::new(5, 3, 3)).unwrap();

    for i in 0..50 {
        let key = format!("key_{}", i);
        assert!(cluster.put(&key, &format!("value_{}", i)));
        assert_eq!(cluster.get(&key), (format!("value_{}", i), true));
    }

    assert!(cluster.put("key_7", "rewritten"));
    assert_eq!(cluster.get("key_7"), ("rewritten".to_string(), true));
}

#[tokio::test]
async fn test_newer_version_wins_among_consulted() {
    let cluster = Cluster::new(ClusterConfig::new(3, 1, 3)).unwrap();
    let replicas = cluster.replicas();

    replicas[0].apply(&VersionedRecord::new("k", "t1", 100)).unwrap();
    replicas[2].apply(&VersionedRecord::new("k", "t2", 200)).unwrap();

    let outcome = cluster.read_record("k").unwrap();
    assert_eq!(outcome.consulted, 3);
    assert_eq!(outcome.record.unwrap().value, "t2");
}

#[tokio::test]
async fn test_read_never_invents_values() {
    let cluster = Cluster::new(ClusterConfig::new(4, 4, 1)).unwrap();
    cluster.write("k", "only").unwrap();

    let outcome = cluster.read_record("k").unwrap();
    assert!(outcome.consulted <= 4);
    assert_eq!(outcome.record.unwrap().value, "only");
}

/// N=5, W=2, R=2: two writes land on disjoint pairs. Without quorum
/// overlap the read may see either one.
#[tokio::test]
async fn test_weak_quorum_disjoint_writes() {
    let config = ClusterConfig::new(5, 2, 2).allow_weak_quorum();
    let cluster = Cluster::new(config).unwrap();
    let replicas = cluster.replicas();

    // First write takes replicas 0 and 1.
    assert!(cluster.put("x", "a"));

    // Second write reaches replicas 2 and 3 only.
    replicas[0].set_state(NodeState::Draining);
    replicas[1].set_state(NodeState::Draining);
    assert!(cluster.put("x", "b"));
    replicas[0].set_state(NodeState::Alive);
    replicas[1].set_state(NodeState::Alive);

    let holding: Vec<String> = replicas
        .iter()
        .map(|r| r.lookup("x").unwrap().map(|rec| rec.value).unwrap_or_default())
        .collect();
    assert_eq!(holding, vec!["a", "a", "b", "b", ""]);

    let (value, found) = cluster.get("x");
    assert!(found);
    assert!(value == "a" || value == "b", "unexpected value {}", value);
}

/// N=3, W=3, R=1: every replica is updated before the write returns.
#[tokio::test]
async fn test_full_write_quorum_single_read() {
    let cluster = Cluster::new(ClusterConfig::new(3, 3, 1)).unwrap();

    let receipt = cluster.write("y", "z").unwrap();
    assert_eq!(receipt.acks, 3);

    for replica in cluster.replicas() {
        assert_eq!(replica.lookup("y").unwrap().unwrap().value, "z");
    }
    assert_eq!(cluster.get("y"), ("z".to_string(), true));
}

#[tokio::test]
async fn test_overlap_required_by_default() {
    let err = Cluster::new(ClusterConfig::new(5, 2, 2)).unwrap_err();
    assert!(matches!(err, quorumkv::Error::InvalidConfig(_)));
}

#[tokio::test]
async fn test_write_fails_below_quorum() {
    let cluster = Cluster::new(ClusterConfig::new(3, 3, 1)).unwrap();
    cluster.replicas()[2].set_state(NodeState::Dead);

    let err = cluster.write("k", "v").unwrap_err();
    assert!(err.is_retryable());
    assert!(matches!(
        err,
        quorumkv::Error::QuorumNotReached { needed: 3, acked: 2 }
    ));
}

#[tokio::test]
async fn test_failed_write_is_not_propagated() {
    let cluster = Cluster::new(ClusterConfig::new(3, 2, 2)).unwrap();
    let replicas = cluster.replicas();

    assert!(cluster.put("k", "committed"));
    cluster.drain_replication().await;

    replicas[1].set_state(NodeState::Dead);
    replicas[2].set_state(NodeState::Dead);
    assert!(!cluster.put("k", "rejected"));
    replicas[1].set_state(NodeState::Alive);
    replicas[2].set_state(NodeState::Alive);

    assert!(cluster.drain_replication().await.is_empty());
    assert_eq!(cluster.replication_in_flight(), 0);

    // No rollback: replica 0 keeps its partial apply, the others never see it.
    assert_eq!(replicas[0].lookup("k").unwrap().unwrap().value, "rejected");
    assert_eq!(replicas[1].lookup("k").unwrap().unwrap().value, "committed");
    assert_eq!(replicas[2].lookup("k").unwrap().unwrap().value, "committed");
}

#[tokio::test]
async fn test_committed_value_survives_failed_write() {
    let cluster = Cluster::new(ClusterConfig::new(3, 2, 2)).unwrap();
    let replicas = cluster.replicas();

    assert!(cluster.put("k", "committed"));
    cluster.drain_replication().await;

    replicas[0].set_state(NodeState::Dead);
    replicas[1].set_state(NodeState::Dead);
    assert!(!cluster.put("k", "rejected"));
    replicas[0].set_state(NodeState::Alive);
    replicas[1].set_state(NodeState::Alive);
    cluster.drain_replication().await;

    assert_eq!(cluster.get("k"), ("committed".to_string(), true));
    assert_eq!(cluster.metrics().writes_failed.get(), 1);
}

#[tokio::test]
async fn test_any_non_empty_key_is_accepted() {
    let cluster = Cluster::new(ClusterConfig::new(3, 2, 2)).unwrap();
    let long_key = "k".repeat(1025);

    for key in ["a\tb", "line\nbreak", "\u{0}", long_key.as_str()] {
        assert!(cluster.put(key, "v"), "write rejected for {:?}", key);
        assert_eq!(cluster.get(key), ("v".to_string(), true));
    }
    assert!(!cluster.put("", "v"));
}
