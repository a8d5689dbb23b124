//! tests/integration/churn.rs
//!
//! Failure detection and self-healing: a crashed node is evicted
//! everywhere, and a node the cluster does not recognize finds its way back
//! in through the rejoin handshake.

use crate::common::harness::{self, TestNode};
use std::time::Duration;
use swim_membership::StartMode;
use test_log::test;

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_crashed_node_is_evicted_everywhere() {
    let ids = harness::allocate_ids(3).unwrap();
    let (a_id, b_id, c_id) = (ids[0], ids[1], ids[2]);

    let node_a = TestNode::spawn(a_id, StartMode::Seeds(vec![b_id, c_id])).await.unwrap();
    let node_b = TestNode::spawn(b_id, StartMode::Seeds(vec![a_id, c_id])).await.unwrap();
    let node_c = TestNode::spawn(c_id, StartMode::Seeds(vec![a_id, b_id])).await.unwrap();

    // Let the cluster settle past the grace period, then kill C.
    tokio::time::sleep(Duration::from_millis(500)).await;
    node_c.shutdown();

    // Direct probe, indirect fallback, verdict, and dissemination of the
    // Removed broadcast all have to play out.
    let evicted = harness::wait_until(
        || node_a.knows_exactly(&[b_id]) && node_b.knows_exactly(&[a_id]),
        Duration::from_secs(10),
    )
    .await;
    assert!(evicted, "the crashed node was not evicted from every table");

    node_a.shutdown();
    node_b.shutdown();
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_unrecognized_node_rejoins_by_itself() {
    let ids = harness::allocate_ids(3).unwrap();
    let (a_id, b_id, e_id) = (ids[0], ids[1], ids[2]);

    let node_a = TestNode::spawn(a_id, StartMode::Seeds(vec![b_id])).await.unwrap();
    let node_b = TestNode::spawn(b_id, StartMode::Seeds(vec![a_id])).await.unwrap();

    // E believes it belongs to the cluster, but the cluster has never heard
    // of it. Its first probe earns a NotAPeer reply, which must trigger a
    // full rejoin through one of the remembered peers.
    let node_e = TestNode::spawn(e_id, StartMode::Seeds(vec![a_id, b_id])).await.unwrap();

    let healed = harness::wait_until(
        || {
            node_e.knows_exactly(&[a_id, b_id])
                && node_a.peers().contains(&e_id)
                && node_b.peers().contains(&e_id)
        },
        Duration::from_secs(15),
    )
    .await;
    assert!(healed, "the unrecognized node did not rejoin the cluster");

    node_a.shutdown();
    node_b.shutdown();
    node_e.shutdown();
}
