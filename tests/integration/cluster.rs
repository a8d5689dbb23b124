//! tests/integration/cluster.rs
//!
//! Happy-path cluster formation: seed bootstrap and joining through a
//! gateway. These tests spin up real nodes on loopback and observe their
//! membership tables through the in-process handles.

use crate::common::harness::{self, TestNode};
use std::time::Duration;
use swim_membership::StartMode;
use test_log::test;

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_three_seeds_converge_and_stay_stable() {
    let ids = harness::allocate_ids(3).unwrap();
    let (a_id, b_id, c_id) = (ids[0], ids[1], ids[2]);

    let node_a = TestNode::spawn(a_id, StartMode::Seeds(vec![b_id, c_id])).await.unwrap();
    let node_b = TestNode::spawn(b_id, StartMode::Seeds(vec![a_id, c_id])).await.unwrap();
    let node_c = TestNode::spawn(c_id, StartMode::Seeds(vec![a_id, b_id])).await.unwrap();

    // Seeds are populated immediately from their arguments.
    assert!(node_a.knows_exactly(&[b_id, c_id]));
    assert!(node_b.knows_exactly(&[a_id, c_id]));
    assert!(node_c.knows_exactly(&[a_id, b_id]));

    // Let the grace period end and several probe sweeps run: live seeds
    // must keep acking each other and nobody gets evicted.
    tokio::time::sleep(Duration::from_millis(2_000)).await;
    assert!(node_a.knows_exactly(&[b_id, c_id]), "A evicted a live peer");
    assert!(node_b.knows_exactly(&[a_id, c_id]), "B evicted a live peer");
    assert!(node_c.knows_exactly(&[a_id, b_id]), "C evicted a live peer");

    node_a.shutdown();
    node_b.shutdown();
    node_c.shutdown();
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_join_propagates_to_every_node() {
    let ids = harness::allocate_ids(4).unwrap();
    let (a_id, b_id, c_id, d_id) = (ids[0], ids[1], ids[2], ids[3]);

    let node_a = TestNode::spawn(a_id, StartMode::Seeds(vec![b_id, c_id])).await.unwrap();
    let node_b = TestNode::spawn(b_id, StartMode::Seeds(vec![a_id, c_id])).await.unwrap();
    let node_c = TestNode::spawn(c_id, StartMode::Seeds(vec![a_id, b_id])).await.unwrap();

    // D enters through A; the join reply hands D the whole cluster at once,
    // while B and C learn about D through gossip.
    let node_d = TestNode::spawn(d_id, StartMode::Join(a_id)).await.unwrap();
    assert!(node_d.knows_exactly(&[a_id, b_id, c_id]));

    let converged = harness::wait_until(
        || {
            node_a.knows_exactly(&[b_id, c_id, d_id])
                && node_b.knows_exactly(&[a_id, c_id, d_id])
                && node_c.knows_exactly(&[a_id, b_id, d_id])
                && node_d.knows_exactly(&[a_id, b_id, c_id])
        },
        Duration::from_secs(15),
    )
    .await;
    assert!(converged, "the join was not disseminated to every node");

    node_a.shutdown();
    node_b.shutdown();
    node_c.shutdown();
    node_d.shutdown();
}
