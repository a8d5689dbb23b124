//! tests/integration/relay.rs
//!
//! The indirect-probe relay, driven end to end: a requestor peer asks a
//! real node to probe a target on its behalf, the target acks, and the
//! requestor gets the relayed ack back. Both the requestor and the target
//! are sockets controlled by the test, so every step is observable.

use crate::common::harness::{self, TestNode};
use std::time::Duration;
use swim_membership::wire::{GossipMessage, MessageKind, MAX_DATAGRAM_LEN};
use swim_membership::{NodeId, StartMode};
use test_log::test;
use tokio::net::UdpSocket;

/// A test-controlled peer: a bound datagram socket posing as a cluster
/// member the node under test was seeded with.
struct FakePeer {
    socket: UdpSocket,
    id: NodeId,
}

impl FakePeer {
    async fn bind(id: NodeId) -> FakePeer {
        let socket = UdpSocket::bind(("127.0.0.1", id.datagram_port)).await.unwrap();
        FakePeer { socket, id }
    }

    async fn send(&self, message: &GossipMessage, to: NodeId) {
        self.socket
            .send_to(&message.encode().unwrap(), ("127.0.0.1", to.datagram_port))
            .await
            .unwrap();
    }

    async fn recv(&self, timeout: Duration) -> Option<GossipMessage> {
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        match tokio::time::timeout(timeout, self.socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => Some(GossipMessage::decode(&buf[..len]).unwrap()),
            _ => None,
        }
    }
}

#[test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
async fn test_indirect_probe_relay_round_trip() {
    let ids = harness::allocate_ids(3).unwrap();
    let (relay_id, target_id, requestor_id) = (ids[0], ids[1], ids[2]);

    let target = FakePeer::bind(target_id).await;
    let requestor = FakePeer::bind(requestor_id).await;
    let relay =
        TestNode::spawn(relay_id, StartMode::Seeds(vec![target_id, requestor_id])).await.unwrap();

    // The requestor could not reach the target directly and asks the relay
    // to try on its behalf.
    let request =
        GossipMessage::request_probe(requestor_id, 0, target_id.datagram_port);
    requestor.send(&request, relay_id).await;

    // The relay must probe the target promptly.
    let probe = target.recv(Duration::from_secs(2)).await.expect("relay never probed the target");
    assert_eq!(probe.kind, MessageKind::Probe);
    assert_eq!(probe.sender_datagram_port(), Some(relay_id.datagram_port));

    // The target is alive and acks; the relay must forward the good news
    // before the pending request expires.
    target.send(&GossipMessage::ack(target_id), relay_id).await;

    let relayed = requestor
        .recv(Duration::from_secs(2))
        .await
        .expect("relayed ack never reached the requestor");
    assert_eq!(relayed.kind, MessageKind::AckProbe);
    // The relayed ack names the target, not the relay, so the requestor's
    // ack matching treats it like a direct one.
    assert_eq!(relayed.sender_datagram_port(), Some(target_id.datagram_port));

    relay.shutdown();
}
