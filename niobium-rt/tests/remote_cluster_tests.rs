//! Two-node end-to-end scenarios over the in-process mesh: remote ping,
//! batch coalescing, remote spawn.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

// Layer 1: Standard library imports
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

// Layer 2: Third-party crate imports
use bytes::Bytes;

// Layer 3: Internal module imports
use niobium_rt::prelude::*;
use niobium_rt::transport::{InboundFrame, Transport, TransportError};
use niobium_rt::MetricsSnapshot;

const KICKOFF: u32 = 1;
const PING: u32 = 42;
const DONE: u32 = 7;
const FLOOD: u32 = 50;

const SENDER: ScriptId = ScriptId::from_raw(1);
const RECEIVER: ScriptId = ScriptId::from_raw(2);

/// Counts the payloads a node actually puts on the wire.
struct RecordingTransport<T: Transport> {
    inner: T,
    sends: Arc<AtomicU64>,
}

impl<T: Transport> Transport for RecordingTransport<T> {
    fn node_id(&self) -> NodeId {
        self.inner.node_id()
    }

    fn node_count(&self) -> u32 {
        self.inner.node_count()
    }

    fn send(&mut self, destination: NodeId, payload: Bytes) -> Result<(), TransportError> {
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.inner.send(destination, payload)
    }

    fn poll(&mut self) -> Result<Option<InboundFrame>, TransportError> {
        self.inner.poll()
    }

    fn flush(&mut self) -> Result<(), TransportError> {
        self.inner.flush()
    }

    fn shutdown(&mut self) -> Result<(), TransportError> {
        self.inner.shutdown()
    }
}

fn run_to_completion(mut node: Node) -> MetricsSnapshot {
    node.run().unwrap();
    node.metrics()
}

struct RemotePing {
    peer: ActorName,
    log: Arc<Mutex<Vec<(u32, u32)>>>,
}

impl Behavior for RemotePing {
    fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
        match message.tag() {
            KICKOFF => {
                let mut fields = Unpacker::new(message.payload().clone());
                self.peer = fields.actor().unwrap();
                ctx.send(self.peer, PING, &[1, 2, 3, 4]);
            }
            DONE => {
                self.log
                    .lock()
                    .unwrap()
                    .push((message.tag(), message.source().raw()));
                ctx.stop();
            }
            _ => {}
        }
    }
}

struct RemotePong {
    log: Arc<Mutex<Vec<(u32, Vec<u8>)>>>,
}

impl Behavior for RemotePong {
    fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
        if message.tag() == PING {
            self.log
                .lock()
                .unwrap()
                .push((ctx.node_id().raw(), message.payload().to_vec()));
            ctx.reply(DONE, &[]);
            ctx.stop();
        }
    }
}

#[test]
fn test_ping_remote() {
    let mut mesh = LoopbackMesh::new(2);
    let transport1 = mesh.pop().unwrap();
    let transport0 = mesh.pop().unwrap();

    let node0 = Node::new(
        NodeConfig::cluster_member(NodeId::from_raw(0), 2, 2),
        Box::new(transport0),
    )
    .unwrap();
    let node1 = Node::new(
        NodeConfig::cluster_member(NodeId::from_raw(1), 2, 2),
        Box::new(transport1),
    )
    .unwrap();

    let ping_log = Arc::new(Mutex::new(Vec::new()));
    let pong_log = Arc::new(Mutex::new(Vec::new()));

    let log = Arc::clone(&ping_log);
    node0
        .register_script(Script::new(SENDER, "remote-ping", move || {
            Box::new(RemotePing {
                peer: ActorName::NONE,
                log: Arc::clone(&log),
            })
        }))
        .unwrap();
    let log = Arc::clone(&pong_log);
    node1
        .register_script(Script::new(RECEIVER, "remote-pong", move || {
            Box::new(RemotePong {
                log: Arc::clone(&log),
            })
        }))
        .unwrap();

    let a = node0.spawn(SENDER).unwrap();
    let b = node1.spawn(RECEIVER).unwrap();
    // Deterministic naming encodes the node in the residue.
    assert_eq!(a.node(2).raw(), 0);
    assert_eq!(b.node(2).raw(), 1);

    node0.send(a, KICKOFF, &Packer::new().actor(b).finish());

    let peer = thread::spawn(move || run_to_completion(node1));
    let snapshot0 = run_to_completion(node0);
    let snapshot1 = peer.join().unwrap();

    // B's handler ran on node 1 and saw the bytes A sent.
    assert_eq!(*pong_log.lock().unwrap(), vec![(1, vec![1, 2, 3, 4])]);
    // A heard back from B.
    assert_eq!(*ping_log.lock().unwrap(), vec![(DONE, b.raw())]);

    assert_eq!(snapshot0.alive, 0);
    assert_eq!(snapshot1.alive, 0);
    assert!(snapshot0.routed_remote >= 1);
    assert!(snapshot1.inbound_payloads >= 1);
}

struct Flooder {
    peer: ActorName,
}

impl Behavior for Flooder {
    fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
        if message.tag() == KICKOFF {
            let mut fields = Unpacker::new(message.payload().clone());
            self.peer = fields.actor().unwrap();
            for seq in 0..100u32 {
                // 8-byte payloads: 24 bytes per frame on the wire.
                ctx.send_bytes(self.peer, FLOOD, Packer::new().u32(seq).u32(0).finish());
            }
            ctx.stop();
        }
    }
}

struct Collector {
    order: Arc<Mutex<Vec<u32>>>,
    expected: usize,
}

impl Behavior for Collector {
    fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
        if message.tag() == FLOOD {
            let mut fields = Unpacker::new(message.payload().clone());
            let mut order = self.order.lock().unwrap();
            order.push(fields.u32().unwrap());
            if order.len() == self.expected {
                drop(order);
                ctx.stop();
            }
        }
    }
}

#[test]
fn test_batch_coalescing() {
    let mut mesh = LoopbackMesh::new(2);
    let transport1 = mesh.pop().unwrap();
    let transport0 = mesh.pop().unwrap();

    let sends = Arc::new(AtomicU64::new(0));
    let recording = RecordingTransport {
        inner: transport0,
        sends: Arc::clone(&sends),
    };

    // Size-triggered flushes only: the age deadline is out of reach.
    let mut config0 = NodeConfig::cluster_member(NodeId::from_raw(0), 2, 2);
    config0.multiplex = MultiplexPolicy {
        flush_threshold: 1024,
        max_delay: Duration::from_secs(10),
        bypass_tags: Vec::new(),
    };

    let node0 = Node::new(config0, Box::new(recording)).unwrap();
    let node1 = Node::new(
        NodeConfig::cluster_member(NodeId::from_raw(1), 2, 2),
        Box::new(transport1),
    )
    .unwrap();

    node0
        .register_script(Script::new(SENDER, "flooder", || {
            Box::new(Flooder {
                peer: ActorName::NONE,
            })
        }))
        .unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&order);
    node1
        .register_script(Script::new(RECEIVER, "collector", move || {
            Box::new(Collector {
                order: Arc::clone(&seen),
                expected: 100,
            })
        }))
        .unwrap();

    let a = node0.spawn(SENDER).unwrap();
    let b = node1.spawn(RECEIVER).unwrap();
    node0.send(a, KICKOFF, &Packer::new().actor(b).finish());

    let peer = thread::spawn(move || run_to_completion(node1));
    let snapshot0 = run_to_completion(node0);
    let snapshot1 = peer.join().unwrap();

    // 100 messages of 24 wire bytes against a 1024-byte threshold: two full
    // batches and one shutdown-flush remainder.
    let wire_sends = sends.load(Ordering::SeqCst);
    assert!(
        (2..=3).contains(&wire_sends),
        "expected 2-3 transport sends, got {wire_sends}"
    );

    // Exactly once, in send order, per destination actor.
    assert_eq!(*order.lock().unwrap(), (0..100u32).collect::<Vec<_>>());
    assert_eq!(snapshot0.multiplexer.frames_batched, 100);
    assert_eq!(snapshot0.multiplexer.batches_flushed, wire_sends);
    assert_eq!(snapshot1.alive, 0);
}

struct Requester {
    host: ActorName,
    spawned: Arc<Mutex<Vec<u32>>>,
}

impl Behavior for Requester {
    fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
        match message.tag() {
            KICKOFF => {
                let mut fields = Unpacker::new(message.payload().clone());
                self.host = fields.actor().unwrap();
                // Ask the remote node (via an actor it hosts) to spawn.
                ctx.send(
                    self.host,
                    tags::ACTION_SPAWN,
                    &Packer::new().script(RECEIVER).finish(),
                );
            }
            tags::ACTION_SPAWN_REPLY => {
                let mut fields = Unpacker::new(message.payload().clone());
                let child = fields.actor().unwrap();
                assert!(!child.is_none(), "remote spawn failed");
                self.spawned.lock().unwrap().push(child.raw());
                ctx.ask_to_stop(child);
                ctx.ask_to_stop(self.host);
                ctx.stop();
            }
            _ => {}
        }
    }
}

struct Host;

impl Behavior for Host {
    fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
        if message.tag() == tags::ACTION_ASK_TO_STOP {
            ctx.stop();
        }
    }
}

#[test]
fn test_remote_spawn_protocol() {
    let mut mesh = LoopbackMesh::new(2);
    let transport1 = mesh.pop().unwrap();
    let transport0 = mesh.pop().unwrap();

    let node0 = Node::new(
        NodeConfig::cluster_member(NodeId::from_raw(0), 2, 1),
        Box::new(transport0),
    )
    .unwrap();
    let node1 = Node::new(
        NodeConfig::cluster_member(NodeId::from_raw(1), 2, 1),
        Box::new(transport1),
    )
    .unwrap();

    let spawned = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&spawned);
    node0
        .register_script(Script::new(SENDER, "requester", move || {
            Box::new(Requester {
                host: ActorName::NONE,
                spawned: Arc::clone(&log),
            })
        }))
        .unwrap();
    // The host side registers both its idle host and the spawnable class.
    node1
        .register_script(Script::new(SENDER, "host", || Box::new(Host)))
        .unwrap();
    node1
        .register_script(Script::new(RECEIVER, "obedient", || Box::new(Host)))
        .unwrap();

    let requester = node0.spawn(SENDER).unwrap();
    let host = node1.spawn(SENDER).unwrap();
    node0.send(requester, KICKOFF, &Packer::new().actor(host).finish());

    let peer = thread::spawn(move || run_to_completion(node1));
    let snapshot0 = run_to_completion(node0);
    let snapshot1 = peer.join().unwrap();

    let spawned = spawned.lock().unwrap();
    assert_eq!(spawned.len(), 1);
    // The new actor lives on node 1 and is not the host.
    assert_eq!(spawned[0] % 2, 1);
    assert_ne!(spawned[0], host.raw());

    assert_eq!(snapshot1.spawned, 2);
    assert_eq!(snapshot1.alive, 0);
    assert_eq!(snapshot0.alive, 0);
}
