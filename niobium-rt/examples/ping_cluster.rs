//! Two-node in-process cluster: a pinger on node 0 rallies with an echoer
//! on node 1, then both nodes drain and shut down.
//!
//! ```text
//! RUST_LOG=niobium_rt=debug cargo run --example ping_cluster
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

// Layer 1: Standard library imports
use std::thread;

// Layer 2: Third-party crate imports
use tracing::info;
use tracing_subscriber::EnvFilter;

// Layer 3: Internal module imports
use niobium_rt::prelude::*;

const KICKOFF: u32 = 1;
const RALLY: u32 = 2;

const PINGER: ScriptId = ScriptId::from_raw(1);
const ECHOER: ScriptId = ScriptId::from_raw(2);

struct Pinger {
    peer: ActorName,
    remaining: u32,
}

impl Behavior for Pinger {
    fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
        match message.tag() {
            KICKOFF => {
                let mut fields = Unpacker::new(message.payload().clone());
                self.peer = fields.actor().unwrap();
                ctx.send(self.peer, RALLY, &Packer::new().u32(self.remaining).finish());
            }
            RALLY => {
                self.remaining -= 1;
                if self.remaining == 0 {
                    info!(actor = %ctx.name(), "rally done");
                    ctx.ask_to_stop(self.peer);
                    ctx.stop();
                } else {
                    ctx.send(self.peer, RALLY, &Packer::new().u32(self.remaining).finish());
                }
            }
            _ => {}
        }
    }
}

struct Echoer;

impl Behavior for Echoer {
    fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
        match message.tag() {
            RALLY => {
                // Bounce the counter straight back through a scratch copy.
                let mut scratch = ctx.scratch_buffer(message.payload_len());
                scratch.copy_from_slice(message.payload());
                ctx.reply(RALLY, &scratch);
            }
            tags::ACTION_ASK_TO_STOP => ctx.stop(),
            _ => {}
        }
    }
}

fn main() -> Result<(), NodeError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut mesh = LoopbackMesh::new(2);
    let transport1 = mesh.pop().unwrap();
    let transport0 = mesh.pop().unwrap();

    let node0 = Node::new(
        NodeConfig::cluster_member(NodeId::from_raw(0), 2, 2),
        Box::new(transport0),
    )?;
    let node1 = Node::new(
        NodeConfig::cluster_member(NodeId::from_raw(1), 2, 2),
        Box::new(transport1),
    )?;

    node0.register_script(Script::new(PINGER, "pinger", || {
        Box::new(Pinger {
            peer: ActorName::NONE,
            remaining: 1000,
        })
    }))?;
    node1.register_script(Script::new(ECHOER, "echoer", || Box::new(Echoer)))?;

    let pinger = node0.spawn(PINGER)?;
    let echoer = node1.spawn(ECHOER)?;
    node0.send(pinger, KICKOFF, &Packer::new().actor(echoer).finish());

    let peer = thread::spawn(move || {
        let mut node1 = node1;
        node1.run().map(|()| node1.metrics())
    });
    let mut node0 = node0;
    node0.run()?;
    let snapshot1 = peer.join().unwrap_or_else(|_| std::process::exit(1))?;

    println!("node 0: {}", node0.metrics().to_json());
    println!("node 1: {}", snapshot1.to_json());
    Ok(())
}
