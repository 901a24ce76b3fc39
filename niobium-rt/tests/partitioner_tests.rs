//! A sequence-partitioner handshake driven end to end: block-sized store
//! counts distributed over a fixed number of stores.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

// Layer 1: Standard library imports
use std::sync::{Arc, Mutex};

// Layer 2: Third-party crate imports
// (none)

// Layer 3: Internal module imports
use niobium_rt::prelude::*;

const KICKOFF: u32 = 1;
const SET_BLOCK_SIZE: u32 = 10;
const SET_ENTRY_VECTOR: u32 = 11;
const SET_ACTOR_COUNT: u32 = 12;
const PROVIDE_STORE_ENTRY_COUNTS: u32 = 13;

const PARTITIONER: ScriptId = ScriptId::from_raw(1);
const DRIVER: ScriptId = ScriptId::from_raw(2);

/// Splits a total entry count into block-sized store shares: every store
/// but the last gets a full block while entries remain.
struct Partitioner {
    block_size: Option<u32>,
    entries: Option<Vec<u32>>,
    stores: Option<u32>,
}

impl Partitioner {
    fn try_provide(&self, ctx: &mut ActorContext<'_>) {
        let (Some(block), Some(entries), Some(stores)) =
            (self.block_size, self.entries.as_ref(), self.stores)
        else {
            return;
        };
        let mut remaining: u64 = entries.iter().map(|e| u64::from(*e)).sum();
        let mut counts = Vec::with_capacity(stores as usize);
        for _ in 0..stores {
            let share = remaining.min(u64::from(block)) as u32;
            counts.push(share);
            remaining -= u64::from(share);
        }
        ctx.reply(
            PROVIDE_STORE_ENTRY_COUNTS,
            &Packer::new().u32_slice(&counts).finish(),
        );
    }
}

impl Behavior for Partitioner {
    fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
        let mut fields = Unpacker::new(message.payload().clone());
        match message.tag() {
            SET_BLOCK_SIZE => self.block_size = Some(fields.u32().unwrap()),
            SET_ENTRY_VECTOR => self.entries = Some(fields.u32_vec().unwrap()),
            SET_ACTOR_COUNT => self.stores = Some(fields.u32().unwrap()),
            tags::ACTION_ASK_TO_STOP => {
                ctx.stop();
                return;
            }
            _ => return,
        }
        self.try_provide(ctx);
    }
}

struct Driver {
    partitioner: ActorName,
    counts: Arc<Mutex<Vec<u32>>>,
}

impl Behavior for Driver {
    fn receive(&mut self, message: &Envelope, ctx: &mut ActorContext<'_>) {
        match message.tag() {
            KICKOFF => {
                let mut fields = Unpacker::new(message.payload().clone());
                self.partitioner = fields.actor().unwrap();
                ctx.send(
                    self.partitioner,
                    SET_BLOCK_SIZE,
                    &Packer::new().u32(4096).finish(),
                );
                ctx.send(
                    self.partitioner,
                    SET_ENTRY_VECTOR,
                    &Packer::new().u32_slice(&[10000]).finish(),
                );
                ctx.send(
                    self.partitioner,
                    SET_ACTOR_COUNT,
                    &Packer::new().u32(3).finish(),
                );
            }
            PROVIDE_STORE_ENTRY_COUNTS => {
                let mut fields = Unpacker::new(message.payload().clone());
                *self.counts.lock().unwrap() = fields.u32_vec().unwrap();
                ctx.ask_to_stop(self.partitioner);
                ctx.stop();
            }
            _ => {}
        }
    }
}

#[test]
fn test_partitioner_handshake() {
    let transport = LoopbackMesh::new(1).pop().unwrap();
    let mut node = Node::new(NodeConfig::single_node(2), Box::new(transport)).unwrap();

    node.register_script(Script::new(PARTITIONER, "partitioner", || {
        Box::new(Partitioner {
            block_size: None,
            entries: None,
            stores: None,
        })
    }))
    .unwrap();

    let counts = Arc::new(Mutex::new(Vec::new()));
    let provided = Arc::clone(&counts);
    node.register_script(Script::new(DRIVER, "driver", move || {
        Box::new(Driver {
            partitioner: ActorName::NONE,
            counts: Arc::clone(&provided),
        })
    }))
    .unwrap();

    let partitioner = node.spawn(PARTITIONER).unwrap();
    let driver = node.spawn(DRIVER).unwrap();
    node.send(driver, KICKOFF, &Packer::new().actor(partitioner).finish());
    node.run().unwrap();

    // 10000 entries over 3 stores with 4096-entry blocks.
    let counts = counts.lock().unwrap();
    assert_eq!(*counts, vec![4096, 4096, 1808]);
    assert_eq!(counts.iter().map(|c| u64::from(*c)).sum::<u64>(), 10000);
    assert_eq!(counts[0], 4096);
    assert_eq!(counts[1], 4096);
}
