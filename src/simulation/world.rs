//! # Block World
//!
//! Sparse grid of cable and consumer blocks. Cables are the network's
//! transmitter nodes; every other block is a potential acceptor.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use strum::IntoEnumIterator;

use crate::acceptor::EnergyAcceptor;
use crate::domain::{Direction, NetworkId, NodeId};
use crate::network::Transmitter;

/// Integer block coordinate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl BlockPos {
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    pub fn offset(self, direction: Direction) -> Self {
        let (dx, dy, dz) = direction.offset();
        Self::new(self.x + dx, self.y + dy, self.z + dz)
    }
}

impl fmt::Display for BlockPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// Occupant of one grid cell
#[derive(Clone)]
pub enum Block {
    Cable(Arc<Cable>),
    Consumer(Arc<dyn EnergyAcceptor>),
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Block::Cable(cable) => f.debug_tuple("Cable").field(&cable.pos()).finish(),
            Block::Consumer(consumer) => f.debug_tuple("Consumer").field(consumer).finish(),
        }
    }
}

/// A conductive segment placed in the world
pub struct Cable {
    id: NodeId,
    pos: BlockPos,
    valid: AtomicBool,
    network: Mutex<Option<NetworkId>>,
    world: Weak<World>,
}

impl Cable {
    fn new(pos: BlockPos, world: Weak<World>) -> Self {
        Self {
            id: NodeId::new(),
            pos,
            valid: AtomicBool::new(true),
            network: Mutex::new(None),
            world,
        }
    }

    pub fn pos(&self) -> BlockPos {
        self.pos
    }

    fn invalidate(&self) {
        self.valid.store(false, Ordering::Release);
    }
}

impl Transmitter for Cable {
    type Acceptor = dyn EnergyAcceptor;

    fn node_id(&self) -> NodeId {
        self.id
    }

    fn is_valid(&self) -> bool {
        self.valid.load(Ordering::Acquire) && self.world.strong_count() > 0
    }

    fn network(&self) -> Option<NetworkId> {
        *self.network.lock()
    }

    fn set_network(&self, network: Option<NetworkId>) {
        *self.network.lock() = network;
    }

    fn neighbor_acceptors(&self) -> Vec<(Direction, Arc<dyn EnergyAcceptor>)> {
        let Some(world) = self.world.upgrade() else {
            return Vec::new();
        };
        Direction::iter()
            .filter_map(|dir| world.consumer_at(self.pos.offset(dir)).map(|c| (dir, c)))
            .collect()
    }

    fn adjacent_nodes(&self) -> Vec<NodeId> {
        let Some(world) = self.world.upgrade() else {
            return Vec::new();
        };
        Direction::iter()
            .filter_map(|dir| world.cable_at(self.pos.offset(dir)))
            .map(|cable| cable.node_id())
            .collect()
    }
}

impl fmt::Debug for Cable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cable")
            .field("id", &self.id)
            .field("pos", &self.pos)
            .field("valid", &self.valid.load(Ordering::Relaxed))
            .field("network", &self.network())
            .finish()
    }
}

/// Host world. Cables keep a weak handle back to it for neighbor lookups.
pub struct World {
    blocks: RwLock<HashMap<BlockPos, Block>>,
    this: Weak<World>,
}

impl World {
    pub fn new() -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            blocks: RwLock::new(HashMap::new()),
            this: this.clone(),
        })
    }

    /// Lays a cable at `pos`, replacing whatever was there
    pub fn place_cable(&self, pos: BlockPos) -> Arc<Cable> {
        let cable = Arc::new(Cable::new(pos, self.this.clone()));
        let previous = self.blocks.write().insert(pos, Block::Cable(cable.clone()));
        if let Some(Block::Cable(old)) = previous {
            old.invalidate();
        }
        cable
    }

    /// Puts a consumer at `pos`, replacing whatever was there
    pub fn place_consumer(&self, pos: BlockPos, consumer: Arc<dyn EnergyAcceptor>) -> Option<Block> {
        let previous = self.blocks.write().insert(pos, Block::Consumer(consumer));
        if let Some(Block::Cable(old)) = &previous {
            old.invalidate();
        }
        previous
    }

    /// Clears `pos`; a removed cable becomes invalid
    pub fn remove(&self, pos: BlockPos) -> Option<Block> {
        let previous = self.blocks.write().remove(&pos);
        if let Some(Block::Cable(old)) = &previous {
            old.invalidate();
        }
        previous
    }

    pub fn block_at(&self, pos: BlockPos) -> Option<Block> {
        self.blocks.read().get(&pos).cloned()
    }

    pub fn cable_at(&self, pos: BlockPos) -> Option<Arc<Cable>> {
        match self.blocks.read().get(&pos) {
            Some(Block::Cable(cable)) => Some(cable.clone()),
            _ => None,
        }
    }

    pub fn consumer_at(&self, pos: BlockPos) -> Option<Arc<dyn EnergyAcceptor>> {
        match self.blocks.read().get(&pos) {
            Some(Block::Consumer(consumer)) => Some(consumer.clone()),
            _ => None,
        }
    }

    /// Cables directly touching `pos`
    pub fn adjacent_cables(&self, pos: BlockPos) -> Vec<(Direction, Arc<Cable>)> {
        Direction::iter()
            .filter_map(|dir| self.cable_at(pos.offset(dir)).map(|c| (dir, c)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.blocks.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.read().is_empty()
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World").field("blocks", &self.len()).finish()
    }
}
