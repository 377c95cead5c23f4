//! # Grid Host
//!
//! Plays the role of the game world's change notifier: every block placed or
//! removed is turned into the matching network operation (join, merge,
//! refresh or split).

use std::sync::Arc;

use tracing::debug;

use super::world::{Block, BlockPos, Cable, World};
use crate::acceptor::EnergyAcceptor;
use crate::config::Config;
use crate::domain::NetworkId;
use crate::network::{
    EnergyContext, EnergyNetwork, EnergyNode, EnergyRegistry, Network, NetworkRef, Transmitter,
    TransferEventSink,
};

pub struct GridHost {
    world: Arc<World>,
    registry: Arc<EnergyRegistry>,
    ctx: Arc<EnergyContext>,
}

impl GridHost {
    pub fn new(world: Arc<World>, registry: Arc<EnergyRegistry>, ctx: Arc<EnergyContext>) -> Self {
        Self { world, registry, ctx }
    }

    /// Empty world with its own registry
    pub fn from_config(cfg: &Config, sink: Arc<dyn TransferEventSink>) -> Self {
        Self::new(
            World::new(),
            Arc::new(EnergyRegistry::new()),
            Arc::new(EnergyContext::from_config(cfg, sink)),
        )
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    pub fn registry(&self) -> &Arc<EnergyRegistry> {
        &self.registry
    }

    pub fn context(&self) -> &Arc<EnergyContext> {
        &self.ctx
    }

    /// Lays a cable and attaches it to the networks it touches, merging them
    /// when it bridges more than one
    pub fn place_cable(&self, pos: BlockPos) -> Arc<Cable> {
        if self.world.block_at(pos).is_some() {
            self.remove(pos);
        }

        let cable = self.world.place_cable(pos);
        let node: Arc<EnergyNode> = cable.clone();
        let neighbors: Vec<Arc<EnergyNode>> = self
            .world
            .adjacent_cables(pos)
            .into_iter()
            .map(|(_, c)| c as Arc<EnergyNode>)
            .collect();

        let ctx = self.ctx.clone();
        let network = self
            .registry
            .join(vec![node], &neighbors, |nodes| EnergyNetwork::new(ctx, nodes));
        debug!(network = %network.lock().id(), pos = %pos, "cable joined");

        cable
    }

    /// Puts a consumer next to (or away from) cables and refreshes whatever
    /// networks can now see it
    pub fn place_consumer(&self, pos: BlockPos, consumer: Arc<dyn EnergyAcceptor>) {
        if self.world.block_at(pos).is_some() {
            self.remove(pos);
        }
        self.world.place_consumer(pos, consumer);
        self.refresh_around(pos);
    }

    /// Clears a block; removing a cable splits its network
    pub fn remove(&self, pos: BlockPos) -> Option<Block> {
        let removed = self.world.remove(pos)?;
        match &removed {
            Block::Cable(cable) => {
                if let Some(network) = cable.network() {
                    let parts = self.registry.split(network, cable.node_id());
                    debug!(network = %network, pos = %pos, parts = parts.len(), "cable removed");
                }
            }
            Block::Consumer(_) => self.refresh_around(pos),
        }
        Some(removed)
    }

    pub fn network_of(&self, pos: BlockPos) -> Option<NetworkRef<EnergyNetwork>> {
        let cable = self.world.cable_at(pos)?;
        self.registry.network_of(&*cable)
    }

    /// Stores energy in the network under `pos`; returns what did not fit
    pub fn inject(&self, pos: BlockPos, amount: f64) -> f64 {
        match self.network_of(pos) {
            Some(handle) => handle.lock().receive(amount),
            None => amount,
        }
    }

    pub fn tick(&self) {
        self.registry.tick_all();
    }

    fn networks_around(&self, pos: BlockPos) -> Vec<NetworkId> {
        let mut ids = Vec::new();
        for (_, cable) in self.world.adjacent_cables(pos) {
            if let Some(id) = cable.network() {
                if !ids.contains(&id) {
                    ids.push(id);
                }
            }
        }
        ids
    }

    fn refresh_around(&self, pos: BlockPos) {
        for id in self.networks_around(pos) {
            if let Some(handle) = self.registry.get(id) {
                handle.lock().refresh();
            }
        }
    }
}

impl std::fmt::Debug for GridHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GridHost")
            .field("world", &self.world)
            .field("registry", &self.registry)
            .finish()
    }
}
