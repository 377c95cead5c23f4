use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::debug;

use super::distribution::{self, DrainOutcome};
use super::dynamic::{DynamicNetwork, Network, Transmitter};
use super::events::{EnergyTransferEvent, TracingSink, TransferEventSink};
use super::registry::NetworkRegistry;
use crate::acceptor::{AdapterSet, EnergyAcceptor};
use crate::config::{Config, NetworkSettings, ProtocolSettings};
use crate::domain::NetworkId;

/// Cable node as seen by an energy network
pub type EnergyNode = dyn Transmitter<Acceptor = dyn EnergyAcceptor>;

/// Membership core of an energy network
pub type EnergyCore = DynamicNetwork<EnergyNode, dyn EnergyAcceptor>;

pub type EnergyRegistry = NetworkRegistry<EnergyNetwork>;

static GLOBAL_REGISTRY: Lazy<Arc<EnergyRegistry>> = Lazy::new(|| Arc::new(EnergyRegistry::new()));

/// Everything energy networks in one world share
pub struct EnergyContext {
    pub settings: NetworkSettings,
    pub adapters: AdapterSet,
    pub sink: Arc<dyn TransferEventSink>,
}

impl EnergyContext {
    pub fn new(settings: NetworkSettings, adapters: AdapterSet, sink: Arc<dyn TransferEventSink>) -> Self {
        Self {
            settings,
            adapters,
            sink,
        }
    }

    pub fn from_config(cfg: &Config, sink: Arc<dyn TransferEventSink>) -> Self {
        Self::new(cfg.network.clone(), AdapterSet::standard(&cfg.protocols), sink)
    }
}

impl Default for EnergyContext {
    fn default() -> Self {
        Self::new(
            NetworkSettings::default(),
            AdapterSet::standard(&ProtocolSettings::default()),
            Arc::new(TracingSink),
        )
    }
}

impl fmt::Debug for EnergyContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnergyContext")
            .field("settings", &self.settings)
            .field("adapters", &self.adapters)
            .finish()
    }
}

/// Recent transfer history, carried into the networks that replace this one
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TransferTelemetry {
    pub client_energy_scale: f64,
    pub transmitted_last_tick: f64,
    pub transmitted_this_tick: f64,
    pub last_power_scale: f64,
}

impl TransferTelemetry {
    /// Whether this snapshot should win over `other` when networks combine
    pub fn is_busier_than(&self, other: &TransferTelemetry) -> bool {
        self.transmitted_last_tick > other.transmitted_last_tick
            || self.client_energy_scale > other.client_energy_scale
    }
}

/// Connected component of cables with pooled storage
pub struct EnergyNetwork {
    core: EnergyCore,
    ctx: Arc<EnergyContext>,
    stored: f64,
    telemetry: TransferTelemetry,
}

impl EnergyNetwork {
    /// Fresh network over `nodes`; does not refresh
    pub fn new<I>(ctx: Arc<EnergyContext>, nodes: I) -> Self
    where
        I: IntoIterator<Item = Arc<EnergyNode>>,
    {
        Self::with_id(NetworkId::new(), ctx, nodes)
    }

    pub fn with_id<I>(id: NetworkId, ctx: Arc<EnergyContext>, nodes: I) -> Self
    where
        I: IntoIterator<Item = Arc<EnergyNode>>,
    {
        let mut core = EnergyCore::new(id);
        core.add_all_nodes(nodes);
        Self {
            core,
            ctx,
            stored: 0.0,
            telemetry: TransferTelemetry::default(),
        }
    }

    /// Process-wide registry of live energy networks
    pub fn global_registry() -> Arc<EnergyRegistry> {
        GLOBAL_REGISTRY.clone()
    }

    pub fn id(&self) -> NetworkId {
        self.core.id()
    }

    pub fn context(&self) -> &Arc<EnergyContext> {
        &self.ctx
    }

    pub fn stored(&self) -> f64 {
        self.stored
    }

    pub fn telemetry(&self) -> TransferTelemetry {
        self.telemetry
    }

    /// Overrides the carried telemetry, e.g. when restoring a mirrored view
    pub fn set_telemetry(&mut self, telemetry: TransferTelemetry) {
        self.telemetry = telemetry;
    }

    pub fn capacity(&self) -> f64 {
        self.ctx.settings.cable_capacity * self.core.len() as f64
    }

    /// Room left in storage; mirrored networks never hold energy
    pub fn energy_needed(&self) -> f64 {
        if !self.ctx.settings.side.is_authoritative() || self.core.is_retired() {
            return 0.0;
        }
        (self.capacity() - self.stored).max(0.0)
    }

    /// Stores as much of `amount` as fits and returns the rest
    pub fn receive(&mut self, amount: f64) -> f64 {
        if !(amount > 0.0) {
            return amount.max(0.0);
        }
        let to_use = self.energy_needed().min(amount);
        self.stored += to_use;
        amount - to_use
    }

    /// Acceptors that currently want energy; empty when mirrored
    pub fn compute_acceptors(&self) -> Vec<Arc<dyn EnergyAcceptor>> {
        if !self.ctx.settings.side.is_authoritative() || self.core.is_retired() {
            return Vec::new();
        }
        distribution::compute_acceptors(&self.core, &self.ctx.adapters)
    }

    /// Pushes up to `amount` out to acceptors and returns what was not placed
    pub fn drain(&mut self, amount: f64) -> f64 {
        self.drain_with(amount, &mut rand::thread_rng())
    }

    pub fn drain_with<R>(&mut self, amount: f64, rng: &mut R) -> f64
    where
        R: rand::Rng + ?Sized,
    {
        if !self.ctx.settings.side.is_authoritative() || self.core.is_retired() || !(amount > 0.0) {
            return amount;
        }

        let DrainOutcome {
            remainder,
            absorbed,
            passes,
        } = distribution::distribute(&self.core, &self.ctx.adapters, amount, rng);
        self.telemetry.transmitted_this_tick += absorbed;

        debug!(
            network = %self.core.id(),
            offered = amount,
            absorbed,
            remainder,
            passes,
            "drain complete"
        );
        remainder
    }

    /// Energy moved per second over the last tick
    pub fn power(&self) -> f64 {
        self.telemetry.transmitted_last_tick * self.ctx.settings.ticks_per_second
    }

    /// Coarse 0..1 load indicator: logarithmic in throughput, linear in fill
    pub fn power_scale(&self) -> f64 {
        let throughput = if self.telemetry.transmitted_last_tick == 0.0 {
            0.0
        } else {
            ((self.power().log10() * 2.0).ceil() / 10.0).clamp(0.0, 1.0)
        };
        let capacity = self.capacity();
        let fill = if capacity > 0.0 { self.stored / capacity } else { 0.0 };
        throughput.max(fill)
    }

    /// Stored energy, for display
    pub fn flow(&self) -> f64 {
        self.stored
    }

    /// Storage room, for display
    pub fn needed(&self) -> f64 {
        self.energy_needed()
    }

    /// Records the scale reported by the authority on a mirrored network
    pub fn set_client_energy_scale(&mut self, scale: f64) {
        if scale.is_finite() {
            self.telemetry.client_energy_scale = scale.clamp(0.0, 1.0);
        }
    }

    pub fn client_energy_scale(&self) -> f64 {
        self.telemetry.client_energy_scale
    }

    fn roll_transmitted(&mut self) {
        self.telemetry.transmitted_last_tick = self.telemetry.transmitted_this_tick;
        self.telemetry.transmitted_this_tick = 0.0;
    }

    fn clamp_stored(&mut self) {
        self.stored = self.stored.clamp(0.0, self.capacity());
    }
}

impl Network for EnergyNetwork {
    type Node = EnergyNode;
    type Acceptor = dyn EnergyAcceptor;

    fn core(&self) -> &EnergyCore {
        &self.core
    }

    fn core_mut(&mut self) -> &mut EnergyCore {
        &mut self.core
    }

    /// Inherits telemetry, plus the share of storage the nodes represent
    fn create_from_nodes<I>(&self, id: NetworkId, nodes: I) -> Self
    where
        I: IntoIterator<Item = Arc<EnergyNode>>,
    {
        let nodes: Vec<Arc<EnergyNode>> = nodes.into_iter().collect();
        let portion = if self.core.is_empty() {
            0.0
        } else {
            self.stored * nodes.len() as f64 / self.core.len() as f64
        };

        let mut network = Self::with_id(id, self.ctx.clone(), nodes);
        network.telemetry = self.telemetry;
        network.stored = portion;
        network.clamp_stored();
        network
    }

    /// Adopts the busiest source's telemetry and pools storage
    fn create_from_networks(&self, id: NetworkId, others: &[&Self]) -> Self {
        let mut network = Self::with_id(id, self.ctx.clone(), std::iter::empty());
        let mut telemetry = TransferTelemetry::default();
        let mut stored = 0.0;

        for source in std::iter::once(self).chain(others.iter().copied()) {
            if source.telemetry.is_busier_than(&telemetry) {
                telemetry = source.telemetry;
            }
            stored += source.stored;
            network.core.add_all_nodes(source.core.members().cloned());
        }

        network.telemetry = telemetry;
        network.stored = stored;
        network.clamp_stored();
        network
    }

    fn refresh(&mut self) {
        self.core.refresh();
        self.clamp_stored();
    }

    fn tick(&mut self) {
        if self.core.is_retired() {
            return;
        }

        self.roll_transmitted();
        let current = self.power_scale();

        if !self.ctx.settings.side.is_authoritative() {
            return;
        }

        let last = self.telemetry.last_power_scale;
        let crossed_bound = current != last && (current == 0.0 || current == 1.0);
        if (current - last).abs() > self.ctx.settings.power_scale_threshold || crossed_bound {
            self.core.set_needs_update();
        }
        self.telemetry.last_power_scale = current;

        if self.core.needs_update() {
            self.ctx.sink.publish(EnergyTransferEvent {
                network: self.core.id(),
                power_scale: current,
            });
            self.core.clear_needs_update();
        }

        if self.stored > 0.0 {
            self.stored = self.drain(self.stored);
        }
    }
}

impl fmt::Display for EnergyNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[EnergyNetwork] {} transmitters, {} acceptors.",
            self.core.len(),
            self.core.acceptor_count()
        )
    }
}

impl fmt::Debug for EnergyNetwork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EnergyNetwork")
            .field("core", &self.core)
            .field("stored", &self.stored)
            .field("telemetry", &self.telemetry)
            .finish()
    }
}
