use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter};

use super::EnergyAcceptor;
use crate::config::ProtocolSettings;
use crate::domain::Direction;

/// Transfer protocols known to the network, in dispatch priority order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[strum(serialize_all = "lowercase")]
pub enum Protocol {
    Strict,
    Flux,
    Eu,
    Mj,
    Ue,
}

/// Uniform contract over one acceptor protocol.
///
/// All quantities crossing this boundary are joules; adapters convert to and
/// from the protocol's own unit.
pub trait ProtocolAdapter: Send + Sync {
    fn protocol(&self) -> Protocol;

    fn recognizes(&self, neighbor: &dyn EnergyAcceptor) -> bool;

    fn accepts(&self, neighbor: &dyn EnergyAcceptor, side: Direction) -> bool;

    /// Outstanding demand in joules, `0.0` when unrecognized
    fn current_demand(&self, neighbor: &dyn EnergyAcceptor, side: Direction) -> f64;

    /// Offers `offered` joules and returns how many were absorbed
    fn push(&self, neighbor: &dyn EnergyAcceptor, side: Direction, offered: f64) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct StrictAdapter;

impl ProtocolAdapter for StrictAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Strict
    }

    fn recognizes(&self, neighbor: &dyn EnergyAcceptor) -> bool {
        neighbor.as_strict().is_some()
    }

    fn accepts(&self, neighbor: &dyn EnergyAcceptor, side: Direction) -> bool {
        neighbor.as_strict().is_some_and(|h| h.can_receive_energy(side))
    }

    fn current_demand(&self, neighbor: &dyn EnergyAcceptor, _side: Direction) -> f64 {
        neighbor
            .as_strict()
            .map(|h| h.max_energy() - h.energy())
            .unwrap_or(0.0)
    }

    fn push(&self, neighbor: &dyn EnergyAcceptor, side: Direction, offered: f64) -> f64 {
        match neighbor.as_strict() {
            Some(h) => offered - h.transfer_energy(side, offered),
            None => 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FluxAdapter {
    to_flux: f64,
    from_flux: f64,
}

impl FluxAdapter {
    pub fn new(settings: &ProtocolSettings) -> Self {
        Self {
            to_flux: settings.to_flux,
            from_flux: settings.from_flux(),
        }
    }
}

impl ProtocolAdapter for FluxAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Flux
    }

    fn recognizes(&self, neighbor: &dyn EnergyAcceptor) -> bool {
        neighbor.as_flux().is_some()
    }

    fn accepts(&self, neighbor: &dyn EnergyAcceptor, side: Direction) -> bool {
        neighbor.as_flux().is_some_and(|h| h.can_interface(side))
    }

    fn current_demand(&self, neighbor: &dyn EnergyAcceptor, side: Direction) -> f64 {
        neighbor
            .as_flux()
            .map(|h| (h.max_flux_stored(side) - h.flux_stored(side)) as f64 * self.from_flux)
            .unwrap_or(0.0)
    }

    fn push(&self, neighbor: &dyn EnergyAcceptor, side: Direction, offered: f64) -> f64 {
        let Some(h) = neighbor.as_flux() else {
            return 0.0;
        };
        // Whole units only; flooring never hands out more than was offered.
        let units = (offered * self.to_flux).floor() as i64;
        if units <= 0 {
            return 0.0;
        }
        h.receive_flux(side, units, false) as f64 * self.from_flux
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EuAdapter {
    to_eu: f64,
    from_eu: f64,
}

impl EuAdapter {
    pub fn new(settings: &ProtocolSettings) -> Self {
        Self {
            to_eu: settings.to_eu,
            from_eu: settings.from_eu(),
        }
    }
}

impl ProtocolAdapter for EuAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Eu
    }

    fn recognizes(&self, neighbor: &dyn EnergyAcceptor) -> bool {
        neighbor.as_eu().is_some()
    }

    fn accepts(&self, neighbor: &dyn EnergyAcceptor, side: Direction) -> bool {
        neighbor.as_eu().is_some_and(|h| h.accepts_energy_from(side))
    }

    fn current_demand(&self, neighbor: &dyn EnergyAcceptor, _side: Direction) -> f64 {
        neighbor
            .as_eu()
            .map(|h| h.demanded_units().min(h.max_safe_input()) * self.from_eu)
            .unwrap_or(0.0)
    }

    fn push(&self, neighbor: &dyn EnergyAcceptor, side: Direction, offered: f64) -> f64 {
        let Some(h) = neighbor.as_eu() else {
            return 0.0;
        };
        let to_send = offered
            .min(h.max_safe_input() * self.from_eu)
            .min(h.demanded_units() * self.from_eu);
        if to_send <= 0.0 {
            return 0.0;
        }
        to_send - h.inject_units(side, to_send * self.to_eu) * self.from_eu
    }
}

/// Feeds request-based receivers; disabled installs recognize nothing.
#[derive(Debug, Clone, Copy)]
pub struct MjAdapter {
    enabled: bool,
    to_mj: f64,
    from_mj: f64,
}

impl MjAdapter {
    pub fn new(settings: &ProtocolSettings) -> Self {
        Self {
            enabled: settings.mj_enabled,
            to_mj: settings.to_mj,
            from_mj: settings.from_mj(),
        }
    }
}

impl ProtocolAdapter for MjAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Mj
    }

    fn recognizes(&self, neighbor: &dyn EnergyAcceptor) -> bool {
        self.enabled && neighbor.as_mj().is_some()
    }

    fn accepts(&self, neighbor: &dyn EnergyAcceptor, side: Direction) -> bool {
        self.enabled && neighbor.as_mj().is_some_and(|h| h.has_receiver(side))
    }

    fn current_demand(&self, neighbor: &dyn EnergyAcceptor, side: Direction) -> f64 {
        if !self.accepts(neighbor, side) {
            return 0.0;
        }
        neighbor
            .as_mj()
            .map(|h| h.power_request(side) * self.from_mj)
            .unwrap_or(0.0)
    }

    fn push(&self, neighbor: &dyn EnergyAcceptor, side: Direction, offered: f64) -> f64 {
        if !self.accepts(neighbor, side) {
            return 0.0;
        }
        let Some(h) = neighbor.as_mj() else {
            return 0.0;
        };
        let to_send = h.power_request(side).min(offered * self.to_mj);
        h.receive_mj(side, to_send) * self.from_mj
    }
}

#[derive(Debug, Clone, Copy)]
pub struct UeAdapter {
    to_ue: f64,
    from_ue: f64,
    voltage: f64,
}

impl UeAdapter {
    pub fn new(settings: &ProtocolSettings) -> Self {
        Self {
            to_ue: settings.to_ue,
            from_ue: settings.from_ue(),
            voltage: settings.ue_voltage,
        }
    }
}

impl ProtocolAdapter for UeAdapter {
    fn protocol(&self) -> Protocol {
        Protocol::Ue
    }

    fn recognizes(&self, neighbor: &dyn EnergyAcceptor) -> bool {
        neighbor.as_ue().is_some()
    }

    fn accepts(&self, neighbor: &dyn EnergyAcceptor, side: Direction) -> bool {
        neighbor.as_ue().is_some_and(|h| h.can_connect(side))
    }

    fn current_demand(&self, neighbor: &dyn EnergyAcceptor, side: Direction) -> f64 {
        neighbor
            .as_ue()
            .map(|h| h.request(side) * self.from_ue)
            .unwrap_or(0.0)
    }

    fn push(&self, neighbor: &dyn EnergyAcceptor, side: Direction, offered: f64) -> f64 {
        let Some(h) = neighbor.as_ue() else {
            return 0.0;
        };
        let to_send = offered.min(h.request(side) * self.from_ue);
        if to_send <= 0.0 {
            return 0.0;
        }
        let voltage = if h.voltage() > 0.0 { h.voltage() } else { self.voltage };
        h.receive_electricity(side, to_send * self.to_ue, voltage, true) * self.from_ue
    }
}

/// Ordered list of protocol adapters.
///
/// The first adapter that recognizes a neighbor handles it exclusively, so a
/// neighbor speaking two protocols is never fed twice in one pass.
pub struct AdapterSet {
    adapters: Vec<Box<dyn ProtocolAdapter>>,
}

impl AdapterSet {
    pub fn new(adapters: Vec<Box<dyn ProtocolAdapter>>) -> Self {
        Self { adapters }
    }

    /// Strict, Flux, Eu, Mj, Ue
    pub fn standard(settings: &ProtocolSettings) -> Self {
        Self::new(vec![
            Box::new(StrictAdapter),
            Box::new(FluxAdapter::new(settings)),
            Box::new(EuAdapter::new(settings)),
            Box::new(MjAdapter::new(settings)),
            Box::new(UeAdapter::new(settings)),
        ])
    }

    pub fn resolve(&self, neighbor: &dyn EnergyAcceptor) -> Option<&dyn ProtocolAdapter> {
        self.adapters
            .iter()
            .find(|a| a.recognizes(neighbor))
            .map(|a| &**a)
    }

    pub fn protocols(&self) -> Vec<Protocol> {
        self.adapters.iter().map(|a| a.protocol()).collect()
    }
}

impl std::fmt::Debug for AdapterSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdapterSet")
            .field("protocols", &self.protocols())
            .finish()
    }
}
