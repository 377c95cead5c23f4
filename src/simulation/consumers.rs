//! # Consumer Blocks
//!
//! Reference acceptors for each transfer protocol. Each keeps its buffer
//! behind a lock so the same block can be fed from several networks.

use parking_lot::Mutex;

use crate::acceptor::{
    Endpoint, EnergyAcceptor, EuSink, FluxReceiver, MjReceptor, StrictEnergyAcceptor, UeElectrical,
};
use crate::domain::{AcceptorId, Direction};

/// Consumers that burn part of their buffer every simulation step
pub trait SimulatedLoad: Send + Sync {
    /// Removes `fraction` (0..1) of the current buffer and returns the amount
    /// consumed, in the consumer's own unit
    fn consume_fraction(&self, fraction: f64) -> f64;
}

fn drain_fraction(buffer: &Mutex<f64>, fraction: f64) -> f64 {
    let mut stored = buffer.lock();
    let used = *stored * fraction.clamp(0.0, 1.0);
    *stored -= used;
    used
}

// ============================================================================
// Strict (joules)
// ============================================================================

#[derive(Debug)]
pub struct StrictBattery {
    id: AcceptorId,
    capacity: f64,
    stored: Mutex<f64>,
    blocked_side: Option<Direction>,
}

impl StrictBattery {
    pub fn new(capacity: f64) -> Self {
        Self {
            id: AcceptorId::new(),
            capacity,
            stored: Mutex::new(0.0),
            blocked_side: None,
        }
    }

    /// Refuses energy entering through `side`
    pub fn with_blocked_side(mut self, side: Direction) -> Self {
        self.blocked_side = Some(side);
        self
    }

    /// Loads energy directly, bypassing side checks; returns the rejected part
    pub fn fill(&self, amount: f64) -> f64 {
        let mut stored = self.stored.lock();
        let taken = amount.min(self.capacity - *stored).max(0.0);
        *stored += taken;
        amount - taken
    }

    pub fn stored(&self) -> f64 {
        *self.stored.lock()
    }

    pub fn capacity(&self) -> f64 {
        self.capacity
    }
}

impl Endpoint for StrictBattery {
    fn acceptor_id(&self) -> AcceptorId {
        self.id
    }
}

impl EnergyAcceptor for StrictBattery {
    fn as_strict(&self) -> Option<&dyn StrictEnergyAcceptor> {
        Some(self)
    }
}

impl StrictEnergyAcceptor for StrictBattery {
    fn can_receive_energy(&self, side: Direction) -> bool {
        self.blocked_side != Some(side)
    }

    fn energy(&self) -> f64 {
        self.stored()
    }

    fn max_energy(&self) -> f64 {
        self.capacity
    }

    fn transfer_energy(&self, side: Direction, amount: f64) -> f64 {
        if !self.can_receive_energy(side) {
            return amount;
        }
        self.fill(amount)
    }
}

impl SimulatedLoad for StrictBattery {
    fn consume_fraction(&self, fraction: f64) -> f64 {
        drain_fraction(&self.stored, fraction)
    }
}

// ============================================================================
// Flux (integer units)
// ============================================================================

#[derive(Debug)]
pub struct FluxCell {
    id: AcceptorId,
    max_flux: i64,
    flux: Mutex<i64>,
}

impl FluxCell {
    pub fn new(max_flux: i64) -> Self {
        Self {
            id: AcceptorId::new(),
            max_flux,
            flux: Mutex::new(0),
        }
    }

    pub fn flux(&self) -> i64 {
        *self.flux.lock()
    }
}

impl Endpoint for FluxCell {
    fn acceptor_id(&self) -> AcceptorId {
        self.id
    }
}

impl EnergyAcceptor for FluxCell {
    fn as_flux(&self) -> Option<&dyn FluxReceiver> {
        Some(self)
    }
}

impl FluxReceiver for FluxCell {
    fn can_interface(&self, _side: Direction) -> bool {
        true
    }

    fn flux_stored(&self, _side: Direction) -> i64 {
        self.flux()
    }

    fn max_flux_stored(&self, _side: Direction) -> i64 {
        self.max_flux
    }

    fn receive_flux(&self, _side: Direction, max_receive: i64, simulate: bool) -> i64 {
        let mut flux = self.flux.lock();
        let accepted = max_receive.min(self.max_flux - *flux).max(0);
        if !simulate {
            *flux += accepted;
        }
        accepted
    }
}

impl SimulatedLoad for FluxCell {
    fn consume_fraction(&self, fraction: f64) -> f64 {
        let mut flux = self.flux.lock();
        let used = (*flux as f64 * fraction.clamp(0.0, 1.0)).floor() as i64;
        *flux -= used;
        used as f64
    }
}

// ============================================================================
// EU (packets with an input ceiling)
// ============================================================================

#[derive(Debug)]
pub struct EuMachine {
    id: AcceptorId,
    capacity_units: f64,
    max_safe_input: f64,
    stored: Mutex<f64>,
}

impl EuMachine {
    pub fn new(capacity_units: f64, max_safe_input: f64) -> Self {
        Self {
            id: AcceptorId::new(),
            capacity_units,
            max_safe_input,
            stored: Mutex::new(0.0),
        }
    }

    pub fn stored_units(&self) -> f64 {
        *self.stored.lock()
    }
}

impl Endpoint for EuMachine {
    fn acceptor_id(&self) -> AcceptorId {
        self.id
    }
}

impl EnergyAcceptor for EuMachine {
    fn as_eu(&self) -> Option<&dyn EuSink> {
        Some(self)
    }
}

impl EuSink for EuMachine {
    fn accepts_energy_from(&self, _side: Direction) -> bool {
        true
    }

    fn demanded_units(&self) -> f64 {
        (self.capacity_units - self.stored_units()).max(0.0)
    }

    fn max_safe_input(&self) -> f64 {
        self.max_safe_input
    }

    fn inject_units(&self, _side: Direction, amount: f64) -> f64 {
        let mut stored = self.stored.lock();
        let taken = amount.min(self.capacity_units - *stored).max(0.0);
        *stored += taken;
        amount - taken
    }
}

impl SimulatedLoad for EuMachine {
    fn consume_fraction(&self, fraction: f64) -> f64 {
        drain_fraction(&self.stored, fraction)
    }
}

// ============================================================================
// MJ (request based)
// ============================================================================

#[derive(Debug)]
pub struct MjEngine {
    id: AcceptorId,
    capacity: f64,
    stored: Mutex<f64>,
    receiver_side: Option<Direction>,
}

impl MjEngine {
    pub fn new(capacity: f64) -> Self {
        Self {
            id: AcceptorId::new(),
            capacity,
            stored: Mutex::new(0.0),
            receiver_side: None,
        }
    }

    /// Exposes a receiver on `side` only
    pub fn with_receiver_on(mut self, side: Direction) -> Self {
        self.receiver_side = Some(side);
        self
    }

    pub fn stored_mj(&self) -> f64 {
        *self.stored.lock()
    }
}

impl Endpoint for MjEngine {
    fn acceptor_id(&self) -> AcceptorId {
        self.id
    }
}

impl EnergyAcceptor for MjEngine {
    fn as_mj(&self) -> Option<&dyn MjReceptor> {
        Some(self)
    }
}

impl MjReceptor for MjEngine {
    fn has_receiver(&self, side: Direction) -> bool {
        self.receiver_side.map_or(true, |only| only == side)
    }

    fn power_request(&self, side: Direction) -> f64 {
        if !self.has_receiver(side) {
            return 0.0;
        }
        (self.capacity - self.stored_mj()).max(0.0)
    }

    fn receive_mj(&self, side: Direction, amount: f64) -> f64 {
        if !self.has_receiver(side) {
            return 0.0;
        }
        let mut stored = self.stored.lock();
        let used = amount.min(self.capacity - *stored).max(0.0);
        *stored += used;
        used
    }
}

impl SimulatedLoad for MjEngine {
    fn consume_fraction(&self, fraction: f64) -> f64 {
        drain_fraction(&self.stored, fraction)
    }
}

// ============================================================================
// UE (watts at a voltage)
// ============================================================================

#[derive(Debug)]
pub struct UeDevice {
    id: AcceptorId,
    capacity_watts: f64,
    voltage: f64,
    stored: Mutex<f64>,
    last_voltage: Mutex<f64>,
}

impl UeDevice {
    /// Device without a voltage preference
    pub fn new(capacity_watts: f64) -> Self {
        Self {
            id: AcceptorId::new(),
            capacity_watts,
            voltage: 0.0,
            stored: Mutex::new(0.0),
            last_voltage: Mutex::new(0.0),
        }
    }

    pub fn with_voltage(mut self, voltage: f64) -> Self {
        self.voltage = voltage;
        self
    }

    pub fn stored_watts(&self) -> f64 {
        *self.stored.lock()
    }

    /// Voltage of the most recent delivery; 0 before any
    pub fn last_voltage(&self) -> f64 {
        *self.last_voltage.lock()
    }
}

impl Endpoint for UeDevice {
    fn acceptor_id(&self) -> AcceptorId {
        self.id
    }
}

impl EnergyAcceptor for UeDevice {
    fn as_ue(&self) -> Option<&dyn UeElectrical> {
        Some(self)
    }
}

impl UeElectrical for UeDevice {
    fn can_connect(&self, _side: Direction) -> bool {
        true
    }

    fn request(&self, _side: Direction) -> f64 {
        (self.capacity_watts - self.stored_watts()).max(0.0)
    }

    fn voltage(&self) -> f64 {
        self.voltage
    }

    fn receive_electricity(&self, _side: Direction, watts: f64, voltage: f64, do_receive: bool) -> f64 {
        let mut stored = self.stored.lock();
        let used = watts.min(self.capacity_watts - *stored).max(0.0);
        if do_receive {
            *stored += used;
            *self.last_voltage.lock() = voltage;
        }
        used
    }
}

impl SimulatedLoad for UeDevice {
    fn consume_fraction(&self, fraction: f64) -> f64 {
        drain_fraction(&self.stored, fraction)
    }
}

// ============================================================================
// Multi-protocol and inert blocks
// ============================================================================

/// Machine with a joule port and an EU port feeding separate buffers
#[derive(Debug)]
pub struct UniversalDevice {
    id: AcceptorId,
    capacity: f64,
    joules: Mutex<f64>,
    units: Mutex<f64>,
}

impl UniversalDevice {
    pub fn new(capacity: f64) -> Self {
        Self {
            id: AcceptorId::new(),
            capacity,
            joules: Mutex::new(0.0),
            units: Mutex::new(0.0),
        }
    }

    pub fn joules(&self) -> f64 {
        *self.joules.lock()
    }

    pub fn units(&self) -> f64 {
        *self.units.lock()
    }
}

impl Endpoint for UniversalDevice {
    fn acceptor_id(&self) -> AcceptorId {
        self.id
    }
}

impl EnergyAcceptor for UniversalDevice {
    fn as_strict(&self) -> Option<&dyn StrictEnergyAcceptor> {
        Some(self)
    }

    fn as_eu(&self) -> Option<&dyn EuSink> {
        Some(self)
    }
}

impl StrictEnergyAcceptor for UniversalDevice {
    fn can_receive_energy(&self, _side: Direction) -> bool {
        true
    }

    fn energy(&self) -> f64 {
        self.joules()
    }

    fn max_energy(&self) -> f64 {
        self.capacity
    }

    fn transfer_energy(&self, _side: Direction, amount: f64) -> f64 {
        let mut joules = self.joules.lock();
        let taken = amount.min(self.capacity - *joules).max(0.0);
        *joules += taken;
        amount - taken
    }
}

impl EuSink for UniversalDevice {
    fn accepts_energy_from(&self, _side: Direction) -> bool {
        true
    }

    fn demanded_units(&self) -> f64 {
        (self.capacity - self.units()).max(0.0)
    }

    fn max_safe_input(&self) -> f64 {
        f64::MAX
    }

    fn inject_units(&self, _side: Direction, amount: f64) -> f64 {
        let mut units = self.units.lock();
        let taken = amount.min(self.capacity - *units).max(0.0);
        *units += taken;
        amount - taken
    }
}

/// Block that sits next to cables but speaks no protocol
#[derive(Debug, Default)]
pub struct InertBlock {
    id: AcceptorId,
}

impl InertBlock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Endpoint for InertBlock {
    fn acceptor_id(&self) -> AcceptorId {
        self.id
    }
}

impl EnergyAcceptor for InertBlock {}
