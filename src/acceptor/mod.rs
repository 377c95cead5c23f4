//! # Acceptor Capabilities
//!
//! Neighbors that consume energy speak one of several unrelated transfer
//! protocols. Each protocol is modeled as a capability trait; an acceptor
//! advertises the capabilities it implements through the `as_*` accessors on
//! [`EnergyAcceptor`], and the network reaches them only through the ordered
//! [`AdapterSet`].
//!
//! `side` arguments always name the face of the acceptor that touches the
//! feeding cable.
//!
//! Implementations take `&self` and keep their own interior state, since the
//! same acceptor may be reachable from several networks.

pub mod adapters;

use std::fmt;

use crate::domain::{AcceptorId, Direction};

pub use adapters::{
    AdapterSet, EuAdapter, FluxAdapter, MjAdapter, Protocol, ProtocolAdapter, StrictAdapter,
    UeAdapter,
};

/// Anything a network can record as a reachable acceptor
pub trait Endpoint: Send + Sync {
    fn acceptor_id(&self) -> AcceptorId;
}

/// A neighbor able to take energy through at least zero known protocols.
///
/// Every accessor defaults to `None`; an acceptor exposing none of them is
/// reachable but never fed.
pub trait EnergyAcceptor: Endpoint + fmt::Debug {
    fn as_strict(&self) -> Option<&dyn StrictEnergyAcceptor> {
        None
    }

    fn as_flux(&self) -> Option<&dyn FluxReceiver> {
        None
    }

    fn as_eu(&self) -> Option<&dyn EuSink> {
        None
    }

    fn as_mj(&self) -> Option<&dyn MjReceptor> {
        None
    }

    fn as_ue(&self) -> Option<&dyn UeElectrical> {
        None
    }
}

/// Native protocol, measured in joules
pub trait StrictEnergyAcceptor {
    fn can_receive_energy(&self, side: Direction) -> bool;
    fn energy(&self) -> f64;
    fn max_energy(&self) -> f64;
    /// Offers `amount` joules, returns the rejected part
    fn transfer_energy(&self, side: Direction, amount: f64) -> f64;
}

/// Integer flux units
pub trait FluxReceiver {
    fn can_interface(&self, side: Direction) -> bool;
    fn flux_stored(&self, side: Direction) -> i64;
    fn max_flux_stored(&self, side: Direction) -> i64;
    /// Returns the units accepted (or that would be, when `simulate`)
    fn receive_flux(&self, side: Direction, max_receive: i64, simulate: bool) -> i64;
}

/// Packet-based sinks with a hard per-call input ceiling
pub trait EuSink {
    fn accepts_energy_from(&self, side: Direction) -> bool;
    fn demanded_units(&self) -> f64;
    fn max_safe_input(&self) -> f64;
    /// Injects `amount` units, returns the leftover
    fn inject_units(&self, side: Direction, amount: f64) -> f64;
}

/// Request-based receivers that may not expose every face
pub trait MjReceptor {
    fn has_receiver(&self, side: Direction) -> bool;
    fn power_request(&self, side: Direction) -> f64;
    /// Returns the amount actually used
    fn receive_mj(&self, side: Direction, amount: f64) -> f64;
}

/// Watt/voltage based electrical devices
pub trait UeElectrical {
    fn can_connect(&self, side: Direction) -> bool;
    /// Outstanding request, in watts
    fn request(&self, side: Direction) -> f64;
    fn voltage(&self) -> f64;
    /// Returns the watts used; with `do_receive == false` nothing is stored
    fn receive_electricity(&self, side: Direction, watts: f64, voltage: f64, do_receive: bool) -> f64;
}
