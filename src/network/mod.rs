//! # Cable Networks
//!
//! A network is one connected component of transmitter nodes. The generic
//! part ([`DynamicNetwork`]) tracks membership and the acceptors reachable
//! from the members; [`EnergyNetwork`] adds pooled storage and per-tick
//! distribution on top of it. Live networks are owned by a
//! [`NetworkRegistry`], which performs every merge and split.

pub mod distribution;
pub mod dynamic;
pub mod energy;
pub mod events;
pub mod registry;

pub use distribution::DrainOutcome;
pub use dynamic::{DynamicNetwork, Network, Transmitter};
pub use energy::{
    EnergyContext, EnergyCore, EnergyNetwork, EnergyNode, EnergyRegistry, TransferTelemetry,
};
pub use events::{
    BroadcastSink, EnergyTransferEvent, NullSink, RecordingSink, TracingSink, TransferEventSink,
};
pub use registry::{NetworkRef, NetworkRegistry};
