//! # World Simulation
//!
//! Minimal host world for driving cable networks end to end: a sparse block
//! grid, reference consumers for each protocol, and a host that translates
//! block changes into network join, merge, refresh and split calls.
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use cable_grid::config::Config;
//! use cable_grid::network::NullSink;
//! use cable_grid::simulation::{consumers::StrictBattery, BlockPos, GridHost};
//!
//! let host = GridHost::from_config(&Config::default(), Arc::new(NullSink));
//! host.place_cable(BlockPos::new(0, 0, 0));
//! host.place_consumer(BlockPos::new(0, 1, 0), Arc::new(StrictBattery::new(500.0)));
//!
//! host.inject(BlockPos::new(0, 0, 0), 200.0);
//! host.tick();
//! ```

pub mod consumers;
pub mod host;
pub mod world;

pub use consumers::{
    EuMachine, FluxCell, InertBlock, MjEngine, SimulatedLoad, StrictBattery, UeDevice,
    UniversalDevice,
};
pub use host::GridHost;
pub use world::{Block, BlockPos, Cable, World};
