pub mod acceptor;
pub mod config;
pub mod domain;
pub mod network;
pub mod simulation;
pub mod telemetry;
