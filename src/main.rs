use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use cable_grid::acceptor::EnergyAcceptor;
use cable_grid::network::{BroadcastSink, EnergyContext, EnergyNetwork};
use cable_grid::simulation::{
    BlockPos, EuMachine, FluxCell, GridHost, MjEngine, SimulatedLoad, StrictBattery, UeDevice, World,
};
use cable_grid::{config, telemetry};
use config::{Config, ProtocolSettings};
use telemetry::init_tracing;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

/// Ticks between topology changes in the demo line
const TOPOLOGY_PERIOD: u64 = 200;
/// Ticks between network summaries
const REPORT_PERIOD: u64 = 100;
/// Share of every consumer buffer burned per tick
const LOAD_FRACTION: f64 = 0.05;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cfg = Config::load()?;
    info!(
        cable_capacity = cfg.network.cable_capacity,
        side = %cfg.network.side,
        tick_millis = cfg.simulation.tick_millis,
        "starting cable grid"
    );

    let sink = Arc::new(BroadcastSink::new(256));
    spawn_event_logger(sink.as_ref());

    let ctx = Arc::new(EnergyContext::from_config(&cfg, sink));
    let host = GridHost::new(World::new(), EnergyNetwork::global_registry(), ctx);

    let length = cfg.simulation.line_length.max(1) as i32;
    for x in 0..length {
        host.place_cable(BlockPos::new(x, 0, 0));
    }
    let loads = attach_consumers(&host, &cfg, length);
    info!(cables = length, consumers = loads.len(), "world ready");

    let source = BlockPos::new(0, 0, 0);
    let gap = BlockPos::new(length / 2, 0, 0);
    let mut interval = tokio::time::interval(Duration::from_millis(cfg.simulation.tick_millis.max(1)));
    let shutdown = telemetry::shutdown_signal();
    tokio::pin!(shutdown);
    let mut tick: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = &mut shutdown => break,
        }
        tick += 1;

        let spilled = host.inject(source, cfg.simulation.source_joules_per_tick);
        host.tick();
        for load in &loads {
            load.consume_fraction(LOAD_FRACTION);
        }

        if length > 2 && tick % TOPOLOGY_PERIOD == 0 {
            if host.world().cable_at(gap).is_some() {
                host.remove(gap);
                info!(tick, pos = %gap, networks = host.registry().len(), "line cut");
            } else {
                host.place_cable(gap);
                info!(tick, pos = %gap, networks = host.registry().len(), "line rejoined");
            }
        }

        if tick % REPORT_PERIOD == 0 {
            for handle in host.registry().snapshot() {
                let network = handle.lock();
                info!(
                    tick,
                    network = %network.id(),
                    summary = %network,
                    stored = network.flow(),
                    needed = network.needed(),
                    power = network.power(),
                    spilled,
                    "network status"
                );
            }
        }
    }

    warn!(ticks = tick, "shutdown complete");
    Ok(())
}

fn spawn_event_logger(sink: &BroadcastSink) {
    let mut rx = sink.subscribe();
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(event) => info!(network = %event.network, power_scale = event.power_scale, "transfer event"),
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event logger lagging"),
                Err(RecvError::Closed) => break,
            }
        }
    });
}

/// Places one consumer per slot above the line, cycling through protocols
fn attach_consumers(host: &GridHost, cfg: &Config, length: i32) -> Vec<Arc<dyn SimulatedLoad>> {
    let count = cfg.simulation.consumers as i32;
    let joules = cfg.simulation.consumer_capacity;
    let p: &ProtocolSettings = &cfg.protocols;
    let mut loads = Vec::new();

    for i in 0..count {
        let y = if (i / length) % 2 == 0 { 1 } else { -1 };
        let pos = BlockPos::new(i % length, y, 0);
        match i % 5 {
            0 => attach(host, pos, StrictBattery::new(joules), &mut loads),
            1 => attach(host, pos, FluxCell::new((joules * p.to_flux) as i64), &mut loads),
            2 => attach(host, pos, EuMachine::new(joules * p.to_eu, 512.0), &mut loads),
            3 => attach(host, pos, MjEngine::new(joules * p.to_mj), &mut loads),
            _ => attach(host, pos, UeDevice::new(joules * p.to_ue), &mut loads),
        }
    }
    loads
}

fn attach<T>(host: &GridHost, pos: BlockPos, consumer: T, loads: &mut Vec<Arc<dyn SimulatedLoad>>)
where
    T: EnergyAcceptor + SimulatedLoad + 'static,
{
    let consumer = Arc::new(consumer);
    host.place_consumer(pos, consumer.clone());
    loads.push(consumer);
}
