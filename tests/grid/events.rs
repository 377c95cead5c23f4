use std::sync::Arc;
use std::time::Duration;

use cable_grid::network::{BroadcastSink, RecordingSink};
use cable_grid::simulation::{BlockPos, StrictBattery};

use super::common::{config, host_with, line_with_consumers};

#[tokio::test]
async fn test_topology_change_publishes_on_next_tick() {
    let sink = Arc::new(BroadcastSink::new(16));
    let mut rx = sink.subscribe();
    let host = host_with(&config(10_000.0), sink);
    let network = line_with_consumers(&host, vec![Arc::new(StrictBattery::new(100.0))]);
    let id = network.lock().id();

    host.tick();

    let event = tokio::time::timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("event within a second")
        .expect("channel open");
    assert_eq!(event.network, id);
    assert_eq!(event.power_scale, 0.0);
}

#[test]
fn test_at_most_one_event_per_tick() {
    let sink = Arc::new(RecordingSink::new());
    let host = host_with(&config(1_000.0), sink.clone());
    let battery = Arc::new(StrictBattery::new(1_000_000.0));
    line_with_consumers(&host, vec![battery]);

    for _ in 0..10 {
        host.inject(BlockPos::new(0, 0, 0), 1_000.0);
        host.tick();
    }

    assert!(sink.len() <= 10);
    assert!(!sink.is_empty());
}

#[test]
fn test_steady_state_stops_publishing() {
    let sink = Arc::new(RecordingSink::new());
    let host = host_with(&config(10_000.0), sink.clone());
    line_with_consumers(&host, vec![Arc::new(StrictBattery::new(1_000_000.0))]);

    // same throughput every tick: scale settles and publishing stops
    for _ in 0..5 {
        host.inject(BlockPos::new(0, 0, 0), 500.0);
        host.tick();
    }
    sink.take();
    for _ in 0..5 {
        host.inject(BlockPos::new(0, 0, 0), 500.0);
        host.tick();
    }
    assert!(sink.is_empty());
}
