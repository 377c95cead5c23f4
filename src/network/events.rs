use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::info;

use crate::domain::NetworkId;

/// Published when a network's observable power level moved enough to matter
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EnergyTransferEvent {
    pub network: NetworkId,
    pub power_scale: f64,
}

/// Receiver of transfer events; called with the network's lock held, so
/// implementations must not call back into the network.
pub trait TransferEventSink: Send + Sync {
    fn publish(&self, event: EnergyTransferEvent);
}

/// Drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TransferEventSink for NullSink {
    fn publish(&self, _event: EnergyTransferEvent) {}
}

/// Emits events as structured log records
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TransferEventSink for TracingSink {
    fn publish(&self, event: EnergyTransferEvent) {
        info!(
            network = %event.network,
            power_scale = event.power_scale,
            "energy transfer update"
        );
    }
}

/// Fans events out to any number of async subscribers.
///
/// Publishing never blocks; with no subscriber attached the event is dropped.
#[derive(Debug, Clone)]
pub struct BroadcastSink {
    tx: broadcast::Sender<EnergyTransferEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EnergyTransferEvent> {
        self.tx.subscribe()
    }
}

impl TransferEventSink for BroadcastSink {
    fn publish(&self, event: EnergyTransferEvent) {
        let _ = self.tx.send(event);
    }
}

/// Keeps every event in memory, for tests and inspection tools
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EnergyTransferEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EnergyTransferEvent> {
        self.events.lock().clone()
    }

    pub fn take(&self) -> Vec<EnergyTransferEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl TransferEventSink for RecordingSink {
    fn publish(&self, event: EnergyTransferEvent) {
        self.events.lock().push(event);
    }
}
