//! Per-tick energy distribution.
//!
//! Each pass splits the remaining amount evenly over the acceptors that
//! currently want energy, in a freshly shuffled order. The first acceptor
//! served in a pass also takes the rounding remainder. Passes repeat while
//! energy is left and the previous pass placed some of it, so the unused share
//! of a saturated acceptor is re-offered to the others.

use std::sync::Arc;

use rand::seq::SliceRandom;
use rand::Rng;
use tracing::trace;

use crate::acceptor::{AdapterSet, EnergyAcceptor};
use crate::network::EnergyCore;

/// Result of one drain call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DrainOutcome {
    /// Energy that could not be placed
    pub remainder: f64,
    /// Energy absorbed by acceptors across all passes
    pub absorbed: f64,
    pub passes: u32,
}

/// Reachable acceptors that accept energy on their cable-facing side and
/// report outstanding demand
pub fn compute_acceptors(core: &EnergyCore, adapters: &AdapterSet) -> Vec<Arc<dyn EnergyAcceptor>> {
    let mut wanting = Vec::new();

    for acceptor in core.acceptors() {
        let target: &dyn EnergyAcceptor = &**acceptor;
        let Some(direction) = core.acceptor_direction(&target.acceptor_id()) else {
            continue;
        };
        let side = direction.opposite();
        let Some(adapter) = adapters.resolve(target) else {
            continue;
        };
        if adapter.accepts(target, side) && adapter.current_demand(target, side) > 0.0 {
            wanting.push(Arc::clone(acceptor));
        }
    }

    wanting
}

/// Pushes up to `amount` into the network's acceptors
pub fn distribute<R>(core: &EnergyCore, adapters: &AdapterSet, amount: f64, rng: &mut R) -> DrainOutcome
where
    R: Rng + ?Sized,
{
    let mut remaining = amount;
    let mut absorbed = 0.0;
    let mut passes = 0;

    loop {
        let before = remaining;
        remaining = distribute_pass(core, adapters, remaining, rng);
        passes += 1;

        let sent = before - remaining;
        absorbed += sent;

        if !(remaining > 0.0 && sent > 0.0) {
            break;
        }
    }

    DrainOutcome {
        remainder: remaining,
        absorbed,
        passes,
    }
}

fn distribute_pass<R>(core: &EnergyCore, adapters: &AdapterSet, amount: f64, rng: &mut R) -> f64
where
    R: Rng + ?Sized,
{
    let mut candidates = compute_acceptors(core, adapters);
    if candidates.is_empty() {
        return amount;
    }
    candidates.shuffle(rng);

    let divider = candidates.len() as f64;
    let mut carry = amount % divider;
    let share = (amount - carry) / divider;
    let mut remaining = amount;

    for acceptor in candidates {
        let target: &dyn EnergyAcceptor = &*acceptor;
        let Some(direction) = core.acceptor_direction(&target.acceptor_id()) else {
            continue;
        };
        let offer = share + carry;
        carry = 0.0;

        let Some(adapter) = adapters.resolve(target) else {
            continue;
        };
        let absorbed = adapter
            .push(target, direction.opposite(), offer)
            .min(offer)
            .min(remaining)
            .max(0.0);
        remaining -= absorbed;

        trace!(
            acceptor = %target.acceptor_id(),
            protocol = %adapter.protocol(),
            offer,
            absorbed,
            "energy dispatched"
        );
    }

    remaining.max(0.0)
}
