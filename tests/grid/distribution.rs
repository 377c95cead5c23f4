use std::sync::Arc;

use cable_grid::acceptor::EnergyAcceptor;
use cable_grid::network::Network;
use cable_grid::simulation::{BlockPos, EuMachine, FluxCell, MjEngine, StrictBattery, UeDevice, UniversalDevice};
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rstest::rstest;

use super::common::{host, line_with_consumers, mirrored_host, network_at};

fn batteries(capacities: &[f64]) -> Vec<Arc<StrictBattery>> {
    capacities.iter().map(|&c| Arc::new(StrictBattery::new(c))).collect()
}

fn as_acceptors(batteries: &[Arc<StrictBattery>]) -> Vec<Arc<dyn EnergyAcceptor>> {
    batteries
        .iter()
        .map(|b| b.clone() as Arc<dyn EnergyAcceptor>)
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_drain_conserves_energy(
        capacities in prop::collection::vec(1.0f64..5_000.0, 1..8),
        amount in 0.0f64..20_000.0,
        seed in any::<u64>(),
    ) {
        let host = host();
        let batteries = batteries(&capacities);
        let network = line_with_consumers(&host, as_acceptors(&batteries));

        let remainder = network.lock().drain_with(amount, &mut StdRng::seed_from_u64(seed));
        let delivered: f64 = batteries.iter().map(|b| b.stored()).sum();

        prop_assert!(remainder >= 0.0);
        prop_assert!(remainder <= amount + 1e-9);
        prop_assert!((delivered + remainder - amount).abs() < 1e-6);
        for battery in &batteries {
            prop_assert!(battery.stored() <= battery.capacity() + 1e-9);
        }
    }

    #[test]
    fn prop_full_utilization_when_demand_covers_supply(
        capacities in prop::collection::vec(100.0f64..5_000.0, 1..8),
        fraction in 0.0f64..1.0,
        seed in any::<u64>(),
    ) {
        let host = host();
        let batteries = batteries(&capacities);
        let network = line_with_consumers(&host, as_acceptors(&batteries));
        let amount = capacities.iter().sum::<f64>() * fraction;

        let remainder = network.lock().drain_with(amount, &mut StdRng::seed_from_u64(seed));
        prop_assert!(remainder.abs() < 1e-6, "remainder {} of {}", remainder, amount);
    }

    #[test]
    fn prop_first_served_takes_the_whole_carry(
        count in 1usize..8,
        amount in 0.0f64..10_000.0,
        seed in any::<u64>(),
    ) {
        let host = host();
        let carry = amount % count as f64;
        let share = (amount - carry) / count as f64;
        let batteries = batteries(&vec![share + carry + 1.0; count]);
        let network = line_with_consumers(&host, as_acceptors(&batteries));

        network.lock().drain_with(amount, &mut StdRng::seed_from_u64(seed));

        let mut with_carry = 0;
        for battery in &batteries {
            let got = battery.stored();
            if (got - share).abs() > 1e-6 {
                prop_assert!((got - share - carry).abs() < 1e-6, "got {} share {} carry {}", got, share, carry);
                with_carry += 1;
            }
        }
        let expected = if carry > 1e-6 { 1 } else { 0 };
        prop_assert_eq!(with_carry, expected);
    }

    #[test]
    fn prop_tight_demand_spreads_the_remainder(
        count in 1usize..8,
        amount in 0u32..10_000,
        seed in any::<u64>(),
    ) {
        let host = host();
        let n = count as u32;
        let floor = f64::from(amount / n);
        let batteries = batteries(&vec![floor + 1.0; count]);
        let network = line_with_consumers(&host, as_acceptors(&batteries));

        let remainder = network.lock().drain_with(f64::from(amount), &mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(remainder, 0.0);

        let mut plus_one = 0u32;
        for battery in &batteries {
            let got = battery.stored();
            if got == floor + 1.0 {
                plus_one += 1;
            } else {
                prop_assert_eq!(got, floor);
            }
        }
        prop_assert_eq!(plus_one, amount % n);
    }

    #[test]
    fn prop_stored_never_exceeds_capacity(
        cables in 1i32..6,
        offers in prop::collection::vec(0.0f64..30_000.0, 1..10),
    ) {
        let host = host();
        super::common::lay_line(&host, cables);
        let network = network_at(&host, 0);
        let mut network = network.lock();

        for offer in offers {
            let rest = network.receive(offer);
            prop_assert!(rest >= 0.0);
            prop_assert!(network.stored() <= network.capacity());
        }
    }
}

#[test]
fn test_tick_moves_stored_energy_to_consumers() {
    let host = host();
    let battery = Arc::new(StrictBattery::new(1_000.0));
    line_with_consumers(&host, vec![battery.clone()]);

    assert_eq!(host.inject(BlockPos::new(0, 0, 0), 600.0), 0.0);
    host.tick();

    assert_eq!(battery.stored(), 600.0);
    let network = network_at(&host, 0);
    assert_eq!(network.lock().stored(), 0.0);
    host.tick();
    assert_eq!(network.lock().power(), 600.0 * 20.0);
}

#[test]
fn test_mirrored_network_is_a_noop() {
    let host = mirrored_host();
    let battery = Arc::new(StrictBattery::new(1_000.0));
    let network = line_with_consumers(&host, vec![battery.clone()]);

    assert_eq!(host.inject(BlockPos::new(0, 0, 0), 600.0), 600.0);
    assert_eq!(network.lock().drain(600.0), 600.0);
    host.tick();

    assert_eq!(battery.stored(), 0.0);
    assert_eq!(network.lock().telemetry().transmitted_last_tick, 0.0);
}

#[test]
fn test_dual_protocol_neighbor_fed_once_by_priority() {
    let host = host();
    let device = Arc::new(UniversalDevice::new(1_000.0));
    let network = line_with_consumers(&host, vec![device.clone()]);

    let remainder = network.lock().drain_with(400.0, &mut StdRng::seed_from_u64(9));

    assert_eq!(remainder, 0.0);
    assert_eq!(device.joules(), 400.0);
    assert_eq!(device.units(), 0.0);
}

#[test]
fn test_blocked_side_is_not_fed() {
    let host = host();
    // consumer sits above the cable, so energy enters through its bottom face
    let battery = Arc::new(StrictBattery::new(100.0).with_blocked_side(cable_grid::domain::Direction::Down));
    let network = line_with_consumers(&host, vec![battery.clone()]);

    assert!(network.lock().compute_acceptors().is_empty());
    assert_eq!(network.lock().drain(50.0), 50.0);
    assert_eq!(battery.stored(), 0.0);
}

#[rstest]
#[case::flux(Arc::new(FluxCell::new(400)))]
#[case::eu(Arc::new(EuMachine::new(100.0, 2_048.0)))]
#[case::mj(Arc::new(MjEngine::new(40.0)))]
#[case::ue(Arc::new(UeDevice::new(10.0)))]
fn test_every_protocol_absorbs_its_demand(#[case] consumer: Arc<dyn EnergyAcceptor>) {
    // each consumer holds the equivalent of 1000 J at the default ratios
    let host = host();
    let network = line_with_consumers(&host, vec![consumer]);

    let remainder = network.lock().drain_with(1_500.0, &mut StdRng::seed_from_u64(11));
    assert!((remainder - 500.0).abs() < 1e-6, "remainder was {remainder}");
    assert!(network.lock().compute_acceptors().is_empty());
}

#[test]
fn test_refresh_after_consumer_change_updates_candidates() {
    let host = host();
    let network = line_with_consumers(&host, vec![Arc::new(StrictBattery::new(10.0))]);
    assert_eq!(network.lock().compute_acceptors().len(), 1);

    host.place_consumer(BlockPos::new(0, -1, 0), Arc::new(StrictBattery::new(10.0)));
    assert_eq!(network.lock().compute_acceptors().len(), 2);

    host.remove(BlockPos::new(0, 1, 0));
    network.lock().refresh();
    assert_eq!(network.lock().compute_acceptors().len(), 1);
}
