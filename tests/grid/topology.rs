use std::collections::HashSet;
use std::sync::Arc;

use cable_grid::domain::NodeId;
use cable_grid::network::{
    EnergyContext, EnergyNetwork, EnergyNode, EnergyRegistry, Network, Transmitter, TransferTelemetry,
};
use cable_grid::simulation::{BlockPos, Cable, StrictBattery, World};

use super::common::{host, lay_line, network_at};

fn as_node(cable: &Arc<Cable>) -> Arc<EnergyNode> {
    cable.clone()
}

fn detached_network(ctx: &Arc<EnergyContext>, world: &Arc<World>, xs: &[i32]) -> EnergyNetwork {
    let nodes: Vec<Arc<EnergyNode>> = xs
        .iter()
        .map(|&x| world.place_cable(BlockPos::new(x, 0, 0)) as Arc<EnergyNode>)
        .collect();
    let mut network = EnergyNetwork::new(ctx.clone(), nodes);
    network.refresh();
    network
}

#[test]
fn test_merge_preserves_membership_and_deregisters_inputs() {
    let world = World::new();
    let ctx = Arc::new(EnergyContext::default());
    let registry = EnergyRegistry::new();

    let a = registry.register(detached_network(&ctx, &world, &[0, 1]));
    let b = registry.register(detached_network(&ctx, &world, &[10, 11, 12]));
    let a_id = a.lock().id();
    let b_id = b.lock().id();
    let expected: HashSet<NodeId> = a
        .lock()
        .core()
        .member_ids()
        .union(&b.lock().core().member_ids())
        .copied()
        .collect();

    let merged = registry.merge(a_id, Some(b_id)).expect("two live networks merge");
    let merged = merged.lock();

    assert_eq!(merged.core().member_ids(), expected);
    assert_eq!(registry.ids(), vec![merged.id()]);
    assert!(!registry.contains(a_id));
    assert!(!registry.contains(b_id));
    for node in merged.core().members() {
        assert_eq!(node.network(), Some(merged.id()));
    }
    assert_eq!(merged.capacity(), 5.0 * 10_000.0);
}

#[test]
fn test_retired_inputs_are_inert() {
    let world = World::new();
    let ctx = Arc::new(EnergyContext::default());
    let registry = EnergyRegistry::new();

    let a = registry.register(detached_network(&ctx, &world, &[0]));
    let b = registry.register(detached_network(&ctx, &world, &[5]));
    world.place_consumer(BlockPos::new(0, 1, 0), Arc::new(StrictBattery::new(100.0)));
    let (a_id, b_id) = (a.lock().id(), b.lock().id());
    registry.merge(a_id, Some(b_id));

    let mut old = a.lock();
    assert!(old.core().is_retired());
    assert!(old.core().is_empty());
    assert_eq!(old.energy_needed(), 0.0);
    assert_eq!(old.drain(100.0), 100.0);
    old.refresh();
    assert_eq!(old.core().acceptor_count(), 0);
}

#[test]
fn test_merge_without_partner_is_noop() {
    let world = World::new();
    let ctx = Arc::new(EnergyContext::default());
    let registry = EnergyRegistry::new();
    let a = registry.register(detached_network(&ctx, &world, &[0]));
    let id = a.lock().id();

    assert!(registry.merge(id, None).is_none());
    assert!(registry.merge(id, Some(id)).is_none());
    assert!(registry.contains(id));
    assert!(!a.lock().core().is_retired());
}

#[test]
fn test_merge_copies_busier_telemetry() {
    let world = World::new();
    let ctx = Arc::new(EnergyContext::default());
    let registry = EnergyRegistry::new();

    let a = registry.register(detached_network(&ctx, &world, &[0]));
    let b = registry.register(detached_network(&ctx, &world, &[5]));
    a.lock().set_telemetry(TransferTelemetry {
        transmitted_last_tick: 2.0,
        last_power_scale: 0.2,
        ..Default::default()
    });
    b.lock().set_telemetry(TransferTelemetry {
        transmitted_last_tick: 5.0,
        last_power_scale: 0.5,
        ..Default::default()
    });
    let (a_id, b_id) = (a.lock().id(), b.lock().id());

    let merged = registry.merge(a_id, Some(b_id)).unwrap();
    let telemetry = merged.lock().telemetry();
    assert_eq!(telemetry.transmitted_last_tick, 5.0);
    assert_eq!(telemetry.last_power_scale, 0.5);
}

#[test]
fn test_refresh_drops_removed_cable_and_shrinks_capacity() {
    let host = host();
    lay_line(&host, 3);
    let network = network_at(&host, 0);
    assert_eq!(network.lock().capacity(), 30_000.0);

    // Bypass the host so no split happens; only refresh notices.
    host.world().remove(BlockPos::new(2, 0, 0));
    network.lock().refresh();

    let network = network.lock();
    assert_eq!(network.core().len(), 2);
    assert_eq!(network.capacity(), 20_000.0);
}

#[test]
fn test_split_at_middle_yields_two_networks() {
    let host = host();
    lay_line(&host, 5);
    let before = network_at(&host, 0);
    let before_id = before.lock().id();

    host.remove(BlockPos::new(2, 0, 0));

    assert!(before.lock().core().is_retired());
    assert!(!host.registry().contains(before_id));
    assert_eq!(host.registry().len(), 2);

    let left = network_at(&host, 0);
    let right = network_at(&host, 4);
    let left_members = left.lock().core().member_ids();
    let right_members = right.lock().core().member_ids();
    assert!(left_members.is_disjoint(&right_members));

    let survivors: HashSet<NodeId> = [0, 1, 3, 4]
        .iter()
        .filter_map(|&x| host.world().cable_at(BlockPos::new(x, 0, 0)))
        .map(|cable| cable.node_id())
        .collect();
    let union: HashSet<NodeId> = left_members.union(&right_members).copied().collect();
    assert_eq!(union, survivors);
}

#[test]
fn test_split_carries_stored_energy_proportionally() {
    let host = host();
    lay_line(&host, 5);
    network_at(&host, 0).lock().receive(40_000.0);

    host.remove(BlockPos::new(2, 0, 0));

    // the surviving halves share the whole pool 2:2
    assert_eq!(network_at(&host, 0).lock().stored(), 20_000.0);
    assert_eq!(network_at(&host, 4).lock().stored(), 20_000.0);
}

#[test]
fn test_rejoining_line_merges_again() {
    let host = host();
    lay_line(&host, 5);
    host.remove(BlockPos::new(2, 0, 0));
    host.place_cable(BlockPos::new(2, 0, 0));

    assert_eq!(host.registry().len(), 1);
    assert_eq!(network_at(&host, 0).lock().core().len(), 5);
}

#[test]
fn test_join_reads_neighbors_after_their_merge() {
    let world = World::new();
    let ctx = Arc::new(EnergyContext::default());
    let registry = EnergyRegistry::new();

    let a = registry.register(detached_network(&ctx, &world, &[0]));
    let b = registry.register(detached_network(&ctx, &world, &[2]));
    let (a_id, b_id) = (a.lock().id(), b.lock().id());
    let left = world.cable_at(BlockPos::new(0, 0, 0)).unwrap();
    let right = world.cable_at(BlockPos::new(2, 0, 0)).unwrap();

    // both neighbors change network before the bridge attaches
    let merged = registry.merge(a_id, Some(b_id)).unwrap();
    let merged_id = merged.lock().id();

    let bridge = world.place_cable(BlockPos::new(1, 0, 0));
    let joined = registry.join(vec![as_node(&bridge)], &[as_node(&left), as_node(&right)], |nodes| {
        EnergyNetwork::new(ctx.clone(), nodes)
    });

    assert_eq!(joined.lock().id(), merged_id);
    assert_eq!(registry.ids(), vec![merged_id]);
    assert_eq!(bridge.network(), Some(merged_id));
    assert_eq!(merged.lock().core().len(), 3);
}

#[test]
fn test_join_starts_fresh_network_when_neighbors_are_retired() {
    let world = World::new();
    let ctx = Arc::new(EnergyContext::default());
    let registry = EnergyRegistry::new();

    let old = registry.register(detached_network(&ctx, &world, &[0]));
    let old_id = old.lock().id();
    let stale = world.cable_at(BlockPos::new(0, 0, 0)).unwrap();
    registry.deregister(old_id);
    assert_eq!(stale.network(), Some(old_id));

    let cable = world.place_cable(BlockPos::new(1, 0, 0));
    let joined = registry.join(vec![as_node(&cable)], &[as_node(&stale)], |nodes| {
        EnergyNetwork::new(ctx.clone(), nodes)
    });

    let joined = joined.lock();
    assert_ne!(joined.id(), old_id);
    assert!(registry.contains(joined.id()));
    assert_eq!(cable.network(), Some(joined.id()));
    assert!(joined.core().member_ids().contains(&cable.node_id()));
}

#[test]
fn test_host_bridge_merges_every_touching_network() {
    let host = host();
    host.place_cable(BlockPos::new(0, 0, 0));
    host.place_cable(BlockPos::new(2, 0, 0));
    host.place_cable(BlockPos::new(1, 1, 0));
    assert_eq!(host.registry().len(), 3);

    let bridge = host.place_cable(BlockPos::new(1, 0, 0));

    assert_eq!(host.registry().len(), 1);
    let network = network_at(&host, 0);
    assert_eq!(network.lock().core().len(), 4);
    assert_eq!(bridge.network(), Some(network.lock().id()));
}

#[test]
fn test_refresh_all_sees_changes_made_behind_the_host() {
    let host = host();
    lay_line(&host, 3);
    host.place_cable(BlockPos::new(10, 0, 0));

    host.world().place_consumer(BlockPos::new(1, 1, 0), Arc::new(StrictBattery::new(10.0)));
    host.world().place_consumer(BlockPos::new(10, 1, 0), Arc::new(StrictBattery::new(10.0)));
    host.world().remove(BlockPos::new(2, 0, 0));
    let line = network_at(&host, 0);
    let lone = network_at(&host, 10);
    assert_eq!(line.lock().core().acceptor_count(), 0);
    assert_eq!(lone.lock().core().acceptor_count(), 0);

    host.registry().refresh_all();

    assert_eq!(line.lock().core().acceptor_count(), 1);
    assert_eq!(line.lock().core().len(), 2);
    assert_eq!(lone.lock().core().acceptor_count(), 1);
}

#[test]
fn test_ticks_during_topology_changes_conserve_energy() {
    let host = host();
    lay_line(&host, 5);
    let batteries: Vec<Arc<StrictBattery>> = (0..5)
        .map(|x| {
            let battery = Arc::new(StrictBattery::new(1_000_000.0));
            host.place_consumer(BlockPos::new(x, 1, 0), battery.clone());
            battery
        })
        .collect();
    let injected = 4_000.0;
    assert_eq!(host.inject(BlockPos::new(0, 0, 0), injected), 0.0);

    let registry = host.registry().clone();
    std::thread::scope(|scope| {
        scope.spawn(|| {
            for _ in 0..500 {
                registry.tick_all();
            }
        });
        scope.spawn(|| {
            for _ in 0..200 {
                host.remove(BlockPos::new(2, 0, 0));
                host.place_cable(BlockPos::new(2, 0, 0));
            }
        });
    });

    let pooled: f64 = registry.snapshot().iter().map(|n| n.lock().stored()).sum();
    let delivered: f64 = batteries.iter().map(|b| b.stored()).sum();
    assert!(
        (pooled + delivered - injected).abs() < 1e-6,
        "pooled {pooled} + delivered {delivered} != {injected}"
    );

    let live = registry.snapshot();
    for x in 0..5 {
        let cable = host.world().cable_at(BlockPos::new(x, 0, 0)).unwrap();
        let owners: Vec<_> = live
            .iter()
            .filter(|n| n.lock().core().member_ids().contains(&cable.node_id()))
            .map(|n| n.lock().id())
            .collect();
        assert_eq!(owners.len(), 1, "cable at x = {x} owned by {owners:?}");
        assert_eq!(cable.network(), Some(owners[0]));
    }
    assert_eq!(live.len(), 1);
}

#[test]
fn test_global_registry_is_shared() {
    assert!(Arc::ptr_eq(
        &EnergyNetwork::global_registry(),
        &EnergyNetwork::global_registry()
    ));
}
