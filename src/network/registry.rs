use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use super::dynamic::{Network, Transmitter};
use crate::domain::{NetworkId, NodeId};

/// Shared, individually locked network instance
pub type NetworkRef<T> = Arc<Mutex<T>>;

/// Every live network of one transport kind.
///
/// Lock order is always the registry map first, then individual networks.
/// Join, merge and split hold the map for their whole duration, so two topology
/// changes can never claim the same nodes at once. Callers must not invoke
/// registry operations while holding a network lock.
pub struct NetworkRegistry<T: Network> {
    networks: Mutex<HashMap<NetworkId, NetworkRef<T>>>,
}

impl<T: Network> Default for NetworkRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Network> NetworkRegistry<T> {
    pub fn new() -> Self {
        Self {
            networks: Mutex::new(HashMap::new()),
        }
    }

    /// Makes `network` live and returns its shared handle
    pub fn register(&self, network: T) -> NetworkRef<T> {
        let id = network.core().id();
        let handle = Arc::new(Mutex::new(network));
        self.networks.lock().insert(id, handle.clone());
        debug!(network = %id, "network registered");
        handle
    }

    /// Removes a network from the live set and retires it
    pub fn deregister(&self, id: NetworkId) -> Option<NetworkRef<T>> {
        let handle = self.networks.lock().remove(&id)?;
        handle.lock().core_mut().retire();
        debug!(network = %id, "network deregistered");
        Some(handle)
    }

    pub fn get(&self, id: NetworkId) -> Option<NetworkRef<T>> {
        self.networks.lock().get(&id).cloned()
    }

    pub fn contains(&self, id: NetworkId) -> bool {
        self.networks.lock().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.networks.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.lock().is_empty()
    }

    pub fn ids(&self) -> Vec<NetworkId> {
        self.networks.lock().keys().copied().collect()
    }

    /// Handles of every live network at this instant
    pub fn snapshot(&self) -> Vec<NetworkRef<T>> {
        self.networks.lock().values().cloned().collect()
    }

    /// Resolves a node's back-reference to its live network
    pub fn network_of(&self, node: &T::Node) -> Option<NetworkRef<T>> {
        self.get(node.network()?)
    }

    /// Combines two networks into a new instance and retires both.
    ///
    /// A missing `other`, `other == network`, or an id that is no longer live
    /// makes this a no-op.
    pub fn merge(&self, network: NetworkId, other: Option<NetworkId>) -> Option<NetworkRef<T>> {
        let other = other?;
        if other == network {
            return None;
        }
        self.merge_all(&[network, other])
    }

    /// Combines every listed live network into one new instance.
    ///
    /// Returns `None` when fewer than two distinct live networks are named.
    pub fn merge_all(&self, ids: &[NetworkId]) -> Option<NetworkRef<T>> {
        let mut networks = self.networks.lock();
        Self::merge_locked(&mut networks, ids)
    }

    /// Adopts `nodes` into the live network of the first of `neighbors` that
    /// has one, merging every other neighbor's live network into it; starts a
    /// network through `create` when no neighbor belongs to a live network.
    ///
    /// Neighbor back-references are read under the registry lock, so a
    /// network retired by a concurrent merge or split is never chosen.
    pub fn join<F>(&self, nodes: Vec<Arc<T::Node>>, neighbors: &[Arc<T::Node>], create: F) -> NetworkRef<T>
    where
        F: FnOnce(Vec<Arc<T::Node>>) -> T,
    {
        let mut networks = self.networks.lock();

        let mut live: Vec<NetworkId> = Vec::with_capacity(neighbors.len());
        for id in neighbors.iter().filter_map(|n| n.network()) {
            if !live.contains(&id) && networks.contains_key(&id) {
                live.push(id);
            }
        }

        let target = live.first().and_then(|id| networks.get(id).cloned());
        let Some(target) = target else {
            let mut network = create(nodes);
            network.refresh();
            let id = network.core().id();
            let handle = Arc::new(Mutex::new(network));
            networks.insert(id, handle.clone());
            debug!(network = %id, "network started");
            return handle;
        };

        {
            let mut network = target.lock();
            network.core_mut().add_all_nodes(nodes);
            network.refresh();
        }

        if live.len() < 2 {
            return target;
        }
        Self::merge_locked(&mut networks, &live).unwrap_or(target)
    }

    fn merge_locked(
        networks: &mut HashMap<NetworkId, NetworkRef<T>>,
        ids: &[NetworkId],
    ) -> Option<NetworkRef<T>> {
        let mut unique: Vec<NetworkId> = Vec::with_capacity(ids.len());
        for id in ids {
            if !unique.contains(id) && networks.contains_key(id) {
                unique.push(*id);
            }
        }
        if unique.len() < 2 {
            return None;
        }

        let handles: Vec<NetworkRef<T>> = unique
            .iter()
            .filter_map(|id| networks.get(id).cloned())
            .collect();
        let mut guards: Vec<_> = handles.iter().map(|h| h.lock()).collect();

        let merged = {
            let (first, rest) = guards.split_first()?;
            let others: Vec<&T> = rest.iter().map(|g| &**g).collect();
            first.create_from_networks(NetworkId::new(), &others)
        };

        for guard in guards.iter_mut() {
            guard.core_mut().retire();
        }
        drop(guards);
        for id in &unique {
            networks.remove(id);
        }

        let mut merged = merged;
        merged.refresh();
        let id = merged.core().id();
        let members = merged.core().len();
        let handle = Arc::new(Mutex::new(merged));
        networks.insert(id, handle.clone());

        info!(network = %id, sources = unique.len(), members, "networks merged");
        Some(handle)
    }

    /// Replaces a network after `removed` left it with one network per
    /// remaining connected component.
    ///
    /// Returns the new networks; empty when the network is unknown or nothing
    /// valid remains.
    pub fn split(&self, network: NetworkId, removed: NodeId) -> Vec<NetworkRef<T>> {
        let mut networks = self.networks.lock();
        let Some(handle) = networks.get(&network).cloned() else {
            return Vec::new();
        };

        let created: Vec<T> = {
            let mut old = handle.lock();
            if let Some(node) = old.core_mut().remove_node(&removed) {
                if node.network() == Some(network) {
                    node.set_network(None);
                }
            }
            let components = old.core().connected_components();
            let created = components
                .into_iter()
                .map(|nodes| old.create_from_nodes(NetworkId::new(), nodes))
                .collect();
            old.core_mut().retire();
            created
        };
        networks.remove(&network);

        let handles: Vec<NetworkRef<T>> = created
            .into_iter()
            .map(|mut net| {
                net.refresh();
                let id = net.core().id();
                let handle = Arc::new(Mutex::new(net));
                networks.insert(id, handle.clone());
                handle
            })
            .collect();

        info!(
            network = %network,
            removed = %removed,
            parts = handles.len(),
            "network split"
        );
        handles
    }

    /// Refreshes every live network
    pub fn refresh_all(&self) {
        for handle in self.snapshot() {
            let mut network = handle.lock();
            if !network.core().is_retired() {
                network.refresh();
            }
        }
    }

    /// Ticks every live network once
    pub fn tick_all(&self) {
        for handle in self.snapshot() {
            let mut network = handle.lock();
            if !network.core().is_retired() {
                network.tick();
            }
        }
    }
}

impl<T: Network> std::fmt::Debug for NetworkRegistry<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkRegistry")
            .field("live", &self.len())
            .finish()
    }
}
