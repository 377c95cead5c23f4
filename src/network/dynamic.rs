use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use tracing::debug;

use crate::acceptor::Endpoint;
use crate::domain::{AcceptorId, Direction, NetworkId, NodeId};

/// A network member element.
///
/// The owning network is recorded as a lookup key only; a node never keeps a
/// network alive.
pub trait Transmitter: Send + Sync {
    type Acceptor: Endpoint + ?Sized;

    fn node_id(&self) -> NodeId;

    /// `false` once the node has been removed from the world
    fn is_valid(&self) -> bool;

    fn network(&self) -> Option<NetworkId>;

    fn set_network(&self, network: Option<NetworkId>);

    /// Non-member neighbors, keyed by the direction from this node to them
    fn neighbor_acceptors(&self) -> Vec<(Direction, Arc<Self::Acceptor>)>;

    /// Directly connected transmitter nodes
    fn adjacent_nodes(&self) -> Vec<NodeId>;
}

/// Membership and reachability state shared by every transport kind.
///
/// A retired network has handed its members to another instance and must not
/// be used again; it keeps no members and no acceptors.
pub struct DynamicNetwork<N: ?Sized, A: ?Sized> {
    id: NetworkId,
    members: HashMap<NodeId, Arc<N>>,
    acceptors: HashMap<AcceptorId, Arc<A>>,
    acceptor_directions: HashMap<AcceptorId, Direction>,
    needs_update: bool,
    retired: bool,
}

impl<N, A> DynamicNetwork<N, A>
where
    N: Transmitter<Acceptor = A> + ?Sized,
    A: Endpoint + ?Sized,
{
    pub fn new(id: NetworkId) -> Self {
        Self {
            id,
            members: HashMap::new(),
            acceptors: HashMap::new(),
            acceptor_directions: HashMap::new(),
            needs_update: false,
            retired: false,
        }
    }

    pub fn id(&self) -> NetworkId {
        self.id
    }

    /// Adopts `nodes` without recomputing reachability
    pub fn add_all_nodes<I>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = Arc<N>>,
    {
        if self.retired {
            return;
        }
        for node in nodes {
            node.set_network(Some(self.id));
            self.members.insert(node.node_id(), node);
        }
    }

    pub fn remove_node(&mut self, node: &NodeId) -> Option<Arc<N>> {
        self.members.remove(node)
    }

    pub fn members(&self) -> impl Iterator<Item = &Arc<N>> {
        self.members.values()
    }

    pub fn member_ids(&self) -> HashSet<NodeId> {
        self.members.keys().copied().collect()
    }

    pub fn contains(&self, node: &NodeId) -> bool {
        self.members.contains_key(node)
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn acceptors(&self) -> impl Iterator<Item = &Arc<A>> {
        self.acceptors.values()
    }

    pub fn acceptor_count(&self) -> usize {
        self.acceptors.len()
    }

    pub fn acceptor_direction(&self, acceptor: &AcceptorId) -> Option<Direction> {
        self.acceptor_directions.get(acceptor).copied()
    }

    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    pub fn set_needs_update(&mut self) {
        self.needs_update = true;
    }

    pub fn clear_needs_update(&mut self) {
        self.needs_update = false;
    }

    pub fn is_retired(&self) -> bool {
        self.retired
    }

    /// Recomputes live membership and the reachable acceptor set.
    ///
    /// Members are visited in ascending node id order, then `Direction`
    /// declaration order. When one acceptor is reachable through several
    /// connection points, the direction enumerated last is the one kept.
    pub fn refresh(&mut self) {
        if self.retired {
            return;
        }

        let mut snapshot: Vec<Arc<N>> = self.members.values().cloned().collect();
        snapshot.sort_by_key(|node| node.node_id());
        let mut survivors = Vec::with_capacity(snapshot.len());
        let mut dropped = 0usize;

        for node in snapshot {
            if node.is_valid() {
                node.set_network(Some(self.id));
                survivors.push(node);
            } else {
                self.members.remove(&node.node_id());
                dropped += 1;
            }
        }

        self.acceptors.clear();
        self.acceptor_directions.clear();

        for node in &survivors {
            for (direction, acceptor) in node.neighbor_acceptors() {
                let key = acceptor.acceptor_id();
                self.acceptor_directions.insert(key, direction);
                self.acceptors.insert(key, acceptor);
            }
        }

        self.needs_update = true;

        debug!(
            network = %self.id,
            members = self.members.len(),
            dropped,
            acceptors = self.acceptors.len(),
            "network refreshed"
        );
    }

    /// Partitions the valid members into connected components
    pub fn connected_components(&self) -> Vec<Vec<Arc<N>>> {
        let mut seen: HashSet<NodeId> = HashSet::new();
        let mut components = Vec::new();

        for (start_id, start) in &self.members {
            if seen.contains(start_id) || !start.is_valid() {
                continue;
            }
            seen.insert(*start_id);

            let mut component = Vec::new();
            let mut queue = VecDeque::from([start.clone()]);
            while let Some(node) = queue.pop_front() {
                for next_id in node.adjacent_nodes() {
                    if seen.contains(&next_id) {
                        continue;
                    }
                    if let Some(next) = self.members.get(&next_id) {
                        if next.is_valid() {
                            seen.insert(next_id);
                            queue.push_back(next.clone());
                        }
                    }
                }
                component.push(node);
            }
            components.push(component);
        }

        components
    }

    /// Marks this instance unusable and releases its members
    pub fn retire(&mut self) -> Vec<Arc<N>> {
        self.retired = true;
        self.acceptors.clear();
        self.acceptor_directions.clear();
        self.needs_update = false;
        self.members.drain().map(|(_, node)| node).collect()
    }
}

impl<N: ?Sized, A: ?Sized> std::fmt::Debug for DynamicNetwork<N, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DynamicNetwork")
            .field("id", &self.id)
            .field("members", &self.members.len())
            .field("acceptors", &self.acceptors.len())
            .field("needs_update", &self.needs_update)
            .field("retired", &self.retired)
            .finish()
    }
}

/// Hooks a concrete transport kind supplies on top of [`DynamicNetwork`].
///
/// The factories let the specialization carry its own aggregate state into
/// the instances that replace it on merge and split.
pub trait Network: Send + Sized + 'static {
    type Node: Transmitter<Acceptor = Self::Acceptor> + ?Sized;
    type Acceptor: Endpoint + ?Sized;

    fn core(&self) -> &DynamicNetwork<Self::Node, Self::Acceptor>;

    fn core_mut(&mut self) -> &mut DynamicNetwork<Self::Node, Self::Acceptor>;

    /// New instance over `nodes` inheriting this network's carried state
    fn create_from_nodes<I>(&self, id: NetworkId, nodes: I) -> Self
    where
        I: IntoIterator<Item = Arc<Self::Node>>;

    /// New instance over the union of `self` and `others`
    fn create_from_networks(&self, id: NetworkId, others: &[&Self]) -> Self;

    fn refresh(&mut self) {
        self.core_mut().refresh();
    }

    fn tick(&mut self);
}
