//! Shared, per-node locked view of the world graph.
//!
//! The set of nodes and their connections are fixed once the map is built.
//! Each node sits behind its own lock so occupant changes in different
//! regions never contend, and no operation holds two node locks at once.

use shared::{Location, Mobile, Node, Serial, World, WorldError};
use std::collections::{BTreeSet, HashMap};
use tokio::sync::RwLock;

pub struct WorldMap {
    nodes: HashMap<Location, RwLock<Node>>,
    spawnable: Vec<Location>,
}

impl WorldMap {
    pub fn new(world: World) -> Self {
        let mut spawnable: Vec<Location> = world
            .nodes()
            .filter(|node| node.is_spawnable())
            .map(Node::location)
            .collect();
        spawnable.sort();

        let nodes = world
            .into_nodes()
            .map(|node| (node.location(), RwLock::new(node)))
            .collect();

        Self { nodes, spawnable }
    }

    pub fn contains(&self, location: Location) -> bool {
        self.nodes.contains_key(&location)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Regions where creatures may be generated, in ascending order.
    pub fn spawnable_locations(&self) -> &[Location] {
        &self.spawnable
    }

    /// Occupant-free copy of a node for the wire.
    pub async fn snapshot(&self, location: Location) -> Option<Node> {
        let node = self.nodes.get(&location)?;
        let guard = node.read().await;
        Some(guard.snapshot())
    }

    pub async fn connections(&self, location: Location) -> Option<BTreeSet<Location>> {
        let node = self.nodes.get(&location)?;
        let guard = node.read().await;
        Some(guard.connections().clone())
    }

    pub async fn add_mobile(&self, location: Location, mobile: Mobile) -> Result<bool, WorldError> {
        let node = self
            .nodes
            .get(&location)
            .ok_or(WorldError::UnknownNode(location))?;
        let mut guard = node.write().await;
        Ok(guard.add_mobile(mobile))
    }

    pub async fn remove_mobile(&self, location: Location, mobile: &Mobile) -> bool {
        match self.nodes.get(&location) {
            Some(node) => node.write().await.remove_mobile(mobile),
            None => false,
        }
    }

    pub async fn update_mobile(&self, location: Location, mobile: Mobile) -> bool {
        match self.nodes.get(&location) {
            Some(node) => node.write().await.update_mobile(mobile),
            None => false,
        }
    }

    /// Moves a mobile between two nodes. The source lock is released before
    /// the destination lock is taken.
    pub async fn move_mobile(
        &self,
        from: Location,
        to: Location,
        mobile: Mobile,
    ) -> Result<(), WorldError> {
        if !self.contains(to) {
            return Err(WorldError::UnknownNode(to));
        }

        self.remove_mobile(from, &mobile).await;
        self.add_mobile(to, mobile).await?;
        Ok(())
    }

    pub async fn mobiles(&self, location: Location) -> Vec<Mobile> {
        match self.nodes.get(&location) {
            Some(node) => node.read().await.mobiles().cloned().collect(),
            None => Vec::new(),
        }
    }

    pub async fn find_mobile(&self, location: Location, serial: Serial) -> Option<Mobile> {
        let node = self.nodes.get(&location)?;
        let guard = node.read().await;
        let found = guard.mobiles().find(|m| m.serial == serial).cloned();
        found
    }

    /// Adds a creature only while the region holds fewer than `cap` of them.
    /// The count and the insert happen under the same write lock.
    pub async fn add_npc_capped(&self, location: Location, creature: Mobile, cap: usize) -> bool {
        let Some(node) = self.nodes.get(&location) else {
            return false;
        };
        let mut guard = node.write().await;
        if guard.mobiles().filter(|m| !m.is_player()).count() >= cap {
            return false;
        }
        guard.add_mobile(creature)
    }

    pub async fn npc_count(&self, location: Location) -> usize {
        match self.nodes.get(&location) {
            Some(node) => node.read().await.mobiles().filter(|m| !m.is_player()).count(),
            None => 0,
        }
    }
}
