use crate::location::{Location, RegionType};
use crate::mobile::Mobile;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::hash::{Hash, Hasher};

/// A single place in the world graph.
///
/// Identity and category are fixed at construction. Connections can only be
/// added through [`crate::world::World::connect`], which keeps them symmetric.
/// Occupants change as mobiles move, spawn and die.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    id: u32,
    name: String,
    description: String,
    region_type: RegionType,
    location: Location,
    connections: BTreeSet<Location>,
    mobiles: HashSet<Mobile>,
}

impl Node {
    pub fn new(region_type: RegionType, location: Location, description: &str) -> Self {
        Self {
            id: location.id(),
            name: location.name().to_string(),
            description: description.to_string(),
            region_type,
            location,
            connections: BTreeSet::new(),
            mobiles: HashSet::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn region_type(&self) -> RegionType {
        self.region_type
    }

    pub fn location(&self) -> Location {
        self.location
    }

    /// Creatures may be generated here. Derived from the category on every call.
    pub fn is_spawnable(&self) -> bool {
        self.region_type
            .intersects(RegionType::DUNGEON | RegionType::OPEN_WORLD)
    }

    /// Directional wandering is only possible where creatures roam.
    pub fn can_traverse(&self) -> bool {
        self.is_spawnable()
    }

    pub fn is_pvp(&self) -> bool {
        self.region_type.contains(RegionType::PVP)
    }

    /// A node is usable as a region when it names exactly one location.
    pub fn is_valid(&self) -> bool {
        self.location.is_single() && self.id == self.location.id()
    }

    /// Neighbouring locations in ascending identity order.
    pub fn connections(&self) -> &BTreeSet<Location> {
        &self.connections
    }

    pub fn is_connected(&self, location: Location) -> bool {
        self.connections.contains(&location)
    }

    pub(crate) fn link(&mut self, location: Location) -> bool {
        self.connections.insert(location)
    }

    pub fn mobiles(&self) -> impl Iterator<Item = &Mobile> {
        self.mobiles.iter()
    }

    pub fn mobile_count(&self) -> usize {
        self.mobiles.len()
    }

    /// Inserts the mobile, replacing a stale copy with the same serial.
    /// Returns whether the occupant count grew.
    pub fn add_mobile(&mut self, mobile: Mobile) -> bool {
        let replaced = self.mobiles.remove(&mobile);
        self.mobiles.insert(mobile);
        !replaced
    }

    pub fn remove_mobile(&mut self, mobile: &Mobile) -> bool {
        self.mobiles.remove(mobile)
    }

    pub fn has_mobile(&self, mobile: &Mobile) -> bool {
        self.mobiles.contains(mobile)
    }

    /// Replaces an occupant that is already present. Returns false and leaves
    /// the node untouched when the mobile is not here.
    pub fn update_mobile(&mut self, mobile: Mobile) -> bool {
        if !self.remove_mobile(&mobile) {
            return false;
        }
        self.mobiles.insert(mobile);
        true
    }

    /// Copy of the node without its occupants, for sending to clients.
    pub fn snapshot(&self) -> Node {
        Node {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            region_type: self.region_type,
            location: self.location,
            connections: self.connections.clone(),
            mobiles: HashSet::new(),
        }
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
            && self.location == other.location
            && self.region_type == other.region_type
    }
}

impl Eq for Node {}

impl Hash for Node {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.location.hash(state);
        self.region_type.hash(state);
    }
}
