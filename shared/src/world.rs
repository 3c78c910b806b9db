//! The world graph: every [`Node`] keyed by its [`Location`], plus the
//! symmetric connections between them.

use crate::location::{Location, RegionType};
use crate::node::Node;
use log::debug;
use std::collections::btree_map;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WorldError {
    #[error("location {0:#x} is not a single place")]
    InvalidLocation(u32),
    #[error("node {0} already exists")]
    DuplicateNode(Location),
    #[error("node {0} does not exist")]
    UnknownNode(Location),
    #[error("node {0} cannot connect to itself")]
    SelfConnection(Location),
}

#[derive(Debug, Clone, Default)]
pub struct World {
    nodes: BTreeMap<Location, Node>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new node under `location`.
    pub fn create(
        &mut self,
        region_type: RegionType,
        location: Location,
        description: &str,
    ) -> Result<&Node, WorldError> {
        if !location.is_single() {
            return Err(WorldError::InvalidLocation(location.bits()));
        }

        match self.nodes.entry(location) {
            btree_map::Entry::Occupied(_) => Err(WorldError::DuplicateNode(location)),
            btree_map::Entry::Vacant(slot) => {
                Ok(slot.insert(Node::new(region_type, location, description)))
            }
        }
    }

    /// Connects two nodes in both directions. Returns false if they were
    /// already connected.
    pub fn connect(&mut self, a: Location, b: Location) -> Result<bool, WorldError> {
        if a == b {
            return Err(WorldError::SelfConnection(a));
        }
        for location in [a, b] {
            if !self.nodes.contains_key(&location) {
                return Err(WorldError::UnknownNode(location));
            }
        }

        let mut added = false;
        if let Some(node) = self.nodes.get_mut(&a) {
            added |= node.link(b);
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            added |= node.link(a);
        }
        if added {
            debug!("Connected {} <-> {}", a, b);
        }
        Ok(added)
    }

    pub fn get(&self, location: Location) -> Option<&Node> {
        self.nodes.get(&location)
    }

    /// Mutable access for occupant changes. Connections stay read-only.
    pub fn get_mut(&mut self, location: Location) -> Option<&mut Node> {
        self.nodes.get_mut(&location)
    }

    pub fn connections(&self, location: Location) -> Option<&BTreeSet<Location>> {
        self.nodes.get(&location).map(Node::connections)
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

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    pub fn into_nodes(self) -> impl Iterator<Item = Node> {
        self.nodes.into_values()
    }

    /// Builds the shipped world: towns around the moongate hub, open country
    /// between them and a dungeon off most towns.
    pub fn britannia() -> Result<Self, WorldError> {
        let town = RegionType::TOWN;
        let dungeon = RegionType::DUNGEON;
        let open = RegionType::OPEN_WORLD;

        let catalog = [
            (town, Location::MOONGATE, "A shimmering gate joining the great cities."),
            (town, Location::BRITAIN, "The capital, bustling with merchants and guards."),
            (town | RegionType::PVP, Location::BUCCANEERS_DEN, "A lawless pirate haven."),
            (town, Location::COVE, "A small walled town beside the orc lands."),
            (town, Location::MINOC, "A mining town in the northern mountains."),
            (town, Location::SKARA_BRAE, "An island town of rangers."),
            (town, Location::TRINSIC, "A city of paladins behind high walls."),
            (town, Location::VESPER, "A town of canals and bridges."),
            (town, Location::YEW, "A quiet town deep in the forest."),
            (dungeon, Location::DESTARD, "Dragons nest in the halls of Destard."),
            (dungeon, Location::DESPISE, "Twisting caverns full of lizardmen."),
            (dungeon, Location::COVETOUS, "Harpies shriek in the dark."),
            (dungeon, Location::SHAME, "Elementals guard these ruins."),
            (dungeon, Location::WIND, "A mage sanctuary sealed in rock."),
            (dungeon, Location::WRONG, "The prison of the forsaken."),
            (dungeon, Location::SOLEN_HIVE, "Giant ants burrow here."),
            (dungeon, Location::ORC_CAVES, "The stronghold of the orc clans."),
            (open | RegionType::PVP, Location::GRAVEYARD, "Restless dead walk among the graves."),
            (dungeon, Location::SEWERS, "Rats and worse beneath Britain."),
            (open, Location::SWAMP, "Fetid water and clinging mud."),
            (open, Location::WILDERNESS, "Rolling hills and dark woods between towns."),
        ];

        let links = [
            (Location::BRITAIN, Location::GRAVEYARD),
            (Location::BRITAIN, Location::SEWERS),
            (Location::BRITAIN, Location::WILDERNESS),
            (Location::BRITAIN, Location::MOONGATE),
            (Location::MOONGATE, Location::YEW),
            (Location::MOONGATE, Location::MINOC),
            (Location::MOONGATE, Location::TRINSIC),
            (Location::MOONGATE, Location::VESPER),
            (Location::MOONGATE, Location::SKARA_BRAE),
            (Location::MOONGATE, Location::BUCCANEERS_DEN),
            (Location::MOONGATE, Location::COVE),
            (Location::WILDERNESS, Location::YEW),
            (Location::WILDERNESS, Location::MINOC),
            (Location::WILDERNESS, Location::TRINSIC),
            (Location::WILDERNESS, Location::VESPER),
            (Location::WILDERNESS, Location::COVE),
            (Location::WILDERNESS, Location::SWAMP),
            (Location::WILDERNESS, Location::DESPISE),
            (Location::SWAMP, Location::SOLEN_HIVE),
            (Location::YEW, Location::WRONG),
            (Location::MINOC, Location::WIND),
            (Location::TRINSIC, Location::DESTARD),
            (Location::VESPER, Location::COVETOUS),
            (Location::COVE, Location::ORC_CAVES),
            (Location::SKARA_BRAE, Location::SHAME),
        ];

        let mut world = World::new();
        for (region_type, location, description) in catalog {
            world.create(region_type, location, description)?;
        }
        for (a, b) in links {
            world.connect(a, b)?;
        }

        Ok(world)
    }
}
