//! Client-side cache of everything the server has told us about our session.
//!
//! [`ClientState`] is owned by exactly one task. Server packets are merged in
//! through the `apply_*` methods, which touch only the fields a packet
//! actually carries. When a cache the user needs is still absent the state
//! hands back the request packet that would fill it instead of guessing.
//!
//! Inventory and equipment use `Option` so that "never fetched" and "fetched
//! but empty" stay distinct.

use crate::combat_log::CombatSink;
use log::{debug, warn};
use shared::{Direction, Location, Mobile, MobilePayload, MobileReason, Node, Packet};
use std::collections::{BTreeMap, VecDeque};

/// Things worth showing to the user, queued until the front-end drains them.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Paperdoll(String),
    Region(Node),
    Nearby(Vec<Mobile>),
    Combat(Vec<String>),
    ItemUsed(String),
    Resurrected,
    Warning(String),
}

#[derive(Debug)]
pub struct ClientState {
    player_id: u64,
    account: Mobile,
    region: Node,
    previous_region: Option<Node>,
    last_target: Option<Mobile>,
    nearby: Vec<Mobile>,
    inventory: Option<BTreeMap<u32, String>>,
    equipment: Option<BTreeMap<u32, String>>,
    paperdoll: Option<String>,
    alive: bool,
    unlocked: Location,
    events: VecDeque<ClientEvent>,
}

impl ClientState {
    /// Builds the cache once the first region arrives. Returns None when the
    /// account is not a player or the region is not a single location.
    pub fn new(player_id: u64, account: Mobile, region: Node, unlocked: Location) -> Option<Self> {
        if !account.is_player() || !region.is_valid() {
            return None;
        }

        let alive = account.is_alive();
        let mut state = Self {
            player_id,
            account,
            region: region.clone(),
            previous_region: None,
            last_target: None,
            nearby: Vec::new(),
            inventory: None,
            equipment: None,
            paperdoll: None,
            alive,
            unlocked,
            events: VecDeque::new(),
        };
        state.events.push_back(ClientEvent::Region(region));
        Some(state)
    }

    pub fn player_id(&self) -> u64 {
        self.player_id
    }

    pub fn account(&self) -> &Mobile {
        &self.account
    }

    pub fn region(&self) -> &Node {
        &self.region
    }

    pub fn previous_region(&self) -> Option<&Node> {
        self.previous_region.as_ref()
    }

    pub fn last_target(&self) -> Option<&Mobile> {
        self.last_target.as_ref()
    }

    pub fn nearby_mobiles(&self) -> &[Mobile] {
        &self.nearby
    }

    pub fn inventory(&self) -> Option<&BTreeMap<u32, String>> {
        self.inventory.as_ref()
    }

    pub fn equipment(&self) -> Option<&BTreeMap<u32, String>> {
        self.equipment.as_ref()
    }

    pub fn paperdoll(&self) -> Option<&str> {
        self.paperdoll.as_deref()
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn unlocked(&self) -> Location {
        self.unlocked
    }

    /// Installs a new current region and demotes the old one to previous.
    /// A region at the current location, or one that is not a single
    /// location, is refused and leaves the state untouched.
    pub fn set_region(&mut self, region: Node) -> bool {
        if !region.is_valid() || region.location() == self.region.location() {
            return false;
        }

        let old = std::mem::replace(&mut self.region, region.clone());
        self.previous_region = Some(old);
        self.events.push_back(ClientEvent::Region(region));
        true
    }

    pub fn set_account(&mut self, account: Mobile) -> bool {
        if !account.is_player() {
            warn!("Refusing non-player account {}", account.serial);
            return false;
        }
        self.account = account;
        true
    }

    pub fn set_last_target(&mut self, target: Option<Mobile>) {
        self.last_target = target;
    }

    pub fn set_nearby_mobiles(&mut self, mobiles: Vec<Mobile>) {
        self.nearby = mobiles;
        self.events.push_back(ClientEvent::Nearby(self.nearby.clone()));
    }

    /// Adds regions to the unlocked set. The set never shrinks.
    pub fn unlock(&mut self, regions: Location) -> Location {
        self.unlocked |= regions;
        self.unlocked
    }

    /// Merges a mobile update, one reason bit at a time. A bit whose field is
    /// missing is reported and skipped; the other bits still apply. Returns
    /// the bits that changed the cache. A region the cache refuses does not
    /// count.
    pub fn apply_mobile_update(
        &mut self,
        reason: MobileReason,
        payload: &MobilePayload,
    ) -> MobileReason {
        let mut applied = MobileReason::empty();

        for part in reason.decompose() {
            let outcome = if part == MobileReason::PAPERDOLL {
                payload.paperdoll.as_ref().map(|text| {
                    self.paperdoll = Some(text.clone());
                    self.events.push_back(ClientEvent::Paperdoll(text.clone()));
                    true
                })
            } else if part == MobileReason::LOCATION {
                payload
                    .region
                    .as_ref()
                    .map(|region| self.set_region(region.clone()))
            } else if part == MobileReason::IS_DEAD {
                payload.is_alive.map(|alive| {
                    self.alive = alive;
                    true
                })
            } else if part == MobileReason::ITEMS {
                payload.items.as_ref().map(|items| {
                    self.inventory = Some(items.clone());
                    true
                })
            } else if part == MobileReason::EQUIPMENT {
                payload.equipment.as_ref().map(|equipment| {
                    self.equipment = Some(equipment.clone());
                    true
                })
            } else {
                None
            };

            match outcome {
                Some(true) => applied |= part,
                Some(false) => debug!("Mobile update for {:?} left the cache unchanged", part),
                None => self.warn(format!("Mobile update for {:?} arrived without its data", part)),
            }
        }

        applied
    }

    /// Applies a combat outcome. Liveness is marked before the lines are
    /// looked at; a missing line list is a protocol fault and writes nothing.
    pub fn apply_combat_update(
        &mut self,
        is_alive: bool,
        updates: Option<&[String]>,
        sink: &mut dyn CombatSink,
    ) -> bool {
        if !is_alive {
            self.alive = false;
        }

        match updates {
            Some(lines) => {
                sink.record(lines);
                self.events.push_back(ClientEvent::Combat(lines.to_vec()));
                true
            }
            None => {
                self.warn("Combat update arrived without any lines".to_string());
                false
            }
        }
    }

    /// Handles a resurrection response. Only a successful response for our own
    /// player changes anything; the region itself is refreshed through the
    /// returned request.
    pub fn apply_resurrection(
        &mut self,
        player_id: u64,
        location: Location,
        success: bool,
    ) -> Option<Packet> {
        if player_id != self.player_id {
            debug!("Ignoring resurrection for player {}", player_id);
            return None;
        }
        if !success {
            self.warn("Resurrection failed".to_string());
            return None;
        }

        self.alive = true;
        self.events.push_back(ClientEvent::Resurrected);
        Some(Packet::get_node(self.player_id, location))
    }

    /// Turns a 1-based position in the inventory listing into a use request.
    ///
    /// Without an inventory the request to fetch one is returned instead.
    /// Positions follow ascending slot id, the same order
    /// [`ClientState::inventory_listing`] shows.
    pub fn select_and_use_item(&self, selection: i64) -> Option<Packet> {
        let Some(inventory) = &self.inventory else {
            return Some(Packet::get_mobile(self.player_id, MobileReason::ITEMS));
        };

        if selection < 1 || selection as u64 > inventory.len() as u64 {
            return None;
        }

        let slot = inventory.keys().nth((selection - 1) as usize)?;
        Some(Packet::use_item(self.player_id, *slot))
    }

    /// Applies a use-item response. The inventory is dropped afterwards since
    /// using an item may have changed it.
    pub fn apply_item_response(&mut self, response: Option<String>) {
        match response {
            Some(text) => self.events.push_back(ClientEvent::ItemUsed(text)),
            None => self.warn("Item use returned no response".to_string()),
        }
        self.inventory = None;
    }

    pub fn apply_local_mobiles(&mut self, mobiles: Option<Vec<Mobile>>) {
        match mobiles {
            Some(mobiles) => self.set_nearby_mobiles(mobiles),
            None => self.warn("Nearby list arrived empty-handed".to_string()),
        }
    }

    /// Numbered inventory entries as `(position, slot, label)`.
    pub fn inventory_listing(&self) -> Option<Vec<(usize, u32, &str)>> {
        self.inventory.as_ref().map(|inventory| {
            inventory
                .iter()
                .enumerate()
                .map(|(i, (slot, label))| (i + 1, *slot, label.as_str()))
                .collect()
        })
    }

    /// Connections of the current region that name a single place, in
    /// ascending identity.
    pub fn travelable_connections(&self) -> Vec<Location> {
        self.region
            .connections()
            .iter()
            .copied()
            .filter(|location| location.is_single())
            .collect()
    }

    /// Resolves a user's travel choice. `0` stays put, `N` picks the Nth
    /// travelable connection and a region name picks that connection.
    pub fn resolve_region_token(&self, token: &str) -> Option<Location> {
        let token = token.trim();
        let connections = self.travelable_connections();

        match token.parse::<i64>() {
            Ok(0) => Some(self.region.location()),
            Ok(n) if n > 0 => connections.get((n - 1) as usize).copied(),
            Ok(_) => None,
            Err(_) => Location::from_display_name(token).filter(|l| connections.contains(l)),
        }
    }

    pub fn resolve_direction_token(&self, token: &str) -> Option<Direction> {
        if !self.region.can_traverse() {
            return None;
        }
        match Direction::from_word(token) {
            Direction::None => None,
            direction => Some(direction),
        }
    }

    pub fn drain_events(&mut self) -> Vec<ClientEvent> {
        self.events.drain(..).collect()
    }

    fn warn(&mut self, message: String) {
        warn!("{}", message);
        self.events.push_back(ClientEvent::Warning(message));
    }
}
