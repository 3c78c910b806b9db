use crate::location::Location;
use serde::{Deserialize, Serialize};
use std::hash::{Hash, Hasher};

/// Unique identity of a mobile. Players use their player id.
pub type Serial = u64;

/// First serial handed out to non-player mobiles, keeping them clear of
/// player ids.
pub const NPC_SERIAL_BASE: Serial = 1 << 48;

/// Whether `player_id` may name a player account. Zero and the creature
/// serial range are reserved.
pub fn is_player_id(player_id: u64) -> bool {
    player_id != 0 && player_id < NPC_SERIAL_BASE
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MobileKind {
    Player,
    Npc,
}

/// An actor in the world: a player or a creature.
///
/// Equality and hashing only consider `serial`, so inserting an updated copy
/// into a set replaces the stale one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mobile {
    pub serial: Serial,
    pub name: String,
    pub kind: MobileKind,
    pub location: Location,
    pub hits: i32,
    pub hits_max: i32,
    pub attack: i32,
}

impl Mobile {
    pub fn player(player_id: u64, name: &str, location: Location) -> Self {
        Self {
            serial: player_id,
            name: name.to_string(),
            kind: MobileKind::Player,
            location,
            hits: 100,
            hits_max: 100,
            attack: 6,
        }
    }

    pub fn npc(serial: Serial, name: &str, location: Location, hits: i32, attack: i32) -> Self {
        Self {
            serial,
            name: name.to_string(),
            kind: MobileKind::Npc,
            location,
            hits,
            hits_max: hits,
            attack,
        }
    }

    pub fn is_player(&self) -> bool {
        self.kind == MobileKind::Player
    }

    pub fn is_alive(&self) -> bool {
        self.hits > 0
    }

    /// Applies damage and returns true if this blow killed the mobile.
    pub fn damage(&mut self, amount: i32) -> bool {
        let was_alive = self.is_alive();
        self.hits = (self.hits - amount.max(0)).max(0);
        was_alive && !self.is_alive()
    }

    pub fn heal(&mut self, amount: i32) {
        self.hits = (self.hits + amount.max(0)).min(self.hits_max);
    }
}

impl PartialEq for Mobile {
    fn eq(&self, other: &Self) -> bool {
        self.serial == other.serial
    }
}

impl Eq for Mobile {}

impl Hash for Mobile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.serial.hash(state);
    }
}
