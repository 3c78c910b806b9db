//! Location, region category and direction types shared by client and server.
//!
//! Every canonical place in the world owns a single bit of [`Location`] so that
//! sets of places (for example the regions a player has unlocked) travel over
//! the wire as one integer mask.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use std::fmt;

bitflags! {
    /// Canonical places in the world, one bit each.
    ///
    /// Bits that are not named here are reserved. `Location::empty()` plays the
    /// role of "no location".
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct Location: u32 {
        const MOONGATE       = 0x0000_0001;

        const BRITAIN        = 0x0000_0004;
        const BUCCANEERS_DEN = 0x0000_0008;
        const COVE           = 0x0000_0010;
        const MINOC          = 0x0000_0020;
        const SKARA_BRAE     = 0x0000_0040;
        const TRINSIC        = 0x0000_0080;
        const VESPER         = 0x0000_0100;
        const YEW            = 0x0000_0200;

        const DESTARD        = 0x0000_0800;
        const DESPISE        = 0x0000_1000;
        const COVETOUS       = 0x0000_2000;
        const SHAME          = 0x0000_4000;
        const WIND           = 0x0000_8000;
        const WRONG          = 0x0001_0000;

        const SOLEN_HIVE     = 0x0008_0000;
        const ORC_CAVES      = 0x0010_0000;

        const GRAVEYARD      = 0x0100_0000;
        const SEWERS         = 0x0200_0000;
        const SWAMP          = 0x0400_0000;
        const WILDERNESS     = 0x0800_0000;

        /// Regions every new account starts with.
        const BASIC = Self::BRITAIN.bits()
            | Self::GRAVEYARD.bits()
            | Self::SEWERS.bits()
            | Self::WILDERNESS.bits();
    }
}

const LOCATION_NAMES: [(Location, &str); 22] = [
    (Location::MOONGATE, "Moongate"),
    (Location::BRITAIN, "Britain"),
    (Location::BUCCANEERS_DEN, "Buccaneers Den"),
    (Location::COVE, "Cove"),
    (Location::MINOC, "Minoc"),
    (Location::SKARA_BRAE, "Skara Brae"),
    (Location::TRINSIC, "Trinsic"),
    (Location::VESPER, "Vesper"),
    (Location::YEW, "Yew"),
    (Location::DESTARD, "Destard"),
    (Location::DESPISE, "Despise"),
    (Location::COVETOUS, "Covetous"),
    (Location::SHAME, "Shame"),
    (Location::WIND, "Wind"),
    (Location::WRONG, "Wrong"),
    (Location::SOLEN_HIVE, "Solen Hive"),
    (Location::ORC_CAVES, "Orc Caves"),
    (Location::GRAVEYARD, "Graveyard"),
    (Location::SEWERS, "Sewers"),
    (Location::SWAMP, "Swamp"),
    (Location::WILDERNESS, "Wilderness"),
    (Location::BASIC, "Basic"),
];

impl Location {
    /// True when exactly one bit is set, i.e. the value names a single place
    /// rather than an aggregate mask.
    pub fn is_single(self) -> bool {
        let bits = self.bits();
        bits != 0 && bits & (bits - 1) == 0
    }

    /// Stable numeric identity of a single location.
    pub fn id(self) -> u32 {
        self.bits()
    }

    pub fn name(self) -> &'static str {
        if self.is_empty() {
            return "None";
        }

        LOCATION_NAMES
            .iter()
            .find(|(location, _)| *location == self)
            .map(|(_, name)| *name)
            .unwrap_or("Unknown")
    }

    /// Looks up a named single location, ignoring case and whitespace.
    pub fn from_display_name(name: &str) -> Option<Location> {
        let wanted: String = name
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();

        LOCATION_NAMES
            .iter()
            .filter(|(location, _)| location.is_single())
            .find(|(_, known)| known.replace(' ', "").to_lowercase() == wanted)
            .map(|(location, _)| *location)
    }

    /// Iterates the single named locations contained in this mask, in
    /// ascending bit order.
    pub fn singles(self) -> impl Iterator<Item = Location> {
        LOCATION_NAMES
            .iter()
            .map(|(location, _)| *location)
            .filter(move |location| location.is_single() && self.contains(*location))
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

bitflags! {
    /// Category of a region. Categories combine, e.g. an open-world PvP zone.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct RegionType: u8 {
        const TOWN       = 1;
        const DUNGEON    = 2;
        const OPEN_WORLD = 4;
        const PVP        = 8;
    }
}

/// Directions an actor may wander inside a traversable region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    None,
    North,
    South,
    East,
    West,
}

impl Direction {
    pub const ALL: [Direction; 5] = [
        Direction::None,
        Direction::North,
        Direction::South,
        Direction::East,
        Direction::West,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Direction::None => "None",
            Direction::North => "North",
            Direction::South => "South",
            Direction::East => "East",
            Direction::West => "West",
        }
    }

    /// Case-insensitive match of a direction word. Never yields `None` from a
    /// token; an unknown word maps to `Direction::None`.
    pub fn from_word(word: &str) -> Direction {
        let word = word.trim();
        Self::ALL
            .iter()
            .copied()
            .filter(|dir| *dir != Direction::None)
            .find(|dir| dir.name().eq_ignore_ascii_case(word))
            .unwrap_or(Direction::None)
    }
}
