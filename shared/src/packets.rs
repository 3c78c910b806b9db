//! Wire protocol between client and server.
//!
//! Every datagram is one bincode-encoded [`Frame`]. A request carries a
//! non-zero sequence chosen by the client and the server echoes it on the
//! response; unsolicited server pushes use sequence 0.

use crate::location::{Direction, Location};
use crate::mobile::{Mobile, Serial};
use crate::node::Node;
use bincode::{deserialize, serialize};
use bitflags::{bitflags, Flags};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Sequence number reserved for server pushes.
pub const PUSH_SEQUENCE: u32 = 0;

bitflags! {
    /// Categories of mobile information a `GetMobile` exchange carries.
    /// Combine bits to ask for several in one round trip.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
    pub struct MobileReason: u32 {
        const PAPERDOLL = 1 << 0;
        const LOCATION  = 1 << 1;
        const IS_DEAD   = 1 << 2;
        const ITEMS     = 1 << 3;
        const EQUIPMENT = 1 << 4;
    }
}

impl MobileReason {
    /// Splits a combined mask into its defined single bits, each exactly once,
    /// in declaration order. Reserved bits are dropped.
    pub fn decompose(self) -> Vec<MobileReason> {
        let mut working = self;
        let mut parts = Vec::new();

        for flag in Self::FLAGS {
            if working.is_empty() {
                break;
            }

            let candidate = *flag.value();
            if candidate.bits().count_ones() != 1 {
                continue;
            }

            if working.contains(candidate) {
                parts.push(candidate);
                working.remove(candidate);
            }
        }

        parts
    }
}

/// Per-reason payload of a `GetMobile` response. A field is only meaningful
/// when its reason bit is set; a set bit with a missing field is a corrupt
/// update for that bit alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MobilePayload {
    pub paperdoll: Option<String>,
    pub region: Option<Node>,
    pub is_alive: Option<bool>,
    pub items: Option<BTreeMap<u32, String>>,
    pub equipment: Option<BTreeMap<u32, String>>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Authenticate {
        client_version: u32,
        player_id: u64,
        name: String,
    },
    Authenticated {
        player_id: u64,
        account: Mobile,
        unlocked: Location,
        location: Location,
    },
    GetNode {
        player_id: u64,
        location: Location,
        node: Option<Node>,
        unlocked: Location,
    },
    GetMobile {
        player_id: u64,
        reason: MobileReason,
        payload: MobilePayload,
    },
    GetLocalMobiles {
        player_id: u64,
        mobiles: Option<Vec<Mobile>>,
    },
    MoveMobile {
        player_id: u64,
        destination: Location,
        direction: Direction,
    },
    Attack {
        player_id: u64,
        target: Serial,
    },
    CombatMobile {
        player_id: u64,
        is_alive: bool,
        updates: Option<Vec<String>>,
    },
    Resurrect {
        player_id: u64,
        location: Location,
        success: bool,
    },
    UseItem {
        player_id: u64,
        item: u32,
        response: Option<String>,
    },
    Heartbeat {
        timestamp: u64,
    },
    Logout {
        player_id: u64,
    },
    Disconnected {
        reason: String,
    },
    Rejected {
        reason: String,
    },
}

impl Packet {
    pub fn get_node(player_id: u64, location: Location) -> Self {
        Packet::GetNode {
            player_id,
            location,
            node: None,
            unlocked: Location::empty(),
        }
    }

    pub fn get_mobile(player_id: u64, reason: MobileReason) -> Self {
        Packet::GetMobile {
            player_id,
            reason,
            payload: MobilePayload::default(),
        }
    }

    pub fn use_item(player_id: u64, item: u32) -> Self {
        Packet::UseItem {
            player_id,
            item,
            response: None,
        }
    }

    pub fn get_local_mobiles(player_id: u64) -> Self {
        Packet::GetLocalMobiles {
            player_id,
            mobiles: None,
        }
    }

    /// The player a packet speaks for, if it carries one.
    pub fn player_id(&self) -> Option<u64> {
        match self {
            Packet::Authenticate { player_id, .. }
            | Packet::Authenticated { player_id, .. }
            | Packet::GetNode { player_id, .. }
            | Packet::GetMobile { player_id, .. }
            | Packet::GetLocalMobiles { player_id, .. }
            | Packet::MoveMobile { player_id, .. }
            | Packet::Attack { player_id, .. }
            | Packet::CombatMobile { player_id, .. }
            | Packet::Resurrect { player_id, .. }
            | Packet::UseItem { player_id, .. }
            | Packet::Logout { player_id } => Some(*player_id),
            Packet::Heartbeat { .. } | Packet::Disconnected { .. } | Packet::Rejected { .. } => {
                None
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Packet::Authenticate { .. } => "Authenticate",
            Packet::Authenticated { .. } => "Authenticated",
            Packet::GetNode { .. } => "GetNode",
            Packet::GetMobile { .. } => "GetMobile",
            Packet::GetLocalMobiles { .. } => "GetLocalMobiles",
            Packet::MoveMobile { .. } => "MoveMobile",
            Packet::Attack { .. } => "Attack",
            Packet::CombatMobile { .. } => "CombatMobile",
            Packet::Resurrect { .. } => "Resurrect",
            Packet::UseItem { .. } => "UseItem",
            Packet::Heartbeat { .. } => "Heartbeat",
            Packet::Logout { .. } => "Logout",
            Packet::Disconnected { .. } => "Disconnected",
            Packet::Rejected { .. } => "Rejected",
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Frame {
    pub sequence: u32,
    pub packet: Packet,
}

impl Frame {
    pub fn new(sequence: u32, packet: Packet) -> Self {
        Self { sequence, packet }
    }

    pub fn push(packet: Packet) -> Self {
        Self::new(PUSH_SEQUENCE, packet)
    }

    pub fn is_push(&self) -> bool {
        self.sequence == PUSH_SEQUENCE
    }
}

#[derive(Debug, Error)]
#[error("packet codec failure: {0}")]
pub struct CodecError(#[from] bincode::Error);

pub fn encode(frame: &Frame) -> Result<Vec<u8>, CodecError> {
    Ok(serialize(frame)?)
}

pub fn decode(bytes: &[u8]) -> Result<Frame, CodecError> {
    Ok(deserialize(bytes)?)
}
