//! Types shared by the world server and its clients: the location catalog,
//! mobiles, world graph nodes and the packet protocol.

pub mod location;
pub mod mobile;
pub mod node;
pub mod packets;
pub mod world;

pub use location::{Direction, Location, RegionType};
pub use mobile::{is_player_id, Mobile, MobileKind, Serial, NPC_SERIAL_BASE};
pub use node::Node;
pub use packets::{decode, encode, CodecError, Frame, MobilePayload, MobileReason, Packet};
pub use world::{World, WorldError};

pub const PROTOCOL_VERSION: u32 = 1;

/// Largest datagram either side will read.
pub const MAX_DATAGRAM_SIZE: usize = 8192;

/// Region new and resurrected players appear in.
pub const STARTING_LOCATION: Location = Location::BRITAIN;
