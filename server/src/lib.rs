//! # World Server Library
//!
//! The authoritative side of the game. It owns the world graph, the records
//! of every online player and the persistent store, and answers each client
//! request with the state the client is allowed to mirror.
//!
//! ## Architecture Design
//!
//! ### Single-Threaded Event Loop
//! All requests are resolved sequentially by one event loop. Network I/O,
//! session timeouts and creature spawning run as separate tasks that talk
//! to the loop over channels.
//!
//! ### Per-Region Locking
//! Each region of the [`world::WorldMap`] sits behind its own lock. The
//! spawner and the event loop touch occupants concurrently, but no
//! operation ever holds two region locks at once.
//!
//! ### UDP Request/Response
//! Every datagram is one bincode frame. Requests carry a non-zero sequence
//! number that the reply echoes; unsolicited pushes use sequence zero.
//!
//! ## Module Organization
//!
//! - `client_manager`: sessions keyed by address, capacity and timeouts
//! - `combat`: the damage resolution seam
//! - `config`: command line settings
//! - `game`: request resolution and player records
//! - `network`: socket tasks and the event loop
//! - `spawner`: creature generation for dungeons and open country
//! - `store`: SQLite blob persistence
//! - `world`: the concurrently shared world graph
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//! use server::store::SqliteStore;
//! use shared::World;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig::default();
//!     let store = Box::new(SqliteStore::open(&config.database)?);
//!     let mut server = Server::new(&config, World::britannia()?, store).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod combat;
pub mod config;
pub mod error;
pub mod game;
pub mod network;
pub mod spawner;
pub mod store;
pub mod world;
