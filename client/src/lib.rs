//! # World Client Library
//!
//! The client keeps a cached view of one player's session and keeps it in
//! step with the authoritative server.
//!
//! ## Architecture Overview
//!
//! ### Reason-Multiplexed Updates
//! The server answers mobile queries with a bitmask of reasons and one
//! optional payload field per reason. The reconciler applies each set bit on
//! its own, so a corrupt field only loses that piece of the update.
//!
//! ### Lazy Caches
//! Inventory and equipment start absent. Asking to use an item before the
//! inventory has arrived yields the request that fetches it rather than a
//! guess.
//!
//! ### Blocking Round Trips
//! Each request waits for the response with its own sequence number, is
//! re-sent on timeout and gives up after a bounded number of attempts.
//! Server pushes arriving in the meantime are applied straight away.
//!
//! ## Module Organization
//!
//! - `state`: the cached state and the reconciler operations
//! - `network`: session lifecycle, request/retry and packet dispatch
//! - `combat_log`: durable combat line sink
//! - `console`: command parsing and text rendering
//! - `config`, `error`: command line settings and the error type
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use client::config::ClientConfig;
//! use client::network::Client;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::new(ClientConfig::default()).await?;
//!     client.login().await?;
//!
//!     let region = client.state().map(|s| s.region().name().to_string());
//!     println!("Logged in at {:?}", region);
//!
//!     client.logout().await?;
//!     Ok(())
//! }
//! ```

pub mod combat_log;
pub mod config;
pub mod console;
pub mod error;
pub mod network;
pub mod state;
