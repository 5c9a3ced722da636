//! # GlobalKV client
//!
//! A blocking client that makes a set of plain TCP key-value servers look like
//! one shared, mutable namespace. Processes use it for globally visible state
//! such as counters, flags and small shared objects.
//!
//! ## How a request travels
//!
//! - **Router**: the key's CRC-32 picks one server from the fixed list
//! - **Connections**: one socket per server, opened on first use and kept
//! - **Framing**: the request record is encoded with the configured codec and
//!   sent as a length-prefixed frame; the response comes back the same way
//! - **Operations**: `read`, `write`, `delete`, `exists`, `compare_and_swap`
//!
//! There is no replication, rebalancing, authentication or retry. Every
//! failure goes straight back to the caller.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use globalkv::{Client, Result};
//!
//! fn main() -> Result<()> {
//!     let mut client = Client::new(["127.0.0.1:7901", "127.0.0.1:7902"])?;
//!
//!     client.write("visits", &0u64)?;
//!     loop {
//!         let current: u64 = client.read("visits")?.unwrap_or(0);
//!         if client.compare_and_swap("visits", &current, &(current + 1))? {
//!             break;
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod frame;
pub mod protocol;
pub mod router;
pub mod scheduler;

// Re-export main types
pub use client::Client;
pub use codec::Codec;
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use router::ShardIndex;
pub use scheduler::{Scheduler, TokioScheduler};
