//! Key to shard routing.

use crate::error::{Error, Result};

/// Index into the server list.
pub type ShardIndex = usize;

/// Routes keys over a fixed, non-empty server list.
///
/// The CRC-32 of the key is unsigned, so the modulo result is always a valid
/// index. Adding or removing a server remaps most keys; there is no
/// rebalancing.
#[derive(Debug, Clone)]
pub struct Router {
    servers: Vec<String>,
}

impl Router {
    pub fn new(servers: Vec<String>) -> Result<Self> {
        if servers.is_empty() {
            return Err(Error::config("servers empty"));
        }
        Ok(Self { servers })
    }

    pub fn shard_for(&self, key: &str) -> ShardIndex {
        crc32fast::hash(key.as_bytes()) as usize % self.servers.len()
    }

    pub fn server(&self, shard: ShardIndex) -> Option<&str> {
        self.servers.get(shard).map(String::as_str)
    }

    pub fn servers(&self) -> &[String] {
        &self.servers
    }

    pub fn len(&self) -> usize {
        self.servers.len()
    }

    /// Always false; construction rejects an empty list.
    pub fn is_empty(&self) -> bool {
        self.servers.is_empty()
    }
}
