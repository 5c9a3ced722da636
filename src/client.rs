//! Synchronous GlobalKV client implementation

use log::debug;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;

use crate::codec::Codec;
use crate::config::ClientConfig;
use crate::connection::{self, ConnectionManager};
use crate::error::Result;
use crate::frame;
use crate::protocol::{Request, CAS_OK};
use crate::router::{Router, ShardIndex};
use crate::scheduler::Scheduler;

/// Blocking client for a sharded GlobalKV cluster.
///
/// Every key lives on exactly one server, picked by hashing the key over the
/// fixed server list. Each operation is one request frame and one response
/// frame on that server's connection, and blocks until both are done or a
/// socket timeout fires.
///
/// The client is meant for one thread at a time; operations take `&mut self`.
/// Use one client per worker when sharing state across threads.
///
/// # Example
///
/// ```rust,no_run
/// use globalkv::{Client, Result};
///
/// fn main() -> Result<()> {
///     let mut client = Client::new(["127.0.0.1:7901", "127.0.0.1:7902"])?;
///
///     client.write("foo", &"bar")?;
///     let value: Option<String> = client.read("foo")?;
///     assert_eq!(value.as_deref(), Some("bar"));
///
///     client.delete("foo")?;
///     assert!(!client.exists("foo")?);
///     Ok(())
/// }
/// ```
pub struct Client {
    router: Router,
    connections: ConnectionManager,
    codec: Codec,
}

impl Client {
    /// Create a client with default settings for the given servers.
    ///
    /// No connection is opened until a key routes to a server. Fails with
    /// `Error::Config` when `servers` is empty.
    pub fn new<I, S>(servers: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::from_config(ClientConfig::new(servers))
    }

    /// Create a client from a full configuration.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        Self::build(config, None)
    }

    /// Create a client whose connections send keepalives through `scheduler`.
    pub fn with_scheduler(config: ClientConfig, scheduler: Arc<dyn Scheduler>) -> Result<Self> {
        Self::build(config, Some(scheduler))
    }

    fn build(config: ClientConfig, scheduler: Option<Arc<dyn Scheduler>>) -> Result<Self> {
        config.validate()?;
        let connections = ConnectionManager::new(&config, scheduler);
        Ok(Client {
            router: Router::new(config.servers)?,
            connections,
            codec: config.codec,
        })
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn write<V: Serialize>(&mut self, key: &str, value: &V) -> Result<()> {
        let request = Request::set(key, self.codec.encode(value)?);
        let ack = self.exchange(&request)?;
        debug!("SET {} acknowledged with {} bytes", key, ack.len());
        Ok(())
    }

    /// Fetch the value under `key`, or `None` when the server has none.
    ///
    /// A stored value that encodes to the codec's null (for example `None`
    /// under json) also comes back as `None`.
    pub fn read<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        match self.fetch(key)? {
            Some(payload) => self.codec.decode(&payload).map(Some),
            None => Ok(None),
        }
    }

    /// Whether `key` currently has a value.
    ///
    /// Same answer as `read(key)?.is_some()`, so a key holding a null-encoded
    /// value reports `false`. The wire format cannot tell the two apart.
    pub fn exists(&mut self, key: &str) -> Result<bool> {
        Ok(self.fetch(key)?.is_some())
    }

    /// Remove `key`. Removing a missing key is not an error.
    pub fn delete(&mut self, key: &str) -> Result<()> {
        let ack = self.exchange(&Request::delete(key))?;
        debug!("DELETE {} acknowledged with {} bytes", key, ack.len());
        Ok(())
    }

    /// Replace the value under `key` with `new_value` if it still equals
    /// `expected_old`.
    ///
    /// The server compares a digest of the encoded `expected_old` against the
    /// stored bytes. Returns `Ok(false)` when it does not match; that is an
    /// ordinary outcome, not an error. Whether two racing swaps with the same
    /// expectation can both win depends on the server serializing them.
    pub fn compare_and_swap<O, N>(
        &mut self,
        key: &str,
        expected_old: &O,
        new_value: &N,
    ) -> Result<bool>
    where
        O: Serialize,
        N: Serialize,
    {
        let old = self.codec.encode(expected_old)?;
        let request = Request::cas(key, &old, self.codec.encode(new_value)?);
        let response = self.exchange(&request)?;
        let swapped = response == CAS_OK;
        debug!("CAS {} -> {}", key, swapped);
        Ok(swapped)
    }

    /// Shard that owns `key`.
    pub fn shard_for(&self, key: &str) -> ShardIndex {
        self.router.shard_for(key)
    }

    /// Address of the server that owns `key`.
    pub fn server_for(&self, key: &str) -> &str {
        let shard = self.router.shard_for(key);
        self.router.server(shard).unwrap_or_default()
    }

    pub fn servers(&self) -> &[String] {
        self.router.servers()
    }

    pub fn codec(&self) -> Codec {
        self.codec
    }

    /// Number of servers this client currently holds a connection to.
    pub fn open_connections(&self) -> usize {
        self.connections.open_connections()
    }

    /// Forget the cached connection for `shard`; the next request reconnects.
    ///
    /// The client never does this on its own, even after a transport error.
    pub fn reset_shard(&mut self, shard: ShardIndex) -> bool {
        self.connections.reset(shard)
    }

    fn fetch(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let payload = self.exchange(&Request::get(key))?;
        if self.codec.is_absent(&payload) {
            debug!("GET {} -> absent", key);
            Ok(None)
        } else {
            debug!("GET {} -> {} bytes", key, payload.len());
            Ok(Some(payload))
        }
    }

    /// Send one request to the key's shard and return the response payload.
    fn exchange(&mut self, request: &Request) -> Result<Vec<u8>> {
        let shard = self.router.shard_for(&request.key);
        let shared = self.connections.get(shard)?;
        let frame = frame::encode_request(request, self.codec)?;

        let mut conn = connection::lock(&shared);
        debug!("Sending {:?} {} to {}", request.cmd, request.key, conn.addr());
        conn.round_trip(&frame)
    }
}
