//! # Per-shard Connections
//!
//! One long-lived TCP connection per shard, opened the first time a key routes
//! there and reused for the life of the client. There is no health checking
//! and no automatic reconnect: a transport failure is returned to the caller
//! and the cached connection stays in place. Callers that want a fresh socket
//! call [`ConnectionManager::reset`].
//!
//! Connections sit behind a mutex only so a keepalive running on a scheduler
//! thread cannot interleave its bytes with a request in flight. A keepalive
//! whose write fails may have left part of a frame on the wire, so it marks
//! the connection broken and every later request on it fails fast until the
//! caller resets the shard.

use log::{debug, info, warn};
use std::collections::HashMap;
use std::io;
use std::ops::ControlFlow;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError, TryLockError, Weak};
use std::time::Duration;

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::frame::{self, HEARTBEAT_FRAME};
use crate::router::ShardIndex;
use crate::scheduler::{Scheduler, Task};

/// Connection handle shared between the client and its keepalive task.
pub type SharedConnection = Arc<Mutex<Connection>>;

/// An open socket to one server.
#[derive(Debug)]
pub struct Connection {
    stream: TcpStream,
    addr: String,
    broken: Option<String>,
}

impl Connection {
    /// Connect within `connect_timeout` and bound every read by `read_timeout`.
    pub fn open(addr: &str, connect_timeout: Duration, read_timeout: Duration) -> Result<Self> {
        debug!("Connecting to {}", addr);

        let candidates: Vec<SocketAddr> = addr
            .to_socket_addrs()
            .map_err(|e| Error::connection(addr, &e))?
            .collect();

        let mut last_err =
            io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing");
        for candidate in candidates {
            match TcpStream::connect_timeout(&candidate, connect_timeout) {
                Ok(stream) => {
                    stream
                        .set_read_timeout(Some(read_timeout))
                        .map_err(|e| Error::connection(addr, &e))?;
                    stream
                        .set_write_timeout(Some(read_timeout))
                        .map_err(|e| Error::connection(addr, &e))?;
                    stream
                        .set_nodelay(true)
                        .map_err(|e| Error::connection(addr, &e))?;

                    info!("Connected to {} ({})", addr, candidate);
                    return Ok(Self {
                        stream,
                        addr: addr.to_string(),
                        broken: None,
                    });
                }
                Err(e) => {
                    debug!("Connect to {} via {} failed: {}", addr, candidate, e);
                    last_err = e;
                }
            }
        }
        Err(Error::connection(addr, &last_err))
    }

    /// Write one frame and read the single response frame.
    pub fn round_trip(&mut self, frame: &[u8]) -> Result<Vec<u8>> {
        if let Some(reason) = &self.broken {
            return Err(Error::transport(format!(
                "connection to {} unusable: {}",
                self.addr, reason
            )));
        }
        frame::write_frame(&mut self.stream, frame)?;
        frame::read_frame(&mut self.stream)
    }

    /// Write one frame without waiting for an answer.
    pub fn send(&mut self, frame: &[u8]) -> Result<()> {
        frame::write_frame(&mut self.stream, frame)
    }

    /// Stop using this stream for requests; its framing can no longer be trusted.
    pub fn mark_broken(&mut self, reason: impl Into<String>) {
        self.broken = Some(reason.into());
    }

    pub fn is_broken(&self) -> bool {
        self.broken.is_some()
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.stream.local_addr()
    }
}

/// Lazily opened connection table keyed by shard.
pub struct ConnectionManager {
    servers: Vec<String>,
    connections: HashMap<ShardIndex, SharedConnection>,
    connect_timeout: Duration,
    read_timeout: Duration,
    heartbeat_interval: Duration,
    scheduler: Option<Arc<dyn Scheduler>>,
}

impl ConnectionManager {
    pub fn new(config: &ClientConfig, scheduler: Option<Arc<dyn Scheduler>>) -> Self {
        Self {
            servers: config.servers.clone(),
            connections: HashMap::new(),
            connect_timeout: config.connect_timeout(),
            read_timeout: config.read_timeout(),
            heartbeat_interval: config.heartbeat_interval(),
            scheduler,
        }
    }

    /// Return the shard's connection, opening it on first use.
    pub fn get(&mut self, shard: ShardIndex) -> Result<SharedConnection> {
        if let Some(conn) = self.connections.get(&shard) {
            return Ok(Arc::clone(conn));
        }

        let addr = self
            .servers
            .get(shard)
            .ok_or_else(|| Error::config(format!("no server for shard {}", shard)))?;
        let conn = Arc::new(Mutex::new(Connection::open(
            addr,
            self.connect_timeout,
            self.read_timeout,
        )?));

        if let Some(scheduler) = &self.scheduler {
            scheduler.every(self.heartbeat_interval, heartbeat_task(Arc::downgrade(&conn)));
        }

        self.connections.insert(shard, Arc::clone(&conn));
        Ok(conn)
    }

    /// Drop the cached connection for `shard`, if any.
    ///
    /// The next request routed there opens a new socket. The old socket closes
    /// once no request holds it, and its keepalive unregisters on its next beat.
    pub fn reset(&mut self, shard: ShardIndex) -> bool {
        let removed = self.connections.remove(&shard).is_some();
        if removed {
            debug!("Dropped cached connection for shard {}", shard);
        }
        removed
    }

    pub fn is_open(&self, shard: ShardIndex) -> bool {
        self.connections.contains_key(&shard)
    }

    /// Number of shards with a cached connection.
    pub fn open_connections(&self) -> usize {
        self.connections.len()
    }
}

/// Keepalive job for one connection.
///
/// A beat is skipped while a request holds the connection; the connection is
/// not idle then anyway. A failed write marks the connection broken so the
/// next real request reports it. The job ends once the connection is gone.
fn heartbeat_task(conn: Weak<Mutex<Connection>>) -> Task {
    Box::new(move || {
        let Some(conn) = conn.upgrade() else {
            debug!("Connection released, stopping heartbeat");
            return ControlFlow::Break(());
        };
        let mut guard = match conn.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return ControlFlow::Continue(()),
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
        };
        if guard.is_broken() {
            return ControlFlow::Continue(());
        }
        if let Err(e) = guard.send(&HEARTBEAT_FRAME) {
            warn!("Heartbeat to {} failed: {}", guard.addr(), e);
            guard.mark_broken(format!("heartbeat failed: {}", e));
        }
        ControlFlow::Continue(())
    })
}

/// Lock a connection, ignoring poisoning from a panicked keepalive.
pub(crate) fn lock(conn: &SharedConnection) -> std::sync::MutexGuard<'_, Connection> {
    conn.lock().unwrap_or_else(PoisonError::into_inner)
}
