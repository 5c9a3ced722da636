//! # Client Configuration
//!
//! Settings for a GlobalKV client: the fixed server list, socket timeouts,
//! the keepalive interval and the value codec. Configuration is usually built
//! in code with [`ClientConfig::new`], or loaded from a TOML file:
//!
//! ```toml
//! servers = ["127.0.0.1:7901", "127.0.0.1:7902"]
//! connect_timeout_secs = 5
//! read_timeout_secs = 5
//! heartbeat_interval_secs = 25
//! codec = "json"
//! ```
//!
//! When loading from a file, `GLOBALKV_SERVERS` (comma separated `host:port`
//! list) overrides the `servers` entry.

use config::{Config as ConfigLib, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::codec::Codec;
use crate::error::{Error, Result};

/// Environment variable that overrides the configured server list.
pub const SERVERS_ENV: &str = "GLOBALKV_SERVERS";

fn default_connect_timeout() -> u64 {
    5
}

fn default_read_timeout() -> u64 {
    5
}

fn default_heartbeat_interval() -> u64 {
    25
}

/// Configuration for a [`crate::Client`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Shard addresses (`host:port`). Order matters: it defines routing.
    pub servers: Vec<String>,

    /// Upper bound for establishing a connection to one shard
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Upper bound for each individual socket read
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Interval between keepalive frames when a scheduler is attached
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Serialization contract shared with the servers
    #[serde(default)]
    pub codec: Codec,
}

impl ClientConfig {
    /// Build a configuration with default timeouts for the given servers.
    pub fn new<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            servers: servers.into_iter().map(Into::into).collect(),
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            heartbeat_interval_secs: default_heartbeat_interval(),
            codec: Codec::default(),
        }
    }

    /// Load configuration from a TOML file, then apply `GLOBALKV_SERVERS`.
    pub fn load(path: &Path) -> Result<Self> {
        let settings = ConfigLib::builder()
            .add_source(File::from(path).format(FileFormat::Toml))
            .build()?;

        let mut config: ClientConfig = settings.try_deserialize()?;
        if let Ok(raw) = std::env::var(SERVERS_ENV) {
            config.servers = parse_server_list(&raw);
        }
        config.validate()?;
        Ok(config)
    }

    /// Use a different value codec.
    pub fn with_codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Override both socket timeouts.
    pub fn with_timeouts(mut self, connect_secs: u64, read_secs: u64) -> Self {
        self.connect_timeout_secs = connect_secs;
        self.read_timeout_secs = read_secs;
        self
    }

    /// Override the keepalive interval.
    pub fn with_heartbeat_interval(mut self, secs: u64) -> Self {
        self.heartbeat_interval_secs = secs;
        self
    }

    /// Reject configurations the client cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.servers.is_empty() {
            return Err(Error::config("servers empty"));
        }
        if let Some(bad) = self.servers.iter().find(|s| s.trim().is_empty()) {
            return Err(Error::config(format!("invalid server address {:?}", bad)));
        }
        if self.connect_timeout_secs == 0 || self.read_timeout_secs == 0 {
            return Err(Error::config("timeouts must be at least one second"));
        }
        if self.heartbeat_interval_secs == 0 {
            return Err(Error::config("heartbeat interval must be at least one second"));
        }
        Ok(())
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

/// Split a comma separated `host:port` list, dropping blank entries.
pub fn parse_server_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
