//! Error types for GlobalKV client operations

use std::io;
use thiserror::Error;

/// Result type alias for GlobalKV operations
pub type Result<T> = std::result::Result<T, Error>;

/// Every fault the client can surface.
///
/// Nothing here is retried internally; the caller decides whether to retry,
/// reset the shard, or drop the client.
#[derive(Error, Debug)]
pub enum Error {
    /// Invalid construction input, e.g. an empty server list
    #[error("Config error: {message}")]
    Config { message: String },

    /// Connecting to (or resolving) a shard's server failed
    #[error("Connection error to {addr}: {message} ({kind:?})")]
    Connection {
        addr: String,
        kind: io::ErrorKind,
        message: String,
    },

    /// A frame could not be written or read in full
    #[error("Transport error: {message}")]
    Transport { message: String },

    /// A request or value could not be serialized or deserialized
    #[error("Codec error: {message}")]
    Codec { message: String },
}

impl Error {
    /// Create a config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config {
            message: msg.into(),
        }
    }

    /// Create a connection error from the underlying transport failure
    pub fn connection<S: Into<String>>(addr: S, err: &io::Error) -> Self {
        Error::Connection {
            addr: addr.into(),
            kind: err.kind(),
            message: err.to_string(),
        }
    }

    /// Create a transport error
    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Error::Transport {
            message: msg.into(),
        }
    }

    /// Create a codec error
    pub fn codec<S: Into<String>>(msg: S) -> Self {
        Error::Codec {
            message: msg.into(),
        }
    }

    /// Whether this error came from the socket rather than from the input.
    pub fn is_io(&self) -> bool {
        matches!(self, Error::Connection { .. } | Error::Transport { .. })
    }
}

impl From<config::ConfigError> for Error {
    fn from(err: config::ConfigError) -> Self {
        Error::config(err.to_string())
    }
}
