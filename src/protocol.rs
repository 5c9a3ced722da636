//! # Request Records
//!
//! Every request is a small structured record serialized by the configured
//! [`Codec`] and carried as the payload of one frame:
//!
//! | field    | get | set | delete | cas |
//! |----------|-----|-----|--------|-----|
//! | `cmd`    | x   | x   | x      | x   |
//! | `key`    | x   | x   | x      | x   |
//! | `value`  |     | x   |        | x   |
//! | `digest` |     |     |        | x   |
//!
//! Unused fields are sent as null so that codecs without field names still
//! line up.
//!
//! ## Responses
//! - `get`: the stored value bytes, or an empty / null payload when absent
//! - `set`, `delete`: an acknowledgement whose content is ignored
//! - `cas`: exactly `ok` on success, anything else on failure

use serde::{Deserialize, Serialize};

use crate::codec::{self, Codec};
use crate::error::Result;

/// Payload the server answers a successful compare-and-swap with.
pub const CAS_OK: &[u8] = b"ok";

/// The commands a server understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Command {
    Get,
    Set,
    Delete,
    Cas,
}

/// One request as it appears on the wire (before framing).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    pub cmd: Command,
    pub key: String,
    /// Codec output for the value being stored
    #[serde(default)]
    pub value: Option<Vec<u8>>,
    /// Hex digest of the codec output for the expected previous value
    #[serde(default)]
    pub digest: Option<String>,
}

impl Request {
    pub fn get(key: impl Into<String>) -> Self {
        Self::bare(Command::Get, key)
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Self::bare(Command::Delete, key)
    }

    pub fn set(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            value: Some(value),
            ..Self::bare(Command::Set, key)
        }
    }

    /// Build a compare-and-swap from already encoded old and new values.
    pub fn cas(key: impl Into<String>, expected_old: &[u8], new_value: Vec<u8>) -> Self {
        Self {
            value: Some(new_value),
            digest: Some(codec::digest(expected_old)),
            ..Self::bare(Command::Cas, key)
        }
    }

    fn bare(cmd: Command, key: impl Into<String>) -> Self {
        Self {
            cmd,
            key: key.into(),
            value: None,
            digest: None,
        }
    }

    /// Serialize the record with `codec`.
    pub fn to_bytes(&self, codec: Codec) -> Result<Vec<u8>> {
        codec.encode(self)
    }

    /// Parse a record produced by [`Request::to_bytes`].
    pub fn from_bytes(codec: Codec, bytes: &[u8]) -> Result<Self> {
        codec.decode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_field_names() {
        let req = Request::set("foo", b"\"bar\"".to_vec());
        let json: serde_json::Value =
            serde_json::from_slice(&req.to_bytes(Codec::Json).unwrap()).unwrap();

        assert_eq!(json["cmd"], "set");
        assert_eq!(json["key"], "foo");
        assert!(json["value"].is_array());
        assert!(json["digest"].is_null());
    }

    #[test]
    fn test_cas_carries_digest_of_expected_value() {
        let old = Codec::Json.encode(&"wrong").unwrap();
        let req = Request::cas("foo", &old, b"\"baz\"".to_vec());

        assert_eq!(req.cmd, Command::Cas);
        assert_eq!(req.digest.as_deref(), Some(codec::digest(&old).as_str()));
        assert_eq!(req.value.as_deref(), Some(&b"\"baz\""[..]));
    }

    #[test]
    fn test_cas_wire_record_uses_sha256_digest_field() {
        let old = Codec::Json.encode(&"bar").unwrap();
        let req = Request::cas("foo", &old, b"\"baz\"".to_vec());
        let json: serde_json::Value =
            serde_json::from_slice(&req.to_bytes(Codec::Json).unwrap()).unwrap();

        assert_eq!(json["cmd"], "cas");
        let digest = json["digest"].as_str().unwrap();
        assert_eq!(digest.len(), 64);
        assert!(digest.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()));
        assert!(json.get("md5").is_none());
        assert_eq!(Codec::VERSION, 1);
    }

    #[test]
    fn test_records_decode_under_every_codec() {
        let requests = vec![
            Request::get("a"),
            Request::delete("b"),
            Request::set("c", vec![1, 2, 3]),
            Request::cas("d", b"old", vec![9]),
        ];
        for codec in [Codec::Json, Codec::Cbor, Codec::Bincode] {
            for req in &requests {
                let bytes = req.to_bytes(codec).unwrap();
                assert_eq!(&Request::from_bytes(codec, &bytes).unwrap(), req);
            }
        }
    }

    #[test]
    fn test_unicode_key() {
        let req = Request::get("用户名");
        let bytes = req.to_bytes(Codec::Cbor).unwrap();
        assert_eq!(Request::from_bytes(Codec::Cbor, &bytes).unwrap().key, "用户名");
    }
}
