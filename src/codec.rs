//! # Value Codecs
//!
//! Requests and stored values travel as opaque codec output. The codec is a
//! contract shared with the servers and versioned independently of the client:
//! every node talking to the same cluster must agree on it.
//!
//! - `json`: human-readable, self-describing. `null` is the absence sentinel.
//! - `cbor`: compact, self-describing. The simple value `null` (`0xf6`) is the
//!   absence sentinel.
//! - `bincode`: very compact, not self-describing. It has no null marker, so
//!   only an empty payload means "absent".
//!
//! A stored value that itself encodes to the null sentinel (for example
//! `Option::<T>::None` or `()` under json/cbor) cannot be told apart from a
//! missing key. That is a property of the wire contract.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// CBOR simple value `null`.
const CBOR_NULL: u8 = 0xf6;

/// Serialization format for requests and values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Codec {
    #[default]
    Json,
    Cbor,
    Bincode,
}

impl Codec {
    /// Revision of the request record and sentinel rules implemented here.
    ///
    /// Revision 1 sends the expected value of a compare-and-swap as a `digest`
    /// field holding the hex SHA-256 (64 lowercase characters) of its encoded
    /// bytes. Servers that look for an `md5` field will not match it.
    pub const VERSION: u16 = 1;

    /// Serialize according to the selected codec.
    pub fn encode<T: Serialize>(self, value: &T) -> Result<Vec<u8>> {
        match self {
            Codec::Json => serde_json::to_vec(value).map_err(|e| Error::codec(e.to_string())),
            Codec::Cbor => serde_cbor::to_vec(value).map_err(|e| Error::codec(e.to_string())),
            Codec::Bincode => bincode::serialize(value).map_err(|e| Error::codec(e.to_string())),
        }
    }

    /// Deserialize according to the selected codec.
    pub fn decode<T: DeserializeOwned>(self, bytes: &[u8]) -> Result<T> {
        match self {
            Codec::Json => serde_json::from_slice(bytes).map_err(|e| Error::codec(e.to_string())),
            Codec::Cbor => serde_cbor::from_slice(bytes).map_err(|e| Error::codec(e.to_string())),
            Codec::Bincode => {
                bincode::deserialize(bytes).map_err(|e| Error::codec(e.to_string()))
            }
        }
    }

    /// Whether a `get` response payload means "no value".
    pub fn is_absent(self, payload: &[u8]) -> bool {
        if payload.is_empty() {
            return true;
        }
        match self {
            Codec::Json => trim_ascii(payload) == b"null",
            Codec::Cbor => payload == [CBOR_NULL],
            Codec::Bincode => false,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Codec::Json => "json",
            Codec::Cbor => "cbor",
            Codec::Bincode => "bincode",
        }
    }
}

/// Hex SHA-256 of a serialized value, as carried by compare-and-swap.
pub fn digest(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn trim_ascii(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Profile {
        name: String,
        visits: u32,
        tags: Vec<String>,
    }

    fn sample() -> Profile {
        Profile {
            name: "ada".into(),
            visits: 3,
            tags: vec!["admin".into(), "ops".into()],
        }
    }

    #[test]
    fn structured_value_survives_every_codec() {
        for codec in [Codec::Json, Codec::Cbor, Codec::Bincode] {
            let bytes = codec.encode(&sample()).unwrap();
            let back: Profile = codec.decode(&bytes).unwrap();
            assert_eq!(back, sample(), "codec {}", codec.name());
        }
    }

    #[test]
    fn null_is_absent_for_self_describing_codecs() {
        let none: Option<u32> = None;
        assert!(Codec::Json.is_absent(&Codec::Json.encode(&none).unwrap()));
        assert!(Codec::Cbor.is_absent(&Codec::Cbor.encode(&none).unwrap()));
        assert!(Codec::Json.is_absent(b" null\n"));
    }

    #[test]
    fn bincode_only_treats_empty_as_absent() {
        assert!(Codec::Bincode.is_absent(b""));
        let zero = Codec::Bincode.encode(&false).unwrap();
        assert!(!Codec::Bincode.is_absent(&zero));
    }

    #[test]
    fn real_values_are_not_absent() {
        for codec in [Codec::Json, Codec::Cbor, Codec::Bincode] {
            assert!(!codec.is_absent(&codec.encode(&0u8).unwrap()));
            assert!(!codec.is_absent(&codec.encode(&"").unwrap()));
        }
    }

    #[test]
    fn corrupted_payload_rejected() {
        let garbage = b"\xff\x00not-a-valid-payload";
        let err = Codec::Json.decode::<Profile>(garbage).unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));
    }

    #[test]
    fn digest_is_hex_sha256() {
        assert_eq!(
            digest(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(digest(b"").len(), 64);
    }

    #[test]
    fn codec_names_deserialize_lowercase() {
        let codec: Codec = serde_json::from_str("\"bincode\"").unwrap();
        assert_eq!(codec, Codec::Bincode);
        assert_eq!(Codec::default(), Codec::Json);
    }
}
