//! Length-prefixed framing.
//!
//! A frame is a 4-byte big-endian length `L` followed by `L - 4` payload
//! bytes; `L` counts its own header. Requests and responses share the format.

use log::warn;
use std::io::{ErrorKind, Read, Write};

use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::protocol::Request;

/// Size of the length header.
pub const HEADER_LEN: usize = 4;

/// Keepalive frame: length 8 followed by `ping`. The server does not answer it.
pub const HEARTBEAT_FRAME: [u8; 8] = [0, 0, 0, 8, b'p', b'i', b'n', b'g'];

const READ_CHUNK: usize = 8192;

/// Prefix `payload` with its frame header.
pub fn encode_frame(payload: &[u8]) -> Result<Vec<u8>> {
    let total = u32::try_from(HEADER_LEN + payload.len())
        .map_err(|_| Error::transport(format!("payload of {} bytes too large", payload.len())))?;

    let mut frame = Vec::with_capacity(total as usize);
    frame.extend_from_slice(&total.to_be_bytes());
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// Serialize `request` with `codec` and frame it.
pub fn encode_request(request: &Request, codec: Codec) -> Result<Vec<u8>> {
    encode_frame(&request.to_bytes(codec)?)
}

/// Write a complete frame with a single write call.
///
/// Anything less than the whole frame going out is a transport failure; the
/// peer would otherwise see a truncated frame.
pub fn write_frame<W: Write>(writer: &mut W, frame: &[u8]) -> Result<()> {
    let written = loop {
        match writer.write(frame) {
            Ok(n) => break n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::transport(format!("write failed: {}", e))),
        }
    };
    if written != frame.len() {
        return Err(Error::transport(format!(
            "short write: {} of {} bytes",
            written,
            frame.len()
        )));
    }
    writer
        .flush()
        .map_err(|e| Error::transport(format!("flush failed: {}", e)))
}

/// Read one frame and return its payload.
///
/// Bytes may arrive in any fragmentation, including a header split across
/// reads. End of stream or a read error before the frame completes fails.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Vec<u8>> {
    let mut buffer: Vec<u8> = Vec::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    let mut total_len: Option<usize> = None;

    loop {
        if total_len.is_none() && buffer.len() >= HEADER_LEN {
            let len = declared_len(&buffer)?;
            total_len = Some(len);
        }
        if let Some(len) = total_len {
            if buffer.len() >= len {
                if buffer.len() > len {
                    warn!("discarding {} bytes past end of frame", buffer.len() - len);
                }
                buffer.truncate(len);
                buffer.drain(..HEADER_LEN);
                return Ok(buffer);
            }
        }

        let n = match reader.read(&mut chunk) {
            Ok(0) => {
                return Err(Error::transport(format!(
                    "connection closed after {} bytes of frame",
                    buffer.len()
                )))
            }
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(Error::transport(format!("read failed: {}", e))),
        };
        buffer.extend_from_slice(&chunk[..n]);
    }
}

fn declared_len(buffer: &[u8]) -> Result<usize> {
    let header: [u8; HEADER_LEN] = [buffer[0], buffer[1], buffer[2], buffer[3]];
    let len = u32::from_be_bytes(header) as usize;
    if len < HEADER_LEN {
        return Err(Error::transport(format!("malformed frame length {}", len)));
    }
    Ok(len)
}
