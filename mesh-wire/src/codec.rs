//! Canonical, deterministic, length-prefixed binary encoding of a
//! `MessageHeader` + payload frame.
//!
//! Multi-byte integers are big-endian so the encoding is identical across
//! platforms. The header is encoded at a fixed size so it can be re-encoded
//! with the signature zeroed (for signing/verification) or with a
//! decremented `ttl` (for relay) and compared byte-for-byte against the
//! original except in the one field that changed.

use mesh_crypto::{PublicKey, PUBLIC_KEY_LEN};

use crate::error::{Result, WireError};
use crate::header::{MessageHeader, CURRENT_VERSION, SIGNATURE_LEN};
use crate::message_type::MessageType;

/// version(1) + type(1) + ttl(1) + timestamp(8) + sender_id(32) + signature(64)
pub const HEADER_LEN: usize = 1 + 1 + 1 + 8 + PUBLIC_KEY_LEN + SIGNATURE_LEN;

/// 4-byte big-endian payload length prefix.
const LEN_PREFIX: usize = 4;

pub fn encode_header(header: &MessageHeader) -> [u8; HEADER_LEN] {
    let mut out = [0u8; HEADER_LEN];
    out[0] = header.version;
    out[1] = header.message_type.to_byte();
    out[2] = header.ttl;
    out[3..11].copy_from_slice(&header.timestamp_ms.to_be_bytes());
    out[11..11 + PUBLIC_KEY_LEN].copy_from_slice(header.sender_id.as_bytes());
    out[11 + PUBLIC_KEY_LEN..].copy_from_slice(&header.signature);
    out
}

pub fn decode_header(bytes: &[u8]) -> Result<MessageHeader> {
    if bytes.len() < HEADER_LEN {
        return Err(WireError::BadMessage(format!(
            "header truncated: need {HEADER_LEN} bytes, got {}",
            bytes.len()
        )));
    }
    let version = bytes[0];
    if version != CURRENT_VERSION {
        return Err(WireError::Unsupported(version));
    }
    let message_type = MessageType::from_byte(bytes[1]);
    let ttl = bytes[2];
    let timestamp_ms = u64::from_be_bytes(bytes[3..11].try_into().unwrap());
    let sender_id = PublicKey::from_bytes(&bytes[11..11 + PUBLIC_KEY_LEN])
        .map_err(|e| WireError::BadMessage(e.to_string()))?;
    let mut signature = [0u8; SIGNATURE_LEN];
    signature.copy_from_slice(&bytes[11 + PUBLIC_KEY_LEN..HEADER_LEN]);
    Ok(MessageHeader {
        version,
        message_type,
        ttl,
        timestamp_ms,
        sender_id,
        signature,
    })
}

/// The bytes that get Ed25519-signed: the header with its signature field
/// and `ttl` zeroed, followed immediately by the payload. `ttl` is excluded
/// so that relay's in-place decrement never invalidates the signature.
pub fn signing_bytes(header: &MessageHeader, payload: &[u8]) -> Vec<u8> {
    let preimage = encode_header(&header.signing_preimage());
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.extend_from_slice(&preimage);
    out.extend_from_slice(payload);
    out
}

/// Encode a full frame: header (with its real signature) followed by a
/// 4-byte big-endian payload length and the payload bytes.
pub fn encode_frame(header: &MessageHeader, payload: &[u8]) -> Vec<u8> {
    let header_bytes = encode_header(header);
    let mut out = Vec::with_capacity(HEADER_LEN + LEN_PREFIX + payload.len());
    out.extend_from_slice(&header_bytes);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Decode a full frame, enforcing `max_payload` as a bound on the declared
/// payload length, and on the actual remaining bytes. Never returns a
/// partial header/payload pair: any failure is a hard error.
pub fn decode_frame(bytes: &[u8], max_payload: usize) -> Result<(MessageHeader, Vec<u8>)> {
    let header = decode_header(bytes)?;
    let rest = &bytes[HEADER_LEN..];
    if rest.len() < LEN_PREFIX {
        return Err(WireError::BadMessage("missing payload length prefix".into()));
    }
    let declared_len = u32::from_be_bytes(rest[0..LEN_PREFIX].try_into().unwrap()) as usize;
    if declared_len > max_payload {
        return Err(WireError::TooLarge {
            max: max_payload,
            actual: declared_len,
        });
    }
    let body = &rest[LEN_PREFIX..];
    if body.len() != declared_len {
        return Err(WireError::BadMessage(format!(
            "payload length mismatch: header declares {declared_len}, frame has {}",
            body.len()
        )));
    }
    Ok((header, body.to_vec()))
}
