use mesh_crypto::verify;

use crate::codec::signing_bytes;
use crate::error::{Result, WireError};
use crate::header::MessageHeader;

/// Timestamp skew bounds: how far a message's timestamp may lie from the
/// verifier's clock, in either direction, before it's rejected.
#[derive(Debug, Clone, Copy)]
pub struct SkewBounds {
    pub max_skew_past_ms: u64,
    pub max_skew_future_ms: u64,
}

impl Default for SkewBounds {
    fn default() -> Self {
        Self {
            max_skew_past_ms: 172_800_000,
            max_skew_future_ms: 300_000,
        }
    }
}

pub fn check_skew(timestamp_ms: u64, now_ms: u64, bounds: SkewBounds) -> Result<()> {
    let lower = now_ms.saturating_sub(bounds.max_skew_past_ms);
    let upper = now_ms.saturating_add(bounds.max_skew_future_ms);
    if timestamp_ms < lower || timestamp_ms > upper {
        return Err(WireError::TimestampSkew);
    }
    Ok(())
}

/// Verify invariant 1: the signature covers the canonical encoding of the
/// header with its signature field zeroed, followed by the payload.
pub fn check_signature(header: &MessageHeader, payload: &[u8]) -> Result<()> {
    let bytes = signing_bytes(header, payload);
    if verify(&bytes, &header.signature, &header.sender_id) {
        Ok(())
    } else {
        Err(WireError::SignatureMismatch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message_type::MessageType;
    use mesh_crypto::Identity;

    #[test]
    fn timestamp_within_bounds_passes() {
        let now = 1_700_000_000_000u64;
        assert!(check_skew(now, now, SkewBounds::default()).is_ok());
    }

    #[test]
    fn timestamp_too_far_future_fails() {
        let now = 1_700_000_000_000u64;
        let bounds = SkewBounds::default();
        let ts = now + bounds.max_skew_future_ms + 1;
        assert_eq!(check_skew(ts, now, bounds), Err(WireError::TimestampSkew));
    }

    #[test]
    fn timestamp_too_far_past_fails() {
        let now = 1_700_000_000_000u64;
        let bounds = SkewBounds::default();
        let ts = now - bounds.max_skew_past_ms - 1;
        assert_eq!(check_skew(ts, now, bounds), Err(WireError::TimestampSkew));
    }

    #[test]
    fn valid_signature_passes_and_tamper_fails() {
        let id = Identity::generate();
        let payload = b"payload".to_vec();
        let mut header = MessageHeader::new(MessageType::Text, 64, 1_700_000_000_000, id.public);
        let sig = id.sign(&signing_bytes(&header, &payload));
        header.signature = sig;
        assert!(check_signature(&header, &payload).is_ok());

        let mut tampered = payload.clone();
        tampered[0] ^= 1;
        assert_eq!(check_signature(&header, &tampered), Err(WireError::SignatureMismatch));
    }
}
