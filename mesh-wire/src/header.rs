use mesh_crypto::PublicKey;

use crate::message_type::MessageType;

pub const CURRENT_VERSION: u8 = 1;
pub const SIGNATURE_LEN: usize = 64;

/// Signed message header. `signature` is all-zero while a header is being
/// built for signing; `Codec::encode` fills it in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageHeader {
    pub version: u8,
    pub message_type: MessageType,
    pub ttl: u8,
    pub timestamp_ms: u64,
    pub sender_id: PublicKey,
    pub signature: [u8; SIGNATURE_LEN],
}

impl MessageHeader {
    pub fn new(message_type: MessageType, ttl: u8, timestamp_ms: u64, sender_id: PublicKey) -> Self {
        Self {
            version: CURRENT_VERSION,
            message_type,
            ttl,
            timestamp_ms,
            sender_id,
            signature: [0u8; SIGNATURE_LEN],
        }
    }

    /// The header with an all-zero signature, used both to produce the
    /// bytes that get signed and to re-derive them for verification.
    pub fn with_zeroed_signature(&self) -> Self {
        Self {
            signature: [0u8; SIGNATURE_LEN],
            ..self.clone()
        }
    }

    /// The header as it is actually signed: signature *and* `ttl` zeroed.
    /// `ttl` is excluded from the signed preimage because relay decrements
    /// it in place without re-signing (the signer isn't available at
    /// intermediate hops) — every hop must still be able to verify the
    /// original signature regardless of how many times the message has
    /// been relayed.
    pub fn signing_preimage(&self) -> Self {
        Self {
            signature: [0u8; SIGNATURE_LEN],
            ttl: 0,
            ..self.clone()
        }
    }

    /// A copy of this header with `ttl` decremented by one, for relay.
    /// Panics if `ttl` is already zero; callers must check
    /// `ttl > 0` before relaying.
    pub fn decremented_ttl(&self) -> Self {
        assert!(self.ttl > 0, "decrementing a header with ttl == 0");
        Self {
            ttl: self.ttl - 1,
            ..self.clone()
        }
    }
}
