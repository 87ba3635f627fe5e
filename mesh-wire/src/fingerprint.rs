use sha2::{Digest, Sha256};

use crate::header::MessageHeader;

pub const FINGERPRINT_LEN: usize = 32;

/// Message identity for deduplication: SHA-256 over
/// `sender_id || timestamp || type || payload`. Independent of `ttl`, so a
/// message keeps the same fingerprint across every relay hop.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint(pub [u8; FINGERPRINT_LEN]);

impl Fingerprint {
    pub fn compute(header: &MessageHeader, payload: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(header.sender_id.as_bytes());
        hasher.update(header.timestamp_ms.to_be_bytes());
        hasher.update([header.message_type.to_byte()]);
        hasher.update(payload);
        let digest = hasher.finalize();
        let mut out = [0u8; FINGERPRINT_LEN];
        out.copy_from_slice(&digest);
        Self(out)
    }

    pub fn as_bytes(&self) -> &[u8; FINGERPRINT_LEN] {
        &self.0
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", hex::encode(self.0))
    }
}
