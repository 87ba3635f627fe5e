//! Data model for the store-and-forward engine's stored messages.

use mesh_crypto::PeerId;
use mesh_wire::MessageHeader;
use uuid::Uuid;

pub type MessageId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Emergency,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Status {
    Pending,
    Sent,
    Delivered,
    Failed,
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredMessage {
    pub id: MessageId,
    pub header: MessageHeader,
    pub payload: Vec<u8>,
    pub destination_id: Option<PeerId>,
    pub priority: Priority,
    pub status: Status,
    pub created_at_ms: u64,
    pub expires_at_ms: u64,
    pub attempts: u32,
    pub route_attempts: std::collections::HashSet<PeerId>,
    pub size_bytes: u64,
    pub is_own_message: bool,
    pub geo_zone: Option<String>,
    pub delivered_at_ms: Option<u64>,
}

impl StoredMessage {
    /// `size_bytes` is always the length of the canonical encoded frame —
    /// this constructor is the only place a `StoredMessage` is built, so
    /// the invariant `size_bytes == canonical_encode(header, payload).len`
    /// can't drift.
    pub fn new(
        id: MessageId,
        header: MessageHeader,
        payload: Vec<u8>,
        destination_id: Option<PeerId>,
        priority: Priority,
        created_at_ms: u64,
        expires_at_ms: u64,
        is_own_message: bool,
        geo_zone: Option<String>,
    ) -> Self {
        let size_bytes = mesh_wire::encode_frame(&header, &payload).len() as u64;
        Self {
            id,
            header,
            payload,
            destination_id,
            priority,
            status: Status::Pending,
            created_at_ms,
            expires_at_ms,
            attempts: 0,
            route_attempts: std::collections::HashSet::new(),
            size_bytes,
            is_own_message,
            geo_zone,
            delivered_at_ms: None,
        }
    }

    pub fn is_expired_at(&self, now_ms: u64) -> bool {
        now_ms >= self.expires_at_ms
    }

    /// Eviction never removes an own message that hasn't reached a
    /// terminal "safe" state.
    pub fn evictable_while_undelivered(&self) -> bool {
        !(self.is_own_message && !matches!(self.status, Status::Delivered | Status::Expired))
    }
}
