//! Eternal Ledger: a durable record of every peer ever observed. Survives
//! identity reset — unlike mesh neighbors, potential
//! contacts, and the watering-hole queue, nothing here is ever cleared by
//! `SilentMesh::reset()`.

use std::collections::HashMap;

use mesh_crypto::{PeerId, PublicKey};
use tracing::{info, warn};

use crate::error::{Result, SocialError};

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerNode {
    pub node_id: PeerId,
    pub public_key: Option<PublicKey>,
    pub last_known_ip: Option<String>,
    pub gateway_id: Option<PeerId>,
    pub first_seen_ms: u64,
    pub last_seen_ms: u64,
    pub connection_count: u64,
    pub last_connection_success: bool,
}

#[derive(Default)]
pub struct EternalLedger {
    nodes: HashMap<PeerId, LedgerNode>,
}

impl EternalLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, node_id: &PeerId) -> Option<&LedgerNode> {
        self.nodes.get(node_id)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Record a sighting of `node_id`. Creates the entry on first sight;
    /// on subsequent sightings `last_seen_ms` only ever moves forward and
    /// `connection_count` only ever increases.
    pub fn record_sighting_at(
        &mut self,
        node_id: PeerId,
        public_key: Option<PublicKey>,
        last_known_ip: Option<String>,
        gateway_id: Option<PeerId>,
        connection_success: bool,
        now_ms: u64,
    ) {
        match self.nodes.get_mut(&node_id) {
            Some(entry) => {
                entry.last_seen_ms = entry.last_seen_ms.max(now_ms);
                entry.connection_count += 1;
                entry.last_connection_success = connection_success;
                if public_key.is_some() {
                    entry.public_key = public_key;
                }
                if last_known_ip.is_some() {
                    entry.last_known_ip = last_known_ip;
                }
                if gateway_id.is_some() {
                    entry.gateway_id = gateway_id;
                }
            }
            None => {
                info!(node = %node_id, "new node recorded in eternal ledger");
                self.nodes.insert(
                    node_id.clone(),
                    LedgerNode {
                        node_id,
                        public_key,
                        last_known_ip,
                        gateway_id,
                        first_seen_ms: now_ms,
                        last_seen_ms: now_ms,
                        connection_count: 1,
                        last_connection_success: connection_success,
                    },
                );
            }
        }
    }

    /// Anti-spoof check: a presented key is valid iff it matches the key
    /// already on record, or no key was previously stored for this node.
    pub fn validate_node_identity(&self, node_id: &PeerId, presented: &PublicKey) -> Result<()> {
        match self.nodes.get(node_id).and_then(|n| n.public_key.as_ref()) {
            Some(stored) if stored == presented => Ok(()),
            Some(_) => {
                warn!(node = %node_id, "presented key does not match the key on record");
                Err(SocialError::IdentityMismatch(node_id.to_string()))
            }
            None => Ok(()),
        }
    }

    /// Entries seen within `window_ms` of `now_ms`, most-recently-seen
    /// first — the candidate set light-ping probes.
    pub fn recently_active_at(&self, now_ms: u64, window_ms: u64) -> Vec<&LedgerNode> {
        let mut active: Vec<&LedgerNode> = self
            .nodes
            .values()
            .filter(|n| now_ms.saturating_sub(n.last_seen_ms) <= window_ms)
            .collect();
        active.sort_by(|a, b| b.last_seen_ms.cmp(&a.last_seen_ms));
        active
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &LedgerNode> {
        self.nodes.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_crypto::Identity;

    fn peer() -> (PeerId, PublicKey) {
        let id = Identity::generate();
        (id.peer_id(), id.public)
    }

    #[test]
    fn first_sighting_creates_entry_with_equal_first_and_last_seen() {
        let mut ledger = EternalLedger::new();
        let (node, key) = peer();
        ledger.record_sighting_at(node.clone(), Some(key), None, None, true, 100);
        let entry = ledger.get(&node).unwrap();
        assert_eq!(entry.first_seen_ms, 100);
        assert_eq!(entry.last_seen_ms, 100);
        assert_eq!(entry.connection_count, 1);
    }

    #[test]
    fn repeated_sightings_never_move_last_seen_backward_and_count_grows() {
        let mut ledger = EternalLedger::new();
        let (node, key) = peer();
        ledger.record_sighting_at(node.clone(), Some(key.clone()), None, None, true, 100);
        ledger.record_sighting_at(node.clone(), Some(key), None, None, true, 50);
        let entry = ledger.get(&node).unwrap();
        assert_eq!(entry.first_seen_ms, 100, "first_seen never changes after creation");
        assert_eq!(entry.last_seen_ms, 100, "last_seen must not move backward");
        assert_eq!(entry.connection_count, 2);
    }

    #[test]
    fn validate_identity_accepts_first_key_and_rejects_mismatch() {
        let mut ledger = EternalLedger::new();
        let (node, key) = peer();
        let (_, other_key) = peer();

        assert!(ledger.validate_node_identity(&node, &key).is_ok(), "no key on record yet");
        ledger.record_sighting_at(node.clone(), Some(key.clone()), None, None, true, 1);
        assert!(ledger.validate_node_identity(&node, &key).is_ok());
        assert!(matches!(
            ledger.validate_node_identity(&node, &other_key),
            Err(SocialError::IdentityMismatch(_))
        ));
    }

    #[test]
    fn recently_active_filters_by_window_and_orders_newest_first() {
        let mut ledger = EternalLedger::new();
        let (a, _) = peer();
        let (b, _) = peer();
        ledger.record_sighting_at(a.clone(), None, None, None, true, 1000);
        ledger.record_sighting_at(b.clone(), None, None, None, true, 2000);

        let active = ledger.recently_active_at(2000, 1500);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].node_id, b);
    }
}
