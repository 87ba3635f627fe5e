//! Watering-hole delivery: offline-recipient storage indexed by
//! destination and candidate gateway. The selection policy for candidate
//! gateways is heuristic and left to the caller; this module only fixes
//! delivery semantics.

use std::collections::HashMap;

use mesh_crypto::PeerId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EnvelopeId(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub struct WateringHoleEnvelope {
    pub id: EnvelopeId,
    pub message_id: String,
    pub destination: PeerId,
    pub ciphertext: Vec<u8>,
    pub candidate_gateways: Vec<PeerId>,
    pub stored_at_ms: u64,
}

#[derive(Default)]
pub struct WateringHole {
    envelopes: HashMap<EnvelopeId, WateringHoleEnvelope>,
    next_id: u64,
}

impl WateringHole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn store_at(
        &mut self,
        message_id: String,
        destination: PeerId,
        ciphertext: Vec<u8>,
        candidate_gateways: Vec<PeerId>,
        now_ms: u64,
    ) -> EnvelopeId {
        let id = EnvelopeId(self.next_id);
        self.next_id += 1;
        self.envelopes.insert(
            id.clone(),
            WateringHoleEnvelope {
                id: id.clone(),
                message_id,
                destination,
                ciphertext,
                candidate_gateways,
                stored_at_ms: now_ms,
            },
        );
        id
    }

    /// All envelopes matching `node` as either the destination or one of
    /// the candidate gateways — the set a reconnecting node should be
    /// offered for forwarding.
    pub fn matching(&self, node: &PeerId) -> Vec<&WateringHoleEnvelope> {
        self.envelopes
            .values()
            .filter(|e| e.destination == *node || e.candidate_gateways.contains(node))
            .collect()
    }

    /// Successful forwarding removes the envelope so it is never
    /// re-offered.
    pub fn remove(&mut self, id: &EnvelopeId) -> Option<WateringHoleEnvelope> {
        self.envelopes.remove(id)
    }

    pub fn len(&self) -> usize {
        self.envelopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.envelopes.is_empty()
    }

    /// Cleared on identity reset, unlike the Eternal Ledger.
    pub fn clear(&mut self) {
        self.envelopes.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_crypto::Identity;

    fn peer() -> PeerId {
        Identity::generate().peer_id()
    }

    #[test]
    fn matches_by_destination_or_gateway() {
        let mut wh = WateringHole::new();
        let dest = peer();
        let gateway = peer();
        let unrelated = peer();
        let id = wh.store_at("m1".into(), dest.clone(), vec![1, 2, 3], vec![gateway.clone()], 0);

        assert_eq!(wh.matching(&dest).len(), 1);
        assert_eq!(wh.matching(&gateway).len(), 1);
        assert_eq!(wh.matching(&unrelated).len(), 0);

        wh.remove(&id);
        assert_eq!(wh.matching(&dest).len(), 0);
    }

    #[test]
    fn clear_empties_the_queue() {
        let mut wh = WateringHole::new();
        wh.store_at("m1".into(), peer(), vec![], vec![], 0);
        wh.clear();
        assert!(wh.is_empty());
    }
}
