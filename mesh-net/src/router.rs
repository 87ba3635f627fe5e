//! Message router / relay (C6): decides forward vs. drop for inbound
//! traffic, and prepares outbound traffic so reflections get dropped by
//! the sender's own dedup cache.
//!
//! Relay preserves the original signature — only `ttl` changes in the
//! relayed header — because the fingerprint used for dedup excludes `ttl`,
//! so a relayed copy is recognized as the same message at every hop
//! regardless of how many times it's been forwarded.

use std::time::Instant;

use mesh_crypto::PeerId;
use mesh_wire::{check_signature, check_skew, Fingerprint, MessageHeader, SkewBounds, CURRENT_VERSION};

use crate::dedup::DedupCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    InvalidSignature,
    UnsupportedVersion(u8),
    TimestampSkew,
    Duplicate,
}

/// A relay the router has prepared: the header with `ttl` decremented (and
/// otherwise bit-identical to the one that arrived, including its original
/// signature) and the set of direct peers to enqueue it to.
#[derive(Debug, Clone)]
pub struct RelayPlan {
    pub header: MessageHeader,
    pub payload: Vec<u8>,
    pub recipients: Vec<PeerId>,
}

#[derive(Debug, Clone, Default)]
pub struct InboundOutcome {
    pub delivered_locally: bool,
    pub relay: Option<RelayPlan>,
}

#[derive(Debug, Clone)]
pub enum InboundResult {
    Dropped(DropReason),
    Processed(InboundOutcome),
}

impl InboundResult {
    pub fn is_dropped(&self) -> bool {
        matches!(self, InboundResult::Dropped(_))
    }
}

pub struct Router {
    local_id: PeerId,
    dedup: DedupCache,
    skew: SkewBounds,
}

impl Router {
    pub fn new(local_id: PeerId, dedup: DedupCache, skew: SkewBounds) -> Self {
        Self { local_id, dedup, skew }
    }

    pub fn local_id(&self) -> &PeerId {
        &self.local_id
    }

    pub fn dedup(&self) -> &DedupCache {
        &self.dedup
    }

    /// Process an inbound frame that arrived from `arrived_from`.
    ///
    /// `destination` is `None` for a broadcast/unaddressed message and
    /// `Some(peer)` when the higher layer has already determined who the
    /// message is addressed to (the signed header itself carries no
    /// destination field,'s data model). `direct_peers` is the
    /// current set of directly-connected neighbors; `preferred_next_hop`,
    /// when present, narrows relay to a single unicast hop looked up from
    /// the routing table (C4) for `destination`.
    #[allow(clippy::too_many_arguments)]
    pub fn handle_inbound_at(
        &self,
        header: &MessageHeader,
        payload: &[u8],
        arrived_from: &PeerId,
        destination: Option<&PeerId>,
        direct_peers: &[PeerId],
        preferred_next_hop: Option<&PeerId>,
        now_ms: u64,
        dedup_now: Instant,
    ) -> InboundResult {
        if header.version != CURRENT_VERSION {
            return InboundResult::Dropped(DropReason::UnsupportedVersion(header.version));
        }
        if check_signature(header, payload).is_err() {
            return InboundResult::Dropped(DropReason::InvalidSignature);
        }
        if check_skew(header.timestamp_ms, now_ms, self.skew).is_err() {
            return InboundResult::Dropped(DropReason::TimestampSkew);
        }
        let fingerprint = Fingerprint::compute(header, payload);
        if !self.dedup.check_and_insert_at(fingerprint, dedup_now) {
            return InboundResult::Dropped(DropReason::Duplicate);
        }

        let sender_id = header.sender_id.peer_id();
        let addressed_here = destination.map_or(true, |d| *d == self.local_id);
        let mut outcome = InboundOutcome {
            delivered_locally: addressed_here,
            relay: None,
        };

        if header.ttl == 0 {
            return InboundResult::Processed(outcome);
        }

        let candidates: Vec<PeerId> = match preferred_next_hop {
            Some(hop) if direct_peers.contains(hop) => vec![hop.clone()],
            _ => direct_peers
                .iter()
                .filter(|p| **p != *arrived_from && **p != sender_id)
                .cloned()
                .collect(),
        };
        let candidates: Vec<PeerId> = candidates
            .into_iter()
            .filter(|p| *p != *arrived_from && *p != sender_id)
            .collect();

        if !candidates.is_empty() {
            outcome.relay = Some(RelayPlan {
                header: header.decremented_ttl(),
                payload: payload.to_vec(),
                recipients: candidates,
            });
        }

        InboundResult::Processed(outcome)
    }

    /// Mark an outbound message's fingerprint as seen so that a reflection
    /// of our own message coming back over another transport is dropped
    /// as a duplicate rather than relayed or redelivered.
    pub fn prepare_outbound(&self, header: &MessageHeader, payload: &[u8]) {
        let fingerprint = Fingerprint::compute(header, payload);
        self.dedup.check_and_insert(fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mesh_crypto::Identity;
    use mesh_wire::{signing_bytes, MessageType};
    use std::time::Duration;

    fn node() -> (Identity, PeerId) {
        let id = Identity::generate();
        let peer = id.peer_id();
        (id, peer)
    }

    fn signed_header(sender: &Identity, ttl: u8, timestamp_ms: u64, payload: &[u8]) -> MessageHeader {
        let mut header = MessageHeader::new(MessageType::Text, ttl, timestamp_ms, sender.public);
        header.signature = sender.sign(&signing_bytes(&header, payload));
        header
    }

    fn router(local: PeerId) -> Router {
        Router::new(local, DedupCache::default(), SkewBounds::default())
    }

    #[test]
    fn invalid_signature_is_dropped() {
        let (sender, _) = node();
        let (_, local) = node();
        let payload = b"hi".to_vec();
        let mut header = signed_header(&sender, 5, 1_700_000_000_000, &payload);
        header.signature[0] ^= 1;
        let r = router(local.clone());
        let result = r.handle_inbound_at(
            &header,
            &payload,
            &local,
            None,
            &[],
            None,
            1_700_000_000_000,
            Instant::now(),
        );
        assert!(matches!(result, InboundResult::Dropped(DropReason::InvalidSignature)));
    }

    #[test]
    fn duplicate_is_dropped_silently() {
        let (sender, sender_id) = node();
        let (_, local) = node();
        let (_, p1) = node();
        let payload = b"hi".to_vec();
        let header = signed_header(&sender, 5, 1_700_000_000_000, &payload);
        let r = router(local.clone());
        let now = Instant::now();
        let first = r.handle_inbound_at(
            &header,
            &payload,
            &sender_id,
            None,
            &[p1],
            None,
            1_700_000_000_000,
            now,
        );
        assert!(matches!(first, InboundResult::Processed(_)));
        let second = r.handle_inbound_at(
            &header,
            &payload,
            &sender_id,
            None,
            &[],
            None,
            1_700_000_000_000,
            now,
        );
        assert!(matches!(second, InboundResult::Dropped(DropReason::Duplicate)));
    }

    #[test]
    fn ttl_zero_delivers_locally_but_never_forwards() {
        let (sender, sender_id) = node();
        let (_, local) = node();
        let (_, p1) = node();
        let payload = b"hi".to_vec();
        let header = signed_header(&sender, 0, 1_700_000_000_000, &payload);
        let r = router(local.clone());
        let result = r.handle_inbound_at(
            &header,
            &payload,
            &sender_id,
            None,
            &[p1],
            None,
            1_700_000_000_000,
            Instant::now(),
        );
        match result {
            InboundResult::Processed(outcome) => {
                assert!(outcome.delivered_locally);
                assert!(outcome.relay.is_none());
            }
            other => panic!("expected processed, got {other:?}"),
        }
    }

    #[test]
    fn relay_excludes_sender_and_arrival_peer() {
        let (sender, sender_id) = node();
        let (_, local) = node();
        let (_, p1) = node();
        let (_, p2) = node();
        let payload = b"hi".to_vec();
        let header = signed_header(&sender, 5, 1_700_000_000_000, &payload);
        let r = router(local.clone());
        let result = r.handle_inbound_at(
            &header,
            &payload,
            &sender_id,
            None,
            &[sender_id.clone(), p1.clone(), p2.clone()],
            None,
            1_700_000_000_000,
            Instant::now(),
        );
        match result {
            InboundResult::Processed(outcome) => {
                let relay = outcome.relay.expect("should relay");
                assert_eq!(relay.header.ttl, header.ttl - 1);
                assert_eq!(relay.header.signature, header.signature);
                assert!(relay.recipients.contains(&p1));
                assert!(relay.recipients.contains(&p2));
                assert!(!relay.recipients.contains(&sender_id));
            }
            other => panic!("expected processed, got {other:?}"),
        }
    }

    #[test]
    fn preferred_next_hop_narrows_to_unicast() {
        let (sender, sender_id) = node();
        let (_, local) = node();
        let (_, p1) = node();
        let (_, p2) = node();
        let payload = b"hi".to_vec();
        let header = signed_header(&sender, 5, 1_700_000_000_000, &payload);
        let r = router(local.clone());
        let result = r.handle_inbound_at(
            &header,
            &payload,
            &sender_id,
            Some(&p2),
            &[p1.clone(), p2.clone()],
            Some(&p2),
            1_700_000_000_000,
            Instant::now(),
        );
        match result {
            InboundResult::Processed(outcome) => {
                let relay = outcome.relay.expect("should relay");
                assert_eq!(relay.recipients, vec![p2]);
            }
            other => panic!("expected processed, got {other:?}"),
        }
    }

    #[test]
    fn timestamp_outside_skew_is_dropped() {
        let (sender, sender_id) = node();
        let (_, local) = node();
        let payload = b"hi".to_vec();
        let far_future = 1_700_000_000_000 + SkewBounds::default().max_skew_future_ms + 1;
        let header = signed_header(&sender, 5, far_future, &payload);
        let r = router(local);
        let result = r.handle_inbound_at(
            &header,
            &payload,
            &sender_id,
            None,
            &[],
            None,
            1_700_000_000_000,
            Instant::now(),
        );
        assert!(matches!(result, InboundResult::Dropped(DropReason::TimestampSkew)));
    }

    #[test]
    fn prepare_outbound_causes_reflection_to_dedup() {
        let (sender, sender_id) = node();
        let payload = b"own message".to_vec();
        let header = signed_header(&sender, 5, 1_700_000_000_000, &payload);
        let r = router(sender_id.clone());
        r.prepare_outbound(&header, &payload);

        let result = r.handle_inbound_at(
            &header,
            &payload,
            &sender_id,
            None,
            &[],
            None,
            1_700_000_000_000,
            Instant::now() + Duration::from_millis(1),
        );
        assert!(matches!(result, InboundResult::Dropped(DropReason::Duplicate)));
    }
}
