//! Mesh Neighbors and Potential Contacts: the two social-layer sets that
//! sit in front of the Eternal Ledger, kept strictly separate per the
//! Silent Mesh principle — automatic technical connections
//! never appear in the user's contact list, and promotion to "contact" is
//! always user-driven.

use std::collections::{HashMap, HashSet};

use mesh_crypto::PeerId;

use crate::error::{Result, SocialError};

/// A peer who has messaged us, or whom we explicitly track for
/// promotion. Created only by user action or inbound messaging — never
/// automatically, the way mesh neighbors are.
#[derive(Debug, Clone, PartialEq)]
pub struct PotentialContact {
    pub peer_id: PeerId,
    pub first_contact_ms: u64,
    pub promoted: bool,
}

#[derive(Default)]
pub struct SocialGraph {
    /// Technical connections, auto-populated on discovery. Never shown in
    /// the contact list.
    neighbors: HashSet<PeerId>,
    potential_contacts: HashMap<PeerId, PotentialContact>,
    /// Peers the user has explicitly promoted out of "pending requests".
    contacts: HashSet<PeerId>,
}

impl SocialGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_neighbor_seen(&mut self, peer: PeerId) {
        self.neighbors.insert(peer);
    }

    pub fn remove_neighbor(&mut self, peer: &PeerId) {
        self.neighbors.remove(peer);
    }

    pub fn is_neighbor(&self, peer: &PeerId) -> bool {
        self.neighbors.contains(peer)
    }

    pub fn neighbors(&self) -> impl Iterator<Item = &PeerId> {
        self.neighbors.iter()
    }

    pub fn neighbor_count(&self) -> usize {
        self.neighbors.len()
    }

    /// Track a peer as a potential contact, e.g. because they sent us a
    /// message. Does nothing to the neighbor set, and does not itself
    /// create a contact.
    pub fn track_potential_contact_at(&mut self, peer: PeerId, now_ms: u64) {
        self.potential_contacts.entry(peer.clone()).or_insert(PotentialContact {
            peer_id: peer,
            first_contact_ms: now_ms,
            promoted: false,
        });
    }

    /// Potential contacts not yet promoted — the "pending requests" list.
    pub fn pending_requests(&self) -> impl Iterator<Item = &PotentialContact> {
        self.potential_contacts.values().filter(|c| !c.promoted)
    }

    /// User-driven promotion: moves a potential contact out of "pending
    /// requests" and into the contact list.
    pub fn mark_as_promoted(&mut self, peer: &PeerId) -> Result<()> {
        let Some(entry) = self.potential_contacts.get_mut(peer) else {
            return Err(SocialError::NotPending(peer.to_string()));
        };
        entry.promoted = true;
        self.contacts.insert(peer.clone());
        Ok(())
    }

    pub fn is_contact(&self, peer: &PeerId) -> bool {
        self.contacts.contains(peer)
    }

    pub fn contacts(&self) -> impl Iterator<Item = &PeerId> {
        self.contacts.iter()
    }

    /// Clears neighbors and potential contacts on identity reset — the
    /// Eternal Ledger is untouched; that lives in a separate structure
    /// specifically so a reset here can never reach it.
    pub fn reset(&mut self) {
        self.neighbors.clear();
        self.potential_contacts.clear();
        self.contacts.clear();
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
    fn neighbors_are_not_contacts() {
        let mut graph = SocialGraph::new();
        let p = peer();
        graph.mark_neighbor_seen(p.clone());
        assert!(graph.is_neighbor(&p));
        assert!(!graph.is_contact(&p));
    }

    #[test]
    fn promotion_moves_out_of_pending() {
        let mut graph = SocialGraph::new();
        let p = peer();
        graph.track_potential_contact_at(p.clone(), 0);
        assert_eq!(graph.pending_requests().count(), 1);

        assert!(graph.mark_as_promoted(&p).is_ok());
        assert_eq!(graph.pending_requests().count(), 0);
        assert!(graph.is_contact(&p));
    }

    #[test]
    fn promoting_unknown_peer_fails() {
        let mut graph = SocialGraph::new();
        assert!(matches!(
            graph.mark_as_promoted(&peer()),
            Err(SocialError::NotPending(_))
        ));
    }

    #[test]
    fn reset_clears_neighbors_and_contacts() {
        let mut graph = SocialGraph::new();
        let n = peer();
        let c = peer();
        graph.mark_neighbor_seen(n.clone());
        graph.track_potential_contact_at(c.clone(), 0);
        graph.mark_as_promoted(&c).unwrap();

        graph.reset();
        assert!(!graph.is_neighbor(&n));
        assert!(!graph.is_contact(&c));
        assert_eq!(graph.pending_requests().count(), 0);
    }
}
