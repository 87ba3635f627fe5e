//! Routing table (C4): the direct-peer registry and the destination →
//! next-hop table used to pick a relay target beyond direct neighbors.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use mesh_crypto::PeerId;

pub const DEFAULT_STALE_AFTER: Duration = Duration::from_secs(600);

/// A directly-connected peer entry.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerEntry {
    pub id: PeerId,
    pub last_seen: Instant,
    pub transport_type: String,
    pub reliability: f64,
    pub bytes_relayed: u64,
}

/// A multi-hop route to a peer that isn't directly connected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub next_hop: PeerId,
    pub hop_count: u32,
    pub updated_at_ms: u64,
}

pub struct RoutingTable {
    peers: HashMap<PeerId, PeerEntry>,
    routes: HashMap<PeerId, Route>,
    stale_after: Duration,
}

impl RoutingTable {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            peers: HashMap::new(),
            routes: HashMap::new(),
            stale_after,
        }
    }

    pub fn upsert_peer(&mut self, entry: PeerEntry) {
        self.peers.insert(entry.id.clone(), entry);
    }

    pub fn remove_peer(&mut self, id: &PeerId) {
        self.peers.remove(id);
    }

    pub fn peer(&self, id: &PeerId) -> Option<&PeerEntry> {
        self.peers.get(id)
    }

    pub fn direct_peers(&self) -> impl Iterator<Item = &PeerEntry> {
        self.peers.values()
    }

    /// Learn or update a route, keeping the table's tie-break rule:
    /// replace only if the new route has a strictly smaller hop count, or
    /// an equal hop count with a more recent `updated_at_ms`.
    pub fn learn_route(&mut self, destination: PeerId, route: Route) {
        match self.routes.get(&destination) {
            Some(existing) if !Self::should_replace(existing, &route) => {}
            _ => {
                self.routes.insert(destination, route);
            }
        }
    }

    fn should_replace(existing: &Route, candidate: &Route) -> bool {
        match candidate.hop_count.cmp(&existing.hop_count) {
            Ordering::Less => true,
            Ordering::Greater => false,
            Ordering::Equal => match candidate.updated_at_ms.cmp(&existing.updated_at_ms) {
                Ordering::Greater => true,
                Ordering::Less => false,
                Ordering::Equal => candidate.next_hop < existing.next_hop,
            },
        }
    }

    /// The best known next hop for `destination`, ignoring routes older
    /// than `stale_after` relative to `now_ms`.
    pub fn next_hop_for(&self, destination: &PeerId, now_ms: u64) -> Option<&PeerId> {
        let route = self.routes.get(destination)?;
        let age = now_ms.saturating_sub(route.updated_at_ms);
        if age > self.stale_after.as_millis() as u64 {
            return None;
        }
        Some(&route.next_hop)
    }

    /// Remove every route older than `stale_after` relative to `now_ms`.
    pub fn prune_stale(&mut self, now_ms: u64) {
        let stale_ms = self.stale_after.as_millis() as u64;
        self.routes
            .retain(|_, route| now_ms.saturating_sub(route.updated_at_ms) <= stale_ms);
    }
}

impl Default for RoutingTable {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER)
    }
}
