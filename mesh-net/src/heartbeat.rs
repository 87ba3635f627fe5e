//! Health / heartbeat monitor (C13): per-peer liveness tracking with a
//! missed-beat threshold. Marking a peer unhealthy only triggers
//! `OnPeerDisconnected` if no transport still reports it `CONNECTED` —
//! that aggregation lives in `TransportManager::is_reachable`, which the
//! caller is expected to consult alongside `is_unhealthy_at`.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use mesh_crypto::PeerId;

pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(15_000);
pub const DEFAULT_MISSED_THRESHOLD: u32 = 3;

pub struct HeartbeatMonitor {
    interval: Duration,
    missed_threshold: u32,
    last_beat: HashMap<PeerId, Instant>,
}

impl HeartbeatMonitor {
    pub fn new(interval: Duration, missed_threshold: u32) -> Self {
        Self {
            interval,
            missed_threshold,
            last_beat: HashMap::new(),
        }
    }

    pub fn record_beat_at(&mut self, peer: PeerId, now: Instant) {
        self.last_beat.insert(peer, now);
    }

    pub fn record_beat(&mut self, peer: PeerId) {
        self.record_beat_at(peer, Instant::now());
    }

    pub fn forget(&mut self, peer: &PeerId) {
        self.last_beat.remove(peer);
    }

    fn threshold(&self) -> Duration {
        self.interval * self.missed_threshold
    }

    /// A peer with no recorded heartbeat at all is unhealthy vacuously: it
    /// has exceeded the threshold by definition, having never reported in.
    pub fn is_unhealthy_at(&self, peer: &PeerId, now: Instant) -> bool {
        match self.last_beat.get(peer) {
            Some(last) => now.duration_since(*last) > self.threshold(),
            None => true,
        }
    }

    pub fn is_unhealthy(&self, peer: &PeerId) -> bool {
        self.is_unhealthy_at(peer, Instant::now())
    }

    /// Whether an unhealthy peer should actually fire `OnPeerDisconnected`:
    /// only when no transport still reports it reachable.
    pub fn should_fire_disconnect_at(&self, peer: &PeerId, now: Instant, reachable_via_transport: bool) -> bool {
        self.is_unhealthy_at(peer, now) && !reachable_via_transport
    }
}

impl Default for HeartbeatMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_INTERVAL, DEFAULT_MISSED_THRESHOLD)
    }
}
