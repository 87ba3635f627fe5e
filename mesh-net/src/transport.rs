//! Transport manager (C7): multiplexes concrete transports behind a single
//! abstract interface, with retry/fall-through send and a per-peer
//! connection state machine (`NEW -> CONNECTING -> CONNECTED -> {
//! DISCONNECTED | FAILED | CLOSED }`).
//!
//! Concrete transports (BLE, WebRTC/ICE, mDNS, …) are external
//! collaborators; this module defines only the seam they
//! plug into.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mesh_crypto::PeerId;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::error::{NetError, Result};

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_SEND_RETRY_MAX: u32 = 3;
pub const DEFAULT_SEND_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

#[derive(Debug, Clone)]
pub struct PeerInfo {
    pub id: PeerId,
    pub transport_name: String,
    pub address_hint: Option<String>,
}

/// Inbound events a transport reports back to its manager, mirroring
/// the `Transport` event surface.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    Message {
        from: PeerId,
        payload: Vec<u8>,
        timestamp_ms: u64,
    },
    PeerConnected {
        peer: PeerId,
        info: PeerInfo,
    },
    PeerDisconnected {
        peer: PeerId,
        reason: String,
    },
    StateChange {
        peer: PeerId,
        state: ConnectionState,
    },
    Error {
        message: String,
    },
}

/// A concrete transport: name, connect/disconnect, send/broadcast, and
/// connection-state queries, driven by the manager below.
#[async_trait]
pub trait Transport: Send + Sync {
    fn name(&self) -> &str;
    fn local_peer_id(&self) -> PeerId;
    async fn start(&self, events: mpsc::UnboundedSender<TransportEvent>) -> Result<()>;
    async fn stop(&self) -> Result<()>;
    async fn connect(&self, peer: &PeerId) -> Result<()>;
    async fn disconnect(&self, peer: &PeerId) -> Result<()>;
    async fn send(&self, peer: &PeerId, bytes: &[u8]) -> Result<()>;
    async fn broadcast(&self, bytes: &[u8], exclude: Option<&PeerId>) -> Result<()>;
    async fn connection_state(&self, peer: &PeerId) -> ConnectionState;
    async fn peer_info(&self, peer: &PeerId) -> Option<PeerInfo>;
}

struct ReachabilityTracker {
    /// Transports that currently report each peer as CONNECTED. A peer is
    /// considered disconnected ("fires only after *all*
    /// transports report `p` disconnected") only once its entry here is
    /// removed or becomes empty.
    connected_via: HashMap<PeerId, HashSet<String>>,
}

impl ReachabilityTracker {
    fn new() -> Self {
        Self {
            connected_via: HashMap::new(),
        }
    }

    fn mark_connected(&mut self, peer: PeerId, transport: &str) {
        self.connected_via.entry(peer).or_default().insert(transport.to_string());
    }

    /// Returns `true` if this was the peer's last connected transport
    /// (i.e. the peer is now fully disconnected).
    fn mark_disconnected(&mut self, peer: &PeerId, transport: &str) -> bool {
        if let Some(set) = self.connected_via.get_mut(peer) {
            set.remove(transport);
            if set.is_empty() {
                self.connected_via.remove(peer);
                return true;
            }
        }
        false
    }

    fn is_reachable(&self, peer: &PeerId) -> bool {
        self.connected_via.get(peer).map_or(false, |s| !s.is_empty())
    }
}

/// Multiplexes a stable-ordered set of transports, retrying and falling
/// through on send failure.
pub struct TransportManager {
    transports: Vec<(String, Arc<dyn Transport>)>,
    reachability: Mutex<ReachabilityTracker>,
    retry_delay: Duration,
    max_retries: u32,
}

impl TransportManager {
    pub fn new(retry_delay: Duration, max_retries: u32) -> Self {
        Self {
            transports: Vec::new(),
            reachability: Mutex::new(ReachabilityTracker::new()),
            retry_delay,
            max_retries,
        }
    }

    pub fn register(&mut self, transport: Arc<dyn Transport>) {
        let name = transport.name().to_string();
        self.transports.push((name, transport));
    }

    pub fn record_state_change(&self, peer: &PeerId, transport: &str, state: ConnectionState) {
        let mut guard = self.reachability.lock();
        match state {
            ConnectionState::Connected => guard.mark_connected(peer.clone(), transport),
            ConnectionState::Disconnected | ConnectionState::Failed | ConnectionState::Closed => {
                if guard.mark_disconnected(peer, transport) {
                    info!(peer = %peer, "peer disconnected on all transports");
                }
            }
            _ => {}
        }
    }

    /// A peer is reachable iff at least one of its transports is CONNECTED.
    pub fn is_reachable(&self, peer: &PeerId) -> bool {
        self.reachability.lock().is_reachable(peer)
    }

    /// True iff at least one peer is currently reachable via any
    /// transport. Drives the node facade's `Running`/`Degraded` split
    ///: `Degraded` means this is false.
    pub fn any_reachable(&self) -> bool {
        !self.reachability.lock().connected_via.is_empty()
    }

    async fn connected_transports_in_order(&self, peer: &PeerId) -> Vec<&Arc<dyn Transport>> {
        let mut out = Vec::new();
        for (_, t) in &self.transports {
            if t.connection_state(peer).await == ConnectionState::Connected {
                out.push(t);
            }
        }
        out
    }

    /// Send `bytes` to `peer`: try `preferred` first if connected, then
    /// every connected transport in stable registration order, retrying
    /// up to `max_retries` times with `retry_delay` between full passes.
    /// Surfaces `PeerUnreachable` if every attempt fails.
    pub async fn send(&self, peer: &PeerId, bytes: &[u8], preferred: Option<&str>) -> Result<()> {
        let mut attempt = 0;
        loop {
            if let Some(name) = preferred {
                if let Some((_, t)) = self.transports.iter().find(|(n, _)| n == name) {
                    if t.connection_state(peer).await == ConnectionState::Connected {
                        if t.send(peer, bytes).await.is_ok() {
                            return Ok(());
                        }
                        warn!(peer = %peer, transport = name, "preferred transport send failed");
                    }
                }
            }

            for t in self.connected_transports_in_order(peer).await {
                if preferred == Some(t.name()) {
                    continue;
                }
                match t.send(peer, bytes).await {
                    Ok(()) => return Ok(()),
                    Err(e) => warn!(peer = %peer, transport = t.name(), error = %e, "transport send failed"),
                }
            }

            attempt += 1;
            if attempt > self.max_retries {
                return Err(NetError::PeerUnreachable(peer.to_string()));
            }
            tokio::time::sleep(self.retry_delay).await;
        }
    }

    /// Broadcast to every currently-connected peer except `exclude`.
    /// Per-peer failures are independent and do not abort the broadcast.
    pub async fn broadcast(&self, bytes: &[u8], exclude: Option<&PeerId>) -> Vec<(PeerId, Result<()>)> {
        let mut results = Vec::new();
        let peers: HashSet<PeerId> = self.reachability.lock().connected_via.keys().cloned().collect();
        for peer in peers {
            if exclude == Some(&peer) {
                continue;
            }
            let r = self.send(&peer, bytes, None).await;
            results.push((peer, r));
        }
        results
    }

    pub fn len(&self) -> usize {
        self.transports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transports.is_empty()
    }
}

impl Default for TransportManager {
    fn default() -> Self {
        Self::new(DEFAULT_SEND_RETRY_DELAY, DEFAULT_SEND_RETRY_MAX)
    }
}

/// In-process loopback transport test double (ambient test tooling, not a
/// product feature): lets the crate's own tests, and downstream consumers
/// wiring up two `MeshNode`s in one process, exchange frames without a
/// real network. Never compiled into the default build.
#[cfg(any(test, feature = "testing"))]
pub mod testing {
    use super::*;
    use std::sync::Weak;

    pub struct LoopbackTransport {
        local: PeerId,
        peers: Mutex<HashMap<PeerId, Weak<LoopbackTransport>>>,
        events: Mutex<Option<mpsc::UnboundedSender<TransportEvent>>>,
        connected: Mutex<HashSet<PeerId>>,
    }

    impl LoopbackTransport {
        pub fn new(local: PeerId) -> Arc<Self> {
            Arc::new(Self {
                local,
                peers: Mutex::new(HashMap::new()),
                events: Mutex::new(None),
                connected: Mutex::new(HashSet::new()),
            })
        }

        pub fn link(self: &Arc<Self>, other: &Arc<Self>) {
            self.peers.lock().insert(other.local.clone(), Arc::downgrade(other));
            other.peers.lock().insert(self.local.clone(), Arc::downgrade(self));
        }
    }

    #[async_trait]
    impl Transport for LoopbackTransport {
        fn name(&self) -> &str {
            "loopback"
        }

        fn local_peer_id(&self) -> PeerId {
            self.local.clone()
        }

        async fn start(&self, events: mpsc::UnboundedSender<TransportEvent>) -> Result<()> {
            *self.events.lock() = Some(events);
            Ok(())
        }

        async fn stop(&self) -> Result<()> {
            *self.events.lock() = None;
            self.connected.lock().clear();
            Ok(())
        }

        async fn connect(&self, peer: &PeerId) -> Result<()> {
            if !self.peers.lock().contains_key(peer) {
                return Err(NetError::UnknownTransport(peer.to_string()));
            }
            self.connected.lock().insert(peer.clone());
            Ok(())
        }

        async fn disconnect(&self, peer: &PeerId) -> Result<()> {
            self.connected.lock().remove(peer);
            Ok(())
        }

        async fn send(&self, peer: &PeerId, bytes: &[u8]) -> Result<()> {
            if !self.connected.lock().contains(peer) {
                return Err(NetError::PeerUnreachable(peer.to_string()));
            }
            let target = self
                .peers
                .lock()
                .get(peer)
                .and_then(|w| w.upgrade())
                .ok_or_else(|| NetError::PeerUnreachable(peer.to_string()))?;
            if let Some(sender) = target.events.lock().as_ref() {
                let _ = sender.send(TransportEvent::Message {
                    from: self.local.clone(),
                    payload: bytes.to_vec(),
                    timestamp_ms: 0,
                });
            }
            Ok(())
        }

        async fn broadcast(&self, bytes: &[u8], exclude: Option<&PeerId>) -> Result<()> {
            let targets: Vec<PeerId> = self.connected.lock().iter().cloned().collect();
            for peer in targets {
                if exclude == Some(&peer) {
                    continue;
                }
                let _ = self.send(&peer, bytes).await;
            }
            Ok(())
        }

        async fn connection_state(&self, peer: &PeerId) -> ConnectionState {
            if self.connected.lock().contains(peer) {
                ConnectionState::Connected
            } else {
                ConnectionState::New
            }
        }

        async fn peer_info(&self, peer: &PeerId) -> Option<PeerInfo> {
            if self.connected.lock().contains(peer) {
                Some(PeerInfo {
                    id: peer.clone(),
                    transport_name: "loopback".to_string(),
                    address_hint: None,
                })
            } else {
                None
            }
        }
    }
}
