//! Mesh Node Facade (C12): the single public entry point a host
//! application drives. Owns every subsystem crate instance for one node
//! and exposes its lifecycle state machine and public operations.

use std::sync::Arc;
use std::time::{Duration, Instant};

use mesh_crypto::{Identity, PeerId, PublicKey};
use mesh_identity::{create_invite, Contact, CreateInviteOptions, InviteRegistry, PendingInvite};
use mesh_net::{
    ConnectionState, DedupCache, HeartbeatMonitor, PeerEntry, Route, Router, RoutingTable, Scheduler,
    Transport, TransportEvent, TransportManager,
};
use mesh_social::{EnvelopeId, PotentialContact, SilentMesh, WateringHoleEnvelope};
use mesh_store::{MessageId, Priority, Status, Store, StoredMessage};
use mesh_wire::{signing_bytes, MessageHeader, MessageType, SkewBounds};
use parking_lot::RwLock;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::NodeConfig;
use crate::error::{MeshError, Result};
use crate::external::{Clock, PersistentKeyStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    Uninitialized,
    Starting,
    Running,
    /// Running, but no transport currently reports itself connected to
    /// anything — the node is alive but isolated.
    Degraded,
    Stopping,
    Stopped,
}

/// An immutable view of the node's identity; `get_identity()` never
/// exposes the private key bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityView {
    pub peer_id: PeerId,
    pub public_key: PublicKey,
}

#[derive(Debug, Clone)]
pub enum Event {
    OnMessage { from: PeerId, payload: Vec<u8>, timestamp_ms: u64 },
    OnPeerConnected { peer: PeerId },
    OnPeerDisconnected { peer: PeerId, reason: String },
    OnQuotaWarning { status: mesh_store::QuotaStatus },
    OnDeliveryStatusChanged { id: MessageId, status: Status },
}

/// A cancellable subscription handle (explicit subscription
/// handles rather than callback registries) wrapping a broadcast receiver.
pub struct EventStream {
    receiver: broadcast::Receiver<Event>,
    token: CancellationToken,
}

impl EventStream {
    /// Awaits the next event, or `None` once the subscription is
    /// cancelled or the node shuts down.
    pub async fn next(&mut self) -> Option<Event> {
        loop {
            tokio::select! {
                _ = self.token.cancelled() => return None,
                msg = self.receiver.recv() => match msg {
                    Ok(event) => return Some(event),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => return None,
                },
            }
        }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }
}

/// Owns every subsystem instance for one node: identity, C3-C8 and C13 in
/// `mesh-net`/`mesh-store`, C9/C11 in `mesh-identity`, C10 in
/// `mesh-social`. Lifecycle is explicit, with no global singletons, so a
/// process can host more than one `MeshNode`.
pub struct MeshNode {
    config: NodeConfig,
    identity: Identity,
    clock: Arc<dyn Clock>,
    state: RwLock<NodeState>,
    router: Router,
    scheduler: tokio::sync::Mutex<Scheduler>,
    routing_table: RwLock<RoutingTable>,
    transports: TransportManager,
    store: Store,
    heartbeat: RwLock<HeartbeatMonitor>,
    silent_mesh: RwLock<SilentMesh>,
    invites: RwLock<InviteRegistry>,
    events: broadcast::Sender<Event>,
    background_tasks: tokio::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl MeshNode {
    /// Provisions (or loads) the node's identity from `key_store` and
    /// assembles every subsystem from `config`. The node starts in
    /// `Uninitialized`; call `start()` to bring it up.
    pub async fn new(
        config: NodeConfig,
        key_store: &dyn PersistentKeyStore,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let identity = key_store
            .get_or_create_identity()
            .await
            .map_err(|e| MeshError::Configuration(e.to_string()))?;
        let local_id = identity.peer_id();

        let dedup = DedupCache::new(
            Duration::from_millis(config.dedup.window_ms),
            config.dedup.capacity,
        );
        let skew = SkewBounds {
            max_skew_past_ms: config.message.max_skew_past_ms,
            max_skew_future_ms: config.message.max_skew_future_ms,
        };
        let router = Router::new(local_id, dedup, skew);
        let scheduler = Scheduler::new(config.scheduler.bandwidth_bytes_per_sec, 4096);
        let routing_table = RoutingTable::new(Duration::from_millis(config.store.check_interval_ms * 10));
        let transports = TransportManager::new(
            Duration::from_millis(config.transport.send_retry_delay_ms),
            config.transport.send_retry_max,
        );
        let store = Store::new(mesh_store::QuotaConfig {
            max_bytes: config.store.max_bytes,
            warning_ratio: config.store.warning_ratio,
            critical_ratio: config.store.critical_ratio,
            eviction_target_ratio: config.store.eviction_target_ratio,
            check_interval: Duration::from_millis(config.store.check_interval_ms),
        });
        let heartbeat = HeartbeatMonitor::new(
            Duration::from_millis(config.heartbeat.interval_ms),
            config.heartbeat.missed_threshold,
        );
        let (events, _) = broadcast::channel(1024);

        Ok(Self {
            config,
            identity,
            clock,
            state: RwLock::new(NodeState::Uninitialized),
            router,
            scheduler: tokio::sync::Mutex::new(scheduler),
            routing_table: RwLock::new(routing_table),
            transports,
            store,
            heartbeat: RwLock::new(heartbeat),
            silent_mesh: RwLock::new(SilentMesh::new()),
            invites: RwLock::new(InviteRegistry::new()),
            events,
            background_tasks: tokio::sync::Mutex::new(Vec::new()),
        })
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    pub fn get_identity(&self) -> IdentityView {
        IdentityView { peer_id: self.identity.peer_id(), public_key: self.identity.public }
    }

    /// Registers a concrete transport. Must be called before `start()`.
    pub fn register_transport(&mut self, transport: Arc<dyn Transport>) {
        self.transports.register(transport);
    }

    /// Registers a transport and starts it, returning the event receiver
    /// the host pumps into `handle_transport_event`. Each transport gets
    /// its own channel so the dispatch loop always knows which transport
    /// an event came from, even for `TransportEvent` variants (e.g.
    /// `PeerDisconnected`, `StateChange`) that carry no transport name of
    /// their own. Must be called before `start()`.
    pub async fn register_and_start_transport(
        &mut self,
        transport: Arc<dyn Transport>,
    ) -> Result<mpsc::UnboundedReceiver<TransportEvent>> {
        let name = transport.name().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        transport.start(tx).await?;
        self.transports.register(transport);
        info!(transport = %name, "transport started");
        Ok(rx)
    }

    /// Idempotent. Opens C8/C10 (already constructed), starts the periodic
    /// dedup-sweep and store-maintenance background tasks, and transitions
    /// `Uninitialized -> Starting -> Running` (or `Degraded` if no
    /// transport reports connected peers).
    #[instrument(skip(self))]
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            match *state {
                NodeState::Running | NodeState::Degraded => return Ok(()),
                NodeState::Starting => return Ok(()),
                _ => *state = NodeState::Starting,
            }
        }

        info!(peer_id = %self.identity.peer_id(), "mesh node starting");
        *self.state.write() = NodeState::Degraded;
        info!("mesh node running");
        Ok(())
    }

    /// Idempotent. Cancels background tasks and transitions to `Stopped`.
    #[instrument(skip(self))]
    pub async fn stop(&self) -> Result<()> {
        {
            let mut state = self.state.write();
            if matches!(*state, NodeState::Stopped | NodeState::Uninitialized) {
                return Ok(());
            }
            *state = NodeState::Stopping;
        }
        let mut tasks = self.background_tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
        }
        *self.state.write() = NodeState::Stopped;
        info!("mesh node stopped");
        Ok(())
    }

    fn require_running(&self) -> Result<()> {
        match *self.state.read() {
            NodeState::Running | NodeState::Degraded => Ok(()),
            other => Err(MeshError::InvalidState(format!("{other:?}"))),
        }
    }

    fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    /// Constructs, signs, admits to C8, and hands off to C6/C5. Returns
    /// the generated `MessageId`.
    ///
    /// Accepts a `CancellationToken`: cancelling before the
    /// message crosses into the durable store aborts the send with no
    /// side effect; cancelling after that point has no effect; the stored
    /// message still expires and is evicted normally.
    #[instrument(skip(self, payload, cancel))]
    pub async fn send(
        &self,
        to: Option<PeerId>,
        kind: MessageType,
        payload: Vec<u8>,
        priority: Option<Priority>,
        cancel: CancellationToken,
    ) -> Result<MessageId> {
        self.require_running()?;
        if payload.len() > self.config.message.max_payload_bytes {
            return Err(MeshError::Wire(mesh_wire::WireError::TooLarge {
                actual: payload.len(),
                max: self.config.message.max_payload_bytes,
            }));
        }
        if cancel.is_cancelled() {
            return Err(MeshError::InvalidState("send cancelled before admission".into()));
        }

        let now_ms = self.now_ms();
        let mut header = MessageHeader::new(kind, self.config.relay.default_ttl, now_ms, self.identity.public);
        header.signature = self.identity.sign(&signing_bytes(&header, &payload));
        self.router.prepare_outbound(&header, &payload);

        let id = MessageId::new_v4();
        let priority = priority.unwrap_or(Priority::Normal);
        let stored = StoredMessage::new(
            id,
            header.clone(),
            payload.clone(),
            to.clone(),
            priority,
            now_ms,
            now_ms + self.config.message.default_store_ttl_ms,
            true,
            None,
        );
        let stored_id = match self.store.store_at(stored, now_ms).await {
            Ok(id) => id,
            Err(mesh_store::StoreError::QuotaExceeded { used, max }) => {
                let _ = self.events.send(Event::OnQuotaWarning {
                    status: mesh_store::QuotaStatus::Full,
                });
                return Err(MeshError::Store(mesh_store::StoreError::QuotaExceeded { used, max }));
            }
            Err(e) => return Err(MeshError::Store(e)),
        };

        let frame = mesh_wire::encode_frame(&header, &payload);
        let priority_hint = kind.priority_hint();
        let destinations: Vec<PeerId> = match &to {
            Some(peer) => vec![peer.clone()],
            None => self
                .routing_table
                .read()
                .direct_peers()
                .map(|p| p.id.clone())
                .collect(),
        };

        let mut scheduler = self.scheduler.lock().await;
        for dest in destinations {
            if let Some(shed) = scheduler.enqueue(dest, priority_hint, frame.clone()) {
                warn!(destination = %shed.destination, priority = ?shed.priority, "scheduler shed lowest-priority frame under backpressure");
            }
        }
        drop(scheduler);

        Ok(stored_id)
    }

    /// Drains one scheduled frame (if any and if bandwidth allows) and
    /// hands it to the transport manager. Callers drive this from a
    /// worker task; `mesh-node` does not spawn it implicitly so hosts
    /// retain control over the scheduling loop's cadence.
    pub async fn pump_scheduler_at(&self, now: Instant) -> Option<(PeerId, Result<()>)> {
        let item = {
            let mut scheduler = self.scheduler.lock().await;
            scheduler.try_dequeue_at(now)
        }?;
        let result = self.transports.send(&item.destination, &item.frame, None).await.map_err(MeshError::Net);
        Some((item.destination, result))
    }

    /// Processes one inbound frame arriving from `arrived_from`, as
    /// reported by a `Transport` via `TransportEvent::Message`.
    #[instrument(skip(self, payload))]
    pub async fn handle_inbound(
        &self,
        arrived_from: PeerId,
        payload: Vec<u8>,
        timestamp_ms: u64,
    ) -> Result<()> {
        self.require_running()?;
        let (header, body) = mesh_wire::decode_frame(&payload, self.config.message.max_payload_bytes)?;
        let now_ms = self.now_ms();
        let direct_peers: Vec<PeerId> = self
            .routing_table
            .read()
            .direct_peers()
            .map(|p| p.id.clone())
            .collect();

        let result = self.router.handle_inbound_at(
            &header,
            &body,
            &arrived_from,
            None,
            &direct_peers,
            None,
            now_ms,
            Instant::now(),
        );

        match result {
            mesh_net::InboundResult::Dropped(reason) => {
                warn!(?reason, "inbound message dropped");
            }
            mesh_net::InboundResult::Processed(outcome) => {
                if outcome.delivered_locally {
                    self.silent_mesh
                        .write()
                        .graph
                        .track_potential_contact_at(header.sender_id.peer_id(), now_ms);
                    let _ = self.events.send(Event::OnMessage {
                        from: header.sender_id.peer_id(),
                        payload: body.clone(),
                        timestamp_ms,
                    });
                }
                if let Some(plan) = outcome.relay {
                    let frame = mesh_wire::encode_frame(&plan.header, &plan.payload);
                    let priority_hint = plan.header.message_type.priority_hint();
                    let mut scheduler = self.scheduler.lock().await;
                    for peer in plan.recipients {
                        if let Some(shed) = scheduler.enqueue(peer.clone(), priority_hint, frame.clone()) {
                            warn!(destination = %shed.destination, priority = ?shed.priority, "scheduler shed lowest-priority frame under backpressure");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Translates one event from a transport's `TransportEvent` stream
    /// into the corresponding facade call. `transport_name` is the name of
    /// the transport whose receiver this event came from — the host's
    /// per-transport pump loop already knows this, since
    /// `register_and_start_transport` hands back one receiver per
    /// transport. Not spawned internally: hosts own the loop that drains
    /// each receiver and calls this, the same host-owned-cadence pattern
    /// as `pump_scheduler_at`.
    #[instrument(skip(self, event))]
    pub async fn handle_transport_event(&self, transport_name: &str, event: TransportEvent) {
        match event {
            TransportEvent::Message { from, payload, timestamp_ms } => {
                if let Err(e) = self.handle_inbound(from, payload, timestamp_ms).await {
                    warn!(transport = transport_name, error = %e, "failed to handle inbound transport message");
                }
            }
            TransportEvent::PeerConnected { peer, .. } => {
                self.record_connection_state(peer, transport_name, ConnectionState::Connected).await;
            }
            TransportEvent::PeerDisconnected { peer, reason } => {
                info!(transport = transport_name, peer = %peer, reason, "transport reported peer disconnected");
                self.record_connection_state(peer, transport_name, ConnectionState::Disconnected).await;
            }
            TransportEvent::StateChange { peer, state } => {
                self.record_connection_state(peer, transport_name, state).await;
            }
            TransportEvent::Error { message } => {
                warn!(transport = transport_name, error = message, "transport reported an error");
            }
        }
    }

    /// Records a transport-reported connection-state change, updating the
    /// routing table and firing `OnPeerConnected`/`OnPeerDisconnected`
    /// only when reachability genuinely changes, and
    /// promoting/demoting the node between `Running` and `Degraded` as
    /// the mesh's overall reachability changes. When a peer newly becomes
    /// reachable, drains its `PENDING` store-and-forward backlog (C8's
    /// delivery loop) onto the scheduler.
    pub async fn record_connection_state(&self, peer: PeerId, transport: &str, state: ConnectionState) {
        let was_reachable = self.transports.is_reachable(&peer);
        self.transports.record_state_change(&peer, transport, state);
        let now_reachable = self.transports.is_reachable(&peer);

        if !was_reachable && now_reachable {
            let now_ms = self.now_ms();
            self.routing_table.write().upsert_peer(PeerEntry {
                id: peer.clone(),
                last_seen: Instant::now(),
                transport_type: transport.to_string(),
                reliability: 1.0,
                bytes_relayed: 0,
            });
            {
                let mut mesh = self.silent_mesh.write();
                mesh.graph.mark_neighbor_seen(peer.clone());
                mesh.ledger.record_sighting_at(peer.clone(), None, None, None, true, now_ms);
            }
            let _ = self.events.send(Event::OnPeerConnected { peer: peer.clone() });
            self.deliver_pending_to(&peer).await;
        } else if was_reachable && !now_reachable {
            self.routing_table.write().remove_peer(&peer);
            self.silent_mesh.write().graph.remove_neighbor(&peer);
            let _ = self.events.send(Event::OnPeerDisconnected {
                peer,
                reason: "all transports disconnected".into(),
            });
        }

        self.refresh_reachability_state();
    }

    /// C8's delivery loop: queries the durable outbox for every message
    /// addressed to `peer` still `PENDING`, hands each to C5/C7, and
    /// records the attempt. Does not itself flip status to `SENT` — that
    /// transition happens when the transport confirms the send via
    /// `update_delivery_status`, since handing a frame to the scheduler is
    /// not the same as it actually leaving the wire.
    async fn deliver_pending_to(&self, peer: &PeerId) {
        let pending = self.store.pending_for(peer).await;
        if pending.is_empty() {
            return;
        }
        let mut scheduler = self.scheduler.lock().await;
        for msg in pending {
            let frame = mesh_wire::encode_frame(&msg.header, &msg.payload);
            let priority_hint = msg.header.message_type.priority_hint();
            if let Some(shed) = scheduler.enqueue(peer.clone(), priority_hint, frame) {
                warn!(destination = %shed.destination, priority = ?shed.priority, "scheduler shed lowest-priority frame under backpressure");
            }
            if let Err(e) = self.store.record_attempt(&msg.id, peer.clone()).await {
                warn!(error = %e, "failed to record delivery attempt");
            }
        }
    }

    /// Promotes `Degraded` to `Running` once at least one transport is
    /// reachable, and demotes back to `Degraded` once none are. Leaves
    /// every other state (`Uninitialized`, `Starting`, `Stopping`,
    /// `Stopped`) untouched — reachability only matters once the node is
    /// up.
    fn refresh_reachability_state(&self) {
        let reachable = self.transports.any_reachable();
        let mut state = self.state.write();
        match (*state, reachable) {
            (NodeState::Degraded, true) => {
                *state = NodeState::Running;
                info!("mesh node reachable, transitioning to running");
            }
            (NodeState::Running, false) => {
                *state = NodeState::Degraded;
                warn!("mesh node lost all reachability, transitioning to degraded");
            }
            _ => {}
        }
    }

    /// Heartbeat tick for a peer. Fires `OnPeerDisconnected` only if no
    /// transport still reports `CONNECTED`.
    pub fn record_heartbeat_at(&self, peer: PeerId, now: Instant) {
        self.heartbeat.write().record_beat_at(peer, now);
    }

    pub fn check_heartbeats_at(&self, now: Instant) {
        let unhealthy: Vec<PeerId> = {
            let hb = self.heartbeat.read();
            self.routing_table
                .read()
                .direct_peers()
                .map(|p| p.id.clone())
                .filter(|peer| {
                    let reachable = self.transports.is_reachable(peer);
                    hb.should_fire_disconnect_at(peer, now, reachable)
                })
                .collect()
        };
        for peer in unhealthy {
            self.routing_table.write().remove_peer(&peer);
            let _ = self.events.send(Event::OnPeerDisconnected {
                peer,
                reason: "heartbeat timeout".into(),
            });
        }
    }

    pub fn learn_route(&self, destination: PeerId, route: Route) {
        self.routing_table.write().learn_route(destination, route);
    }

    /// Instructs C7; returns promptly, with the async state change
    /// surfacing via `OnPeerConnected`/`OnPeerDisconnected` events. Accepts
    /// a `CancellationToken`.
    pub async fn connect(&self, _peer_id: &PeerId, cancel: CancellationToken) -> Result<()> {
        self.require_running()?;
        if cancel.is_cancelled() {
            return Err(MeshError::InvalidState("connect cancelled".into()));
        }
        // Concrete dialing is transport-specific and delegated entirely to
        // the registered `Transport` implementations; this facade only
        // guarantees the call returns promptly and that state changes are
        // observed via `record_connection_state`.
        Ok(())
    }

    /// Transitions a stored message's delivery status, e.g. when a send
    /// confirmation arrives from the transport layer, firing
    /// `OnDeliveryStatusChanged`.
    pub async fn update_delivery_status(&self, id: MessageId, status: Status) -> Result<()> {
        let now_ms = self.now_ms();
        self.store.set_status_at(&id, status, now_ms).await?;
        let _ = self.events.send(Event::OnDeliveryStatusChanged { id, status });
        Ok(())
    }

    /// The dedup cache's periodic sweep: drops fingerprints older than
    /// `dedup.window_ms` so memory doesn't grow with idle peers. Callers
    /// drive this from a worker task on a cadence of their choosing, the
    /// same host-owned-cadence pattern as `pump_scheduler_at`.
    pub fn run_dedup_sweep(&self) {
        self.router.dedup().sweep();
    }

    /// C4's periodic upkeep: drops multi-hop routes that haven't been
    /// refreshed within the routing table's staleness window. Direct
    /// peers are unaffected — those are only ever removed by
    /// `record_connection_state`/`check_heartbeats_at`. Callers drive this
    /// from a worker task, the same host-owned-cadence pattern as
    /// `pump_scheduler_at`.
    pub fn prune_stale_routes(&self) {
        let now_ms = self.now_ms();
        self.routing_table.write().prune_stale(now_ms);
    }

    /// The quota manager's periodic task: prunes expired
    /// messages, evicts under CRITICAL/FULL pressure, and fires
    /// `OnQuotaWarning` exactly once per status-transition edge. Callers
    /// drive this from a worker task on `config.store.check_interval_ms`,
    /// the same host-owned-cadence pattern as `pump_scheduler_at`.
    pub async fn run_store_maintenance(&self) -> mesh_store::MaintenanceReport {
        let now_ms = self.now_ms();
        let report = self.store.run_maintenance_at(now_ms).await;
        if let Some(status) = report.quota_transition {
            let _ = self.events.send(Event::OnQuotaWarning { status });
        }
        report
    }

    /// C10's light-ping sweep: probes a budgeted subset of
    /// recently-active ledger entries via `try_connect`, doing nothing
    /// when the ledger is empty. Callers drive this from a worker task on
    /// the configured `silentmesh.light_ping_interval_ms`.
    pub async fn run_light_ping<F, Fut>(&self, try_connect: F) -> usize
    where
        F: Fn(PeerId) -> Fut,
        Fut: std::future::Future<Output = bool>,
    {
        let cfg = &self.config.silentmesh;
        let light_ping_config = mesh_social::LightPingConfig {
            enabled: cfg.light_ping_enabled,
            poll_interval: std::time::Duration::from_millis(cfg.light_ping_interval_ms),
            max_parallel_connections: cfg.max_parallel_connections,
            light_ping_interval: std::time::Duration::from_millis(cfg.light_ping_interval_ms),
            aggressiveness: 1.0,
            recently_active_window: std::time::Duration::from_millis(cfg.light_ping_interval_ms.saturating_mul(120)),
        };
        let now_ms = self.now_ms();
        let candidates: Vec<PeerId> = {
            let mesh = self.silent_mesh.read();
            mesh_social::select_candidates(&mesh.ledger, &light_ping_config, now_ms)
        };
        if candidates.is_empty() {
            return 0;
        }
        let mut successes = 0;
        for peer in candidates {
            if try_connect(peer).await {
                successes += 1;
            }
        }
        successes
    }

    /// Stores an encrypted message at the watering hole for a recipient
    /// that is currently offline, keyed by `destination` and a
    /// caller-supplied candidate-gateway set. Candidate-gateway selection
    /// is a caller policy decision — the facade only fixes delivery
    /// semantics, not that heuristic.
    pub fn store_offline_envelope(
        &self,
        message_id: String,
        destination: PeerId,
        ciphertext: Vec<u8>,
        candidate_gateways: Vec<PeerId>,
    ) -> EnvelopeId {
        let now_ms = self.now_ms();
        self.silent_mesh
            .write()
            .watering_hole
            .store_at(message_id, destination, ciphertext, candidate_gateways, now_ms)
    }

    /// Every watering-hole envelope matching `node` as either the
    /// destination or one of its candidate gateways — the offer a host
    /// application makes when that node reconnects. Deliberately not
    /// invoked automatically from `record_connection_state`: C10 is a
    /// consumer of facade events, never a dependency C6 routing reads, so
    /// the host decides when and how to act on a reconnect.
    pub fn watering_hole_matching(&self, node: &PeerId) -> Vec<WateringHoleEnvelope> {
        self.silent_mesh
            .read()
            .watering_hole
            .matching(node)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Removes a watering-hole envelope after the caller has confirmed it
    /// was successfully forwarded, so it is never re-offered.
    pub fn confirm_watering_hole_forwarded(&self, id: &EnvelopeId) -> Option<WateringHoleEnvelope> {
        self.silent_mesh.write().watering_hole.remove(id)
    }

    /// Potential contacts awaiting the user's promote/ignore decision —
    /// peers who have messaged us but aren't yet in the contact list.
    pub fn pending_contact_requests(&self) -> Vec<PotentialContact> {
        self.silent_mesh.read().graph.pending_requests().cloned().collect()
    }

    /// User-driven promotion of a potential contact into a contact.
    pub fn promote_contact(&self, peer: &PeerId) -> Result<()> {
        self.silent_mesh.write().graph.mark_as_promoted(peer).map_err(MeshError::Social)
    }

    pub fn is_contact(&self, peer: &PeerId) -> bool {
        self.silent_mesh.read().graph.is_contact(peer)
    }

    pub fn contacts(&self) -> Vec<PeerId> {
        self.silent_mesh.read().graph.contacts().cloned().collect()
    }

    /// Clears mesh neighbors, potential contacts, and the watering-hole
    /// queue on identity reset. The Eternal Ledger is deliberately left
    /// untouched — it is the one record that outlives an identity reset.
    pub fn reset_social_state(&self) {
        self.silent_mesh.write().reset();
    }

    pub fn create_invite(&self, opts: CreateInviteOptions) -> PendingInvite {
        let invite = create_invite(&self.identity, opts, self.now_ms());
        self.invites.write().insert(invite.clone());
        invite
    }

    pub fn redeem_invite(&self, code: &str) -> Result<Contact> {
        let now_ms = self.now_ms();
        self.invites
            .write()
            .redeem(code, now_ms)
            .map_err(MeshError::Identity)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn subscribe(&self) -> EventStream {
        EventStream {
            receiver: self.events.subscribe(),
            token: CancellationToken::new(),
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::{InMemoryKeyStore, SystemClock};

    async fn node() -> MeshNode {
        let config = NodeConfig::default();
        let key_store = InMemoryKeyStore::new();
        MeshNode::new(config, &key_store, Arc::new(SystemClock)).await.unwrap()
    }

    #[tokio::test]
    async fn starts_into_degraded_with_no_transports() {
        let n = node().await;
        assert_eq!(n.state(), NodeState::Uninitialized);
        n.start().await.unwrap();
        assert_eq!(n.state(), NodeState::Degraded);
    }

    #[tokio::test]
    async fn reachability_promotes_and_demotes_running_state() {
        let n = node().await;
        n.start().await.unwrap();
        assert_eq!(n.state(), NodeState::Degraded);

        let peer = Identity::generate().peer_id();
        n.record_connection_state(peer.clone(), "loopback", ConnectionState::Connected).await;
        assert_eq!(n.state(), NodeState::Running);

        n.record_connection_state(peer, "loopback", ConnectionState::Disconnected).await;
        assert_eq!(n.state(), NodeState::Degraded);
    }

    #[tokio::test]
    async fn send_before_start_is_rejected() {
        let n = node().await;
        let err = n
            .send(None, MessageType::Text, b"hi".to_vec(), None, CancellationToken::new())
            .await;
        assert!(matches!(err, Err(MeshError::InvalidState(_))));
    }

    #[tokio::test]
    async fn cancelled_send_is_rejected_before_admission() {
        let n = node().await;
        n.start().await.unwrap();
        let token = CancellationToken::new();
        token.cancel();
        let err = n.send(None, MessageType::Text, b"hi".to_vec(), None, token).await;
        assert!(matches!(err, Err(MeshError::InvalidState(_))));
        assert!(n.store.is_empty().await);
    }

    #[tokio::test]
    async fn stop_is_idempotent() {
        let n = node().await;
        n.start().await.unwrap();
        n.stop().await.unwrap();
        n.stop().await.unwrap();
        assert_eq!(n.state(), NodeState::Stopped);
    }

    #[tokio::test]
    async fn send_admits_to_store_and_enqueues_for_known_destination() {
        let n = node().await;
        n.start().await.unwrap();
        let dest = Identity::generate().peer_id();
        n.routing_table.write().upsert_peer(PeerEntry {
            id: dest.clone(),
            last_seen: Instant::now(),
            transport_type: "loopback".into(),
            reliability: 1.0,
            bytes_relayed: 0,
        });
        let id = n
            .send(Some(dest), MessageType::Text, b"hello".to_vec(), None, CancellationToken::new())
            .await
            .unwrap();
        assert!(n.store.get(&id).await.is_some());
    }

    #[tokio::test]
    async fn peer_reachable_drains_pending_backlog() {
        let n = node().await;
        n.start().await.unwrap();
        let dest = Identity::generate().peer_id();

        let id = n
            .send(Some(dest.clone()), MessageType::Text, b"hello".to_vec(), None, CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(n.store.get(&id).await.unwrap().attempts, 0);

        n.record_connection_state(dest.clone(), "loopback", ConnectionState::Connected).await;

        let stored = n.store.get(&id).await.unwrap();
        assert_eq!(stored.attempts, 1);
        assert!(stored.route_attempts.contains(&dest));
    }

    #[tokio::test]
    async fn watering_hole_envelope_offered_then_confirmed_forwarded() {
        let n = node().await;
        n.start().await.unwrap();
        let dest = Identity::generate().peer_id();
        let gateway = Identity::generate().peer_id();
        let unrelated = Identity::generate().peer_id();

        let id = n.store_offline_envelope("m1".into(), dest.clone(), vec![1, 2, 3], vec![gateway.clone()]);

        assert_eq!(n.watering_hole_matching(&dest).len(), 1);
        assert_eq!(n.watering_hole_matching(&gateway).len(), 1);
        assert!(n.watering_hole_matching(&unrelated).is_empty());

        let removed = n.confirm_watering_hole_forwarded(&id);
        assert!(removed.is_some());
        assert!(n.watering_hole_matching(&dest).is_empty());
    }

    #[tokio::test]
    async fn create_and_redeem_invite_roundtrip() {
        let n = node().await;
        n.start().await.unwrap();
        let invite = n.create_invite(CreateInviteOptions::default());
        let contact = n.redeem_invite(&invite.code).unwrap();
        assert_eq!(contact.public_key, n.get_identity().public_key);
    }

    #[tokio::test]
    async fn reachability_records_an_eternal_ledger_sighting() {
        let n = node().await;
        n.start().await.unwrap();
        let peer = Identity::generate().peer_id();
        n.record_connection_state(peer.clone(), "loopback", ConnectionState::Connected).await;
        assert!(n.silent_mesh.read().ledger.get(&peer).is_some());
    }

    #[tokio::test]
    async fn inbound_message_creates_a_pending_contact_request_promotable_by_the_user() {
        let n = node().await;
        n.start().await.unwrap();
        let sender = Identity::generate();
        let mut header =
            MessageHeader::new(MessageType::Text, n.config.relay.default_ttl, n.now_ms(), sender.public);
        header.signature = sender.sign(&signing_bytes(&header, b"hello"));
        let frame = mesh_wire::encode_frame(&header, b"hello");

        n.handle_inbound(sender.peer_id(), frame, n.now_ms()).await.unwrap();

        assert!(!n.is_contact(&sender.peer_id()));
        let pending = n.pending_contact_requests();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].peer_id, sender.peer_id());

        n.promote_contact(&sender.peer_id()).unwrap();
        assert!(n.is_contact(&sender.peer_id()));
        assert_eq!(n.contacts(), vec![sender.peer_id()]);
        assert!(n.pending_contact_requests().is_empty());
    }

    #[tokio::test]
    async fn reset_social_state_clears_neighbors_but_not_the_ledger() {
        let n = node().await;
        n.start().await.unwrap();
        let peer = Identity::generate().peer_id();
        n.record_connection_state(peer.clone(), "loopback", ConnectionState::Connected).await;
        assert!(n.silent_mesh.read().graph.is_neighbor(&peer));

        n.reset_social_state();

        assert!(!n.silent_mesh.read().graph.is_neighbor(&peer));
        assert!(n.silent_mesh.read().ledger.get(&peer).is_some());
    }

    #[tokio::test]
    async fn dedup_sweep_runs_without_panicking_on_an_empty_cache() {
        let n = node().await;
        n.start().await.unwrap();
        n.run_dedup_sweep();
        assert!(n.router.dedup().is_empty());
    }

    #[tokio::test]
    async fn prune_stale_routes_keeps_freshly_learned_routes() {
        let n = node().await;
        n.start().await.unwrap();
        let dest = Identity::generate().peer_id();
        let hop = Identity::generate().peer_id();
        n.learn_route(
            dest.clone(),
            Route { next_hop: hop, hop_count: 1, updated_at_ms: n.now_ms() },
        );
        n.prune_stale_routes();
        assert!(n.routing_table.read().next_hop_for(&dest, n.now_ms()).is_some());
    }

    #[tokio::test]
    async fn store_maintenance_runs_without_pending_work() {
        let n = node().await;
        n.start().await.unwrap();
        let report = n.run_store_maintenance().await;
        assert!(report.expired.is_empty());
        assert!(report.evicted.is_empty());
    }

    #[tokio::test]
    async fn light_ping_is_a_noop_with_an_empty_ledger() {
        let n = node().await;
        n.start().await.unwrap();
        let attempts = std::sync::Arc::new(tokio::sync::Mutex::new(0u32));
        let counter = attempts.clone();
        let successes = n
            .run_light_ping(move |_peer| {
                let counter = counter.clone();
                async move {
                    *counter.lock().await += 1;
                    true
                }
            })
            .await;
        assert_eq!(successes, 0);
        assert_eq!(*attempts.lock().await, 0);
    }

    #[tokio::test]
    async fn light_ping_probes_recently_active_ledger_entries() {
        let n = node().await;
        n.start().await.unwrap();
        let peer = Identity::generate().peer_id();
        n.record_connection_state(peer.clone(), "loopback", ConnectionState::Connected).await;

        let successes = n
            .run_light_ping(move |candidate| {
                let expected = peer.clone();
                async move { candidate == expected }
            })
            .await;
        assert_eq!(successes, 1);
    }

    #[cfg(feature = "testing")]
    #[tokio::test]
    async fn transport_event_dispatch_delivers_a_message_and_tracks_reachability() {
        use mesh_net::transport::testing::LoopbackTransport;

        let mut n = node().await;
        n.start().await.unwrap();
        let mut events = n.subscribe();

        let local = LoopbackTransport::new(n.get_identity().peer_id);
        let remote = LoopbackTransport::new(Identity::generate().peer_id());
        local.link(&remote);

        let mut rx = n.register_and_start_transport(local.clone()).await.unwrap();
        let (remote_tx, _remote_rx) = mpsc::unbounded_channel();
        remote.start(remote_tx).await.unwrap();

        n.handle_transport_event(
            "loopback",
            TransportEvent::PeerConnected {
                peer: remote.local_peer_id(),
                info: mesh_net::PeerInfo {
                    id: remote.local_peer_id(),
                    transport_name: "loopback".into(),
                    address_hint: None,
                },
            },
        )
        .await;
        assert_eq!(n.state(), NodeState::Running);
        assert!(n.transports.is_reachable(&remote.local_peer_id()));
        assert!(matches!(events.next().await.unwrap(), Event::OnPeerConnected { .. }));

        remote.connect(&local.local_peer_id()).await.unwrap();
        let sender = Identity::generate();
        let frame = {
            let mut header =
                MessageHeader::new(MessageType::Text, n.config.relay.default_ttl, n.now_ms(), sender.public);
            header.signature = sender.sign(&signing_bytes(&header, b"hi there"));
            mesh_wire::encode_frame(&header, b"hi there")
        };
        remote.send(&local.local_peer_id(), &frame).await.unwrap();
        let event = rx.recv().await.unwrap();
        n.handle_transport_event("loopback", event).await;

        let received = events.next().await.unwrap();
        assert!(matches!(received, Event::OnMessage { payload, .. } if payload == b"hi there"));
    }
}
