//! Store-and-forward engine (C8): a durable `id -> StoredMessage` mapping
//! with secondary indexes by recipient, priority, status, and own-message
//! flag, a quota-aware admission path, and a strict priority/age-based
//! eviction order.
//!
//! Writes are atomic per message: every mutating operation takes the
//! single `RwLock` write guard for its whole duration, so two concurrent
//! admissions can never both "succeed" past a quota check that only one
//! of them should have passed.

use std::collections::{HashMap, HashSet};

use mesh_crypto::PeerId;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::quota::{QuotaConfig, QuotaManager, QuotaStatus};
use crate::types::{MessageId, Priority, Status, StoredMessage};

struct Indexes {
    messages: HashMap<MessageId, StoredMessage>,
    by_recipient: HashMap<PeerId, HashSet<MessageId>>,
    by_status: HashMap<Status, HashSet<MessageId>>,
    by_priority: HashMap<Priority, HashSet<MessageId>>,
    by_geo_zone: HashMap<String, HashSet<MessageId>>,
    own_messages: HashSet<MessageId>,
}

impl Indexes {
    fn new() -> Self {
        Self {
            messages: HashMap::new(),
            by_recipient: HashMap::new(),
            by_status: HashMap::new(),
            by_priority: HashMap::new(),
            by_geo_zone: HashMap::new(),
            own_messages: HashSet::new(),
        }
    }

    fn insert(&mut self, msg: StoredMessage) {
        let id = msg.id;
        if let Some(dest) = &msg.destination_id {
            self.by_recipient.entry(dest.clone()).or_default().insert(id);
        }
        self.by_status.entry(msg.status).or_default().insert(id);
        self.by_priority.entry(msg.priority).or_default().insert(id);
        if let Some(zone) = &msg.geo_zone {
            self.by_geo_zone.entry(zone.clone()).or_default().insert(id);
        }
        if msg.is_own_message {
            self.own_messages.insert(id);
        }
        self.messages.insert(id, msg);
    }

    fn remove(&mut self, id: &MessageId) -> Option<StoredMessage> {
        let msg = self.messages.remove(id)?;
        if let Some(dest) = &msg.destination_id {
            if let Some(set) = self.by_recipient.get_mut(dest) {
                set.remove(id);
            }
        }
        if let Some(set) = self.by_status.get_mut(&msg.status) {
            set.remove(id);
        }
        if let Some(set) = self.by_priority.get_mut(&msg.priority) {
            set.remove(id);
        }
        if let Some(zone) = &msg.geo_zone {
            if let Some(set) = self.by_geo_zone.get_mut(zone) {
                set.remove(id);
            }
        }
        self.own_messages.remove(id);
        Some(msg)
    }

    fn set_status(&mut self, id: &MessageId, status: Status) -> Result<()> {
        let msg = self.messages.get_mut(id).ok_or(StoreError::NotFound(*id))?;
        if let Some(set) = self.by_status.get_mut(&msg.status) {
            set.remove(id);
        }
        msg.status = status;
        self.by_status.entry(status).or_default().insert(*id);
        Ok(())
    }
}

/// Outcome of a periodic maintenance pass: expired messages pruned,
/// messages evicted under quota pressure, and the quota status transition
/// if one occurred (edge-triggered — fires at most once per pass).
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    pub expired: Vec<MessageId>,
    pub evicted: Vec<MessageId>,
    pub quota_transition: Option<QuotaStatus>,
}

pub struct Store {
    indexes: RwLock<Indexes>,
    quota: RwLock<QuotaManager>,
}

impl Store {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            indexes: RwLock::new(Indexes::new()),
            quota: RwLock::new(QuotaManager::new(config)),
        }
    }

    pub async fn quota_status(&self) -> QuotaStatus {
        self.quota.read().await.status()
    }

    pub async fn used_bytes(&self) -> u64 {
        self.quota.read().await.used_bytes()
    }

    /// Admit a message. Runs maintenance first if quota is CRITICAL/FULL
    /// to try to free room, then re-checks. On failure, own messages that
    /// must not be silently dropped surface `MustRetain` instead of the
    /// generic `QuotaExceeded`.
    pub async fn store_at(&self, msg: StoredMessage, now_ms: u64) -> Result<MessageId> {
        let id = msg.id;
        let size = msg.size_bytes;
        let is_own = msg.is_own_message;

        {
            let status = self.quota.read().await.status();
            if matches!(status, QuotaStatus::Critical | QuotaStatus::Full) {
                self.run_maintenance_at(now_ms).await;
            }
        }

        let mut quota = self.quota.write().await;
        if !quota.has_room_for(size) {
            let used = quota.used_bytes();
            let max = quota.config().max_bytes;
            return if is_own {
                Err(StoreError::MustRetain)
            } else {
                Err(StoreError::QuotaExceeded { used, max })
            };
        }
        quota.record_added(size);
        drop(quota);

        self.indexes.write().await.insert(msg);
        info!(id = %id, size, "message admitted to store-and-forward");
        Ok(id)
    }

    pub async fn get(&self, id: &MessageId) -> Option<StoredMessage> {
        self.indexes.read().await.messages.get(id).cloned()
    }

    pub async fn set_status_at(&self, id: &MessageId, status: Status, now_ms: u64) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        indexes.set_status(id, status)?;
        if status == Status::Delivered {
            if let Some(msg) = indexes.messages.get_mut(id) {
                msg.delivered_at_ms = Some(now_ms);
            }
        }
        Ok(())
    }

    pub async fn record_attempt(&self, id: &MessageId, peer: PeerId) -> Result<()> {
        let mut indexes = self.indexes.write().await;
        let msg = indexes.messages.get_mut(id).ok_or(StoreError::NotFound(*id))?;
        msg.attempts += 1;
        msg.route_attempts.insert(peer);
        Ok(())
    }

    /// Messages pending delivery to `peer`: every stored message where
    /// `recipient == peer && status == PENDING`, for the delivery loop to
    /// hand off once that peer becomes reachable.
    pub async fn pending_for(&self, peer: &PeerId) -> Vec<StoredMessage> {
        let indexes = self.indexes.read().await;
        let Some(ids) = indexes.by_recipient.get(peer) else {
            return Vec::new();
        };
        let pending = indexes.by_status.get(&Status::Pending);
        ids.iter()
            .filter(|id| pending.map_or(false, |p| p.contains(*id)))
            .filter_map(|id| indexes.messages.get(id).cloned())
            .collect()
    }

    pub async fn by_status(&self, status: Status) -> Vec<StoredMessage> {
        let indexes = self.indexes.read().await;
        indexes
            .by_status
            .get(&status)
            .into_iter()
            .flatten()
            .filter_map(|id| indexes.messages.get(id).cloned())
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.indexes.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Remove every message whose `expires_at_ms` has passed, oldest
    /// expiry first, regardless of priority or ownership.
    async fn prune_expired_at(&self, now_ms: u64) -> Vec<MessageId> {
        let mut indexes = self.indexes.write().await;
        let mut expired: Vec<(u64, MessageId)> = indexes
            .messages
            .values()
            .filter(|m| m.is_expired_at(now_ms))
            .map(|m| (m.expires_at_ms, m.id))
            .collect();
        expired.sort_by_key(|(expiry, _)| *expiry);

        let mut removed = Vec::with_capacity(expired.len());
        let mut freed = 0u64;
        for (_, id) in expired {
            if let Some(msg) = indexes.remove(&id) {
                freed += msg.size_bytes;
                removed.push(id);
            }
        }
        drop(indexes);
        if freed > 0 {
            self.quota.write().await.record_removed(freed);
        }
        removed
    }

    /// Evict by priority class (LOW, NORMAL, HIGH, EMERGENCY, oldest
    /// first within each) until usage is at or below the eviction target,
    /// skipping own messages not yet delivered/expired.
    async fn evict_to_target_at(&self, now_ms: u64) -> Vec<MessageId> {
        let target = self.quota.read().await.eviction_target_bytes();
        let mut removed = Vec::new();

        for priority in [Priority::Low, Priority::Normal, Priority::High, Priority::Emergency] {
            loop {
                if self.quota.read().await.used_bytes() <= target {
                    return removed;
                }
                let mut indexes = self.indexes.write().await;
                let candidate = indexes
                    .by_priority
                    .get(&priority)
                    .into_iter()
                    .flatten()
                    .filter_map(|id| indexes.messages.get(id))
                    .filter(|m| !m.is_expired_at(now_ms) && m.evictable_while_undelivered())
                    .min_by_key(|m| m.created_at_ms)
                    .map(|m| m.id);

                let Some(id) = candidate else {
                    break;
                };
                let msg = indexes.remove(&id).expect("candidate came from the index");
                drop(indexes);
                self.quota.write().await.record_removed(msg.size_bytes);
                removed.push(id);
                warn!(id = %id, priority = ?priority, "evicted message under quota pressure");
            }
        }
        removed
    }

    /// The periodic task of prune expired messages, and when
    /// CRITICAL or FULL, evict down to the eviction target. Returns a
    /// single edge-triggered quota transition if one occurred.
    pub async fn run_maintenance_at(&self, now_ms: u64) -> MaintenanceReport {
        let expired = self.prune_expired_at(now_ms).await;

        let status = self.quota.read().await.status();
        let evicted = if matches!(status, QuotaStatus::Critical | QuotaStatus::Full) {
            self.evict_to_target_at(now_ms).await
        } else {
            Vec::new()
        };

        let quota_transition = self.quota.write().await.poll_transition();
        MaintenanceReport {
            expired,
            evicted,
            quota_transition,
        }
    }
}
