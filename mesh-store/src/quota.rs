//! Quota manager (C8 sub-component): tracks bytes in use against a budget
//! and classifies status, edge-triggered so a warning is only emitted once
//! per transition rather than on every check.

use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct QuotaConfig {
    pub max_bytes: u64,
    pub warning_ratio: f64,
    pub critical_ratio: f64,
    pub eviction_target_ratio: f64,
    pub check_interval: Duration,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            max_bytes: 524_288_000,
            warning_ratio: 0.8,
            critical_ratio: 0.95,
            eviction_target_ratio: 0.7,
            check_interval: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum QuotaStatus {
    Ok,
    Warning,
    Critical,
    Full,
}

pub struct QuotaManager {
    config: QuotaConfig,
    used_bytes: u64,
    last_status: QuotaStatus,
}

impl QuotaManager {
    pub fn new(config: QuotaConfig) -> Self {
        Self {
            config,
            used_bytes: 0,
            last_status: QuotaStatus::Ok,
        }
    }

    pub fn config(&self) -> &QuotaConfig {
        &self.config
    }

    pub fn used_bytes(&self) -> u64 {
        self.used_bytes
    }

    pub fn eviction_target_bytes(&self) -> u64 {
        (self.config.max_bytes as f64 * self.config.eviction_target_ratio) as u64
    }

    fn status_for(&self, used: u64) -> QuotaStatus {
        if used >= self.config.max_bytes {
            QuotaStatus::Full
        } else {
            let ratio = used as f64 / self.config.max_bytes as f64;
            if ratio >= self.config.critical_ratio {
                QuotaStatus::Critical
            } else if ratio >= self.config.warning_ratio {
                QuotaStatus::Warning
            } else {
                QuotaStatus::Ok
            }
        }
    }

    pub fn status(&self) -> QuotaStatus {
        self.status_for(self.used_bytes)
    }

    /// `ensure_room` reports whether admitting `additional_bytes` would
    /// exceed the hard cap; it does not itself evict — the caller runs
    /// eviction first if status is CRITICAL/FULL and re-checks.
    pub fn has_room_for(&self, additional_bytes: u64) -> bool {
        self.used_bytes.saturating_add(additional_bytes) <= self.config.max_bytes
    }

    pub fn record_added(&mut self, bytes: u64) {
        self.used_bytes = self.used_bytes.saturating_add(bytes);
    }

    pub fn record_removed(&mut self, bytes: u64) {
        self.used_bytes = self.used_bytes.saturating_sub(bytes);
    }

    /// Returns `Some(status)` exactly once per status transition — an
    /// edge-triggered warning event rather than a repeated one.
    pub fn poll_transition(&mut self) -> Option<QuotaStatus> {
        let current = self.status();
        if current != self.last_status {
            self.last_status = current;
            Some(current)
        } else {
            None
        }
    }
}

impl Default for QuotaManager {
    fn default() -> Self {
        Self::new(QuotaConfig::default())
    }
}
