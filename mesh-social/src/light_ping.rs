//! Light Ping: a periodic, low-cost reachability probe over the Eternal
//! Ledger's recently-active entries. Device-profile configuration resolves
//! to concrete poll/parallelism/interval values; the three variants below
//! are this crate's enumerated reading of that configuration surface
//! (recorded as an Open Question in DESIGN.md).

use std::time::Duration;

use mesh_crypto::PeerId;

use crate::ledger::EternalLedger;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceProfile {
    LowPower,
    Balanced,
    Aggressive,
}

#[derive(Debug, Clone, Copy)]
pub struct LightPingConfig {
    pub enabled: bool,
    pub poll_interval: Duration,
    pub max_parallel_connections: usize,
    pub light_ping_interval: Duration,
    /// Fraction (0.0-1.0) of recently-active ledger entries probed per
    /// sweep; higher on more capable/plugged-in profiles.
    pub aggressiveness: f64,
    /// Window within which a ledger entry counts as "recently active"
    /// and thus eligible for probing.
    pub recently_active_window: Duration,
}

impl DeviceProfile {
    pub fn config(self) -> LightPingConfig {
        match self {
            DeviceProfile::LowPower => LightPingConfig {
                enabled: true,
                poll_interval: Duration::from_secs(300),
                max_parallel_connections: 1,
                light_ping_interval: Duration::from_secs(120),
                aggressiveness: 0.2,
                recently_active_window: Duration::from_secs(3600),
            },
            DeviceProfile::Balanced => LightPingConfig {
                enabled: true,
                poll_interval: Duration::from_secs(60),
                max_parallel_connections: 4,
                light_ping_interval: Duration::from_secs(30),
                aggressiveness: 0.5,
                recently_active_window: Duration::from_secs(3600 * 6),
            },
            DeviceProfile::Aggressive => LightPingConfig {
                enabled: true,
                poll_interval: Duration::from_secs(15),
                max_parallel_connections: 10,
                light_ping_interval: Duration::from_secs(10),
                aggressiveness: 1.0,
                recently_active_window: Duration::from_secs(3600 * 24),
            },
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct LightPingReport {
    pub attempted: usize,
    pub succeeded: usize,
}

/// Selects which recently-active ledger entries to probe this sweep,
/// honoring `config.aggressiveness` and `config.max_parallel_connections`.
/// Pulled out of `run_sweep` so a caller that must dispatch the actual
/// connection attempt asynchronously (outside a plain `FnMut`) can still
/// reuse the same candidate-selection and budget math.
pub fn select_candidates(ledger: &EternalLedger, config: &LightPingConfig, now_ms: u64) -> Vec<PeerId> {
    if ledger.is_empty() || !config.enabled {
        return Vec::new();
    }

    let window_ms = config.recently_active_window.as_millis() as u64;
    let candidates = ledger.recently_active_at(now_ms, window_ms);
    let budget = ((candidates.len() as f64 * config.aggressiveness).ceil() as usize)
        .min(config.max_parallel_connections)
        .max(if candidates.is_empty() { 0 } else { 1 });
    candidates.into_iter().take(budget).map(|n| n.node_id.clone()).collect()
}

/// Runs one light-ping sweep: probe up to `config.max_parallel_connections`
/// of the ledger's most-recently-active nodes via `try_connect`, counting
/// successes. Does nothing if the ledger is empty.
pub fn run_sweep<F>(ledger: &EternalLedger, config: &LightPingConfig, now_ms: u64, mut try_connect: F) -> LightPingReport
where
    F: FnMut(&PeerId) -> bool,
{
    let mut report = LightPingReport::default();
    for node in select_candidates(ledger, config, now_ms) {
        report.attempted += 1;
        if try_connect(&node) {
            report.succeeded += 1;
        }
    }
    report
}
