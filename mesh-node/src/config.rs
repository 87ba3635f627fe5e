//! Node configuration: every tunable knob the mesh node exposes, loaded
//! with defaults first, then an optional TOML file, then environment
//! variable overrides.

use std::path::{Path, PathBuf};

use clap::Parser;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{MeshError, Result};

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct DedupConfig {
    pub window_ms: u64,
    pub capacity: usize,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self { window_ms: 300_000, capacity: 10_000 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub default_ttl: u8,
    pub max_ttl: u8,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self { default_ttl: 64, max_ttl: 255 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct MessageConfig {
    pub max_payload_bytes: usize,
    pub max_skew_future_ms: u64,
    pub max_skew_past_ms: u64,
    /// How long an own outbound message stays in the durable store
    /// awaiting delivery before it expires, so `MeshNode::send` has a
    /// sensible default instead of inventing one inline.
    pub default_store_ttl_ms: u64,
}

impl Default for MessageConfig {
    fn default() -> Self {
        Self {
            max_payload_bytes: 1_048_576,
            max_skew_future_ms: 300_000,
            max_skew_past_ms: 172_800_000,
            default_store_ttl_ms: 86_400_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub bandwidth_bytes_per_sec: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { bandwidth_bytes_per_sec: 1_048_576 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub max_bytes: u64,
    pub warning_ratio: f64,
    pub critical_ratio: f64,
    pub eviction_target_ratio: f64,
    pub check_interval_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_bytes: 524_288_000,
            warning_ratio: 0.8,
            critical_ratio: 0.95,
            eviction_target_ratio: 0.7,
            check_interval_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub connect_timeout_ms: u64,
    pub send_retry_max: u32,
    pub send_retry_delay_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { connect_timeout_ms: 30_000, send_retry_max: 3, send_retry_delay_ms: 1_000 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    pub interval_ms: u64,
    pub missed_threshold: u32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval_ms: 15_000, missed_threshold: 3 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct InviteConfig {
    pub default_ttl_ms: u64,
    pub share_max_skew_ms: u64,
}

impl Default for InviteConfig {
    fn default() -> Self {
        Self { default_ttl_ms: 604_800_000, share_max_skew_ms: 300_000 }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct SilentMeshConfig {
    pub light_ping_enabled: bool,
    pub light_ping_interval_ms: u64,
    pub max_parallel_connections: usize,
}

impl Default for SilentMeshConfig {
    fn default() -> Self {
        Self {
            light_ping_enabled: true,
            light_ping_interval_ms: 30_000,
            max_parallel_connections: 4,
        }
    }
}

/// The full configuration surface for a node, deserialized from TOML and
/// overridable by environment variables prefixed `MESH_`. CLI flags are
/// applied last, on top of whatever this loads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    pub data_dir: Option<PathBuf>,
    pub log_level: Option<String>,
    pub dedup: DedupConfig,
    pub relay: RelayConfig,
    pub message: MessageConfig,
    pub scheduler: SchedulerConfig,
    pub store: StoreConfig,
    pub transport: TransportConfig,
    pub heartbeat: HeartbeatConfig,
    pub invite: InviteConfig,
    pub silentmesh: SilentMeshConfig,
}

impl NodeConfig {
    /// Loads defaults, layers a TOML file if present, then layers
    /// `MESH_`-prefixed environment variables. CLI overrides are applied
    /// last, by the caller, via `apply_cli`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&NodeConfig::default())?);

        if let Some(path) = path {
            if path.exists() {
                builder = builder.add_source(config::File::from(path));
            }
        }

        builder = builder.add_source(config::Environment::with_prefix("MESH").separator("__"));

        let built = builder.build()?;
        let mut cfg: NodeConfig = built.try_deserialize()?;
        if cfg.data_dir.is_none() {
            cfg.data_dir = dirs::data_dir().map(|d| d.join("mesh-node"));
        }
        cfg.validate()?;
        info!(max_payload_bytes = cfg.message.max_payload_bytes, default_ttl = cfg.relay.default_ttl, "node configuration loaded");
        Ok(cfg)
    }

    fn validate(&self) -> Result<()> {
        if self.relay.default_ttl > self.relay.max_ttl {
            return Err(MeshError::Configuration(
                "relay.default_ttl must not exceed relay.max_ttl".into(),
            ));
        }
        if self.store.warning_ratio >= self.store.critical_ratio {
            return Err(MeshError::Configuration(
                "store.warning_ratio must be less than store.critical_ratio".into(),
            ));
        }
        Ok(())
    }

    pub fn apply_cli(&mut self, args: &CliArgs) {
        if let Some(dir) = &args.data_dir {
            self.data_dir = Some(dir.clone());
        }
        if let Some(level) = &args.log_level {
            self.log_level = Some(level.clone());
        }
    }
}

/// CLI flags accepted by the `mesh-node` binary: config path, data dir,
/// log level.
#[derive(Debug, Parser)]
#[command(name = "mesh-node", about = "Serverless end-to-end encrypted mesh messaging node")]
pub struct CliArgs {
    /// Path to a TOML configuration file.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory for persisted identity and durable store data.
    #[arg(long, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log level filter (e.g. "info", "debug", "mesh_net=trace").
    #[arg(long)]
    pub log_level: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_satisfy_validation() {
        let cfg = NodeConfig::default();
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn default_ttl_above_max_ttl_is_rejected() {
        let mut cfg = NodeConfig::default();
        cfg.relay.default_ttl = 200;
        cfg.relay.max_ttl = 100;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn load_with_missing_file_falls_back_to_defaults() {
        let cfg = NodeConfig::load(Some(Path::new("/nonexistent/mesh-node.toml"))).unwrap();
        assert_eq!(cfg.relay.default_ttl, 64);
    }

    #[test]
    fn load_layers_an_actual_file_over_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mesh-node.toml");
        std::fs::write(&path, "[relay]\ndefault_ttl = 32\n").unwrap();

        let cfg = NodeConfig::load(Some(&path)).unwrap();
        assert_eq!(cfg.relay.default_ttl, 32);
        // Untouched tables still take their defaults.
        assert_eq!(cfg.relay.max_ttl, 255);
        assert_eq!(cfg.store.max_bytes, 524_288_000);
    }
}
