//! Mesh node binary: loads configuration, brings up a `MeshNode`, and runs
//! until interrupted.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use mesh_node::{CliArgs, InMemoryKeyStore, MeshNode, NodeConfig, SystemClock};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let filter = args
        .log_level
        .clone()
        .map(tracing_subscriber::EnvFilter::new)
        .or_else(|| tracing_subscriber::EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!(version = mesh_node::VERSION, "starting mesh node");

    let mut config = NodeConfig::load(args.config.as_deref())?;
    config.apply_cli(&args);

    let key_store = InMemoryKeyStore::new();
    let node = Arc::new(MeshNode::new(config, &key_store, Arc::new(SystemClock)).await?);
    node.start().await?;
    info!(peer_id = %node.get_identity().peer_id, "mesh node is running, press ctrl-c to stop");

    let cadence = spawn_cadence_tasks(node.clone());

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");
    cadence.iter().for_each(|h| h.abort());
    node.stop().await?;
    info!("mesh node shutdown complete");

    Ok(())
}

/// This binary owns the cadence for every tick-driven subsystem itself —
/// `MeshNode` never spawns its own background tasks, so a host that never
/// drives these would have a node that accepts `send()` calls but never
/// actually dequeues, sweeps, or expires anything.
fn spawn_cadence_tasks(node: Arc<MeshNode>) -> Vec<tokio::task::JoinHandle<()>> {
    let mut handles = Vec::new();

    {
        let node = node.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_millis(100));
            loop {
                ticker.tick().await;
                while node.pump_scheduler_at(std::time::Instant::now()).await.is_some() {}
            }
        }));
    }
    {
        let node = node.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(30));
            loop {
                ticker.tick().await;
                node.run_dedup_sweep();
                node.prune_stale_routes();
                node.check_heartbeats_at(std::time::Instant::now());
            }
        }));
    }
    {
        let node = node.clone();
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
            loop {
                ticker.tick().await;
                let report = node.run_store_maintenance().await;
                if !report.expired.is_empty() || !report.evicted.is_empty() {
                    info!(expired = report.expired.len(), evicted = report.evicted.len(), "store maintenance ran");
                }
            }
        }));
    }

    handles
}
