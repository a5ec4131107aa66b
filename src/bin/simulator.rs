//! Headless simulation run.
//!
//! Seeds a hub-and-spokes network, lets it self-organize for a bounded
//! time, then cancels cleanly and prints a per-node report.

use std::time::Duration;

use gravnet::node::NodeKind;
use gravnet::payload::PayloadValue;
use gravnet::registry::{NodeOverrides, Registry};
use gravnet::telemetry::{self, LogDestination};
use gravnet::Vec3;

/// Configuration for the demo run.
#[derive(Debug, Clone)]
struct SimConfig {
    blocks: usize,
    points: usize,
    run_secs: u64,
    tick_interval: f64,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            blocks: 6,
            points: 3,
            run_secs: 10,
            tick_interval: 0.5,
        }
    }
}

impl SimConfig {
    /// `simulator [blocks] [points] [run_secs]`
    fn from_args() -> Self {
        let mut config = Self::default();
        let args: Vec<String> = std::env::args().skip(1).collect();
        if let Some(n) = args.first().and_then(|a| a.parse().ok()) {
            config.blocks = n;
        }
        if let Some(n) = args.get(1).and_then(|a| a.parse().ok()) {
            config.points = n;
        }
        if let Some(n) = args.get(2).and_then(|a| a.parse().ok()) {
            config.run_secs = n;
        }
        config
    }
}

#[tokio::main]
async fn main() {
    let _guard = telemetry::init(LogDestination::from_env());
    let config = SimConfig::from_args();
    tracing::info!(?config, "simulation starting");

    let registry = Registry::with_scheduler();
    let overrides = NodeOverrides {
        tick_interval: Some(config.tick_interval),
        ..NodeOverrides::default()
    };

    // One anchored hub at the origin, blocks on a ring around it, points
    // scattered close by.
    registry
        .create(
            NodeKind::Sphere,
            PayloadValue::Text("hub".into()),
            Some(Vec3::zero()),
            overrides.clone(),
        )
        .await
        .expect("sphere creation");

    for i in 0..config.blocks {
        let angle = i as f64 / config.blocks as f64 * std::f64::consts::TAU;
        registry
            .create(
                NodeKind::Block,
                PayloadValue::Text("block data".into()),
                Some(Vec3::new(4.0 * angle.cos(), 4.0 * angle.sin(), 1.0)),
                overrides.clone(),
            )
            .await
            .expect("block creation");
    }
    for i in 0..config.points {
        registry
            .create(
                NodeKind::Point,
                PayloadValue::Text("point data".into()),
                Some(Vec3::new(1.0 + i as f64 * 0.5, 0.5, -1.0)),
                overrides.clone(),
            )
            .await
            .expect("point creation");
    }

    tokio::time::sleep(Duration::from_secs(config.run_secs)).await;

    let leaked = registry
        .cancel_all(Duration::from_secs_f64(config.tick_interval * 2.0 + 1.0))
        .await;

    println!("=== Simulation Report ===");
    let core = registry.core.read().await;
    for node in core.iter() {
        println!(
            "node {:>3} {:<6} pos={} gravity={:.3} neighbors={:?} attempts={} addr={}",
            node.id,
            node.kind.as_str(),
            node.pos,
            node.gravity,
            node.neighbors,
            node.attempts,
            &node.addr[..8],
        );
        println!("         snapshots={}", node.history.len());
    }
    println!("nodes: {}  leaked tasks: {}", core.len(), leaked);
}
