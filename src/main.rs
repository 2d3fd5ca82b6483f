//! Standalone CLI monitor for the DMX telemetry engine
//!
//! Run with: cargo run --bin dmx-cli

use std::time::Duration;

use dmx_telemetry::core::config::CONFIG_ENV;
use dmx_telemetry::core::{Backend, EngineConfig, TelemetryEngine};
use dmx_telemetry::runtime::spawn_engine;
use dmx_telemetry::websocket_native::{WsBackend, DEFAULT_WS_URL, WS_URL_ENV};
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,dmx_telemetry=debug"));
    fmt().with_env_filter(filter).with_target(true).init();

    let config = match std::env::var(CONFIG_ENV) {
        Ok(path) => {
            info!(path = %path, "Loading config");
            EngineConfig::load(&path)?
        }
        Err(_) => EngineConfig::default(),
    };

    let url = std::env::var(WS_URL_ENV).unwrap_or_else(|_| DEFAULT_WS_URL.to_string());
    let (backend, events) = WsBackend::connect(&url).await?;

    let mut engine = TelemetryEngine::new(config);
    match backend.get_sources().await {
        Ok(sources) => engine.apply_sources(sources),
        Err(e) => warn!(error = %e, "Initial source fetch failed, waiting for sources-updated"),
    }

    let (handle, task) = spawn_engine(engine, backend.clone(), events);
    let mut stats_interval = tokio::time::interval(Duration::from_secs(5));
    let mut packets_last_interval = 0u64;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Engine running, waiting for DMX...");

    loop {
        tokio::select! {
            _ = stats_interval.tick() => {
                let Some(snap) = handle.snapshot().await else {
                    warn!("Engine stopped");
                    break;
                };
                let delta = snap.total_packets.saturating_sub(packets_last_interval);
                info!(
                    universes = snap.universes.len(),
                    selected = ?snap.selected_universe,
                    packets = snap.total_packets,
                    "/sec" = format!("{:.1}", delta as f64 / 5.0),
                    fps = ?snap.stats.map(|s| s.fps),
                    duplicates = ?snap.duplicate_universes,
                    tracked = ?snap.tracked,
                    backend = backend.state().label(),
                    "stats"
                );
                packets_last_interval = snap.total_packets;
            }
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
        }
    }

    handle.shutdown().await;
    match task.await {
        Ok(engine) => engine.dispose(),
        Err(e) => error!(error = %e, "Engine task failed"),
    }
    Ok(())
}
