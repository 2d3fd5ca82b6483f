//! Single-owner engine actor
//!
//! One task owns the `TelemetryEngine` and multiplexes backend events, frame
//! fetch completions, the periodic tick and view commands in one `select!`
//! loop. Engine state is only touched from this task. Views talk to it
//! through an `EngineHandle` and read owned snapshots.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::core::{
    Backend, BackendError, BackendEvent, Channel, ColorMode, EngineSnapshot, FrameUpdate,
    TelemetryEngine, TrackChange, Universe, UpdateKind, DASHBOARD_CELLS,
};
use crate::time::now_millis;

/// Capacity of the view command queue
const COMMAND_QUEUE: usize = 64;

/// Requests from views to the engine actor
pub enum EngineCommand {
    SelectUniverse(Universe),
    Track(Channel, oneshot::Sender<TrackChange>),
    Untrack(Channel),
    SetColorMode(ColorMode),
    SetColorblind(bool),
    Snapshot(oneshot::Sender<EngineSnapshot>),
    Dashboard(oneshot::Sender<Vec<(Universe, [f32; DASHBOARD_CELLS])>>),
    Shutdown,
}

/// Cloneable handle to a running engine actor.
///
/// Every method returns `None`/`false` once the actor has stopped.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineCommand>,
}

impl EngineHandle {
    pub async fn select_universe(&self, universe: Universe) -> bool {
        self.send(EngineCommand::SelectUniverse(universe)).await
    }

    /// Toggle tracking of a channel
    pub async fn track(&self, channel: Channel) -> Option<TrackChange> {
        let (reply, rx) = oneshot::channel();
        if !self.send(EngineCommand::Track(channel, reply)).await {
            return None;
        }
        rx.await.ok()
    }

    pub async fn untrack(&self, channel: Channel) -> bool {
        self.send(EngineCommand::Untrack(channel)).await
    }

    pub async fn set_color_mode(&self, mode: ColorMode) -> bool {
        self.send(EngineCommand::SetColorMode(mode)).await
    }

    pub async fn set_colorblind(&self, colorblind: bool) -> bool {
        self.send(EngineCommand::SetColorblind(colorblind)).await
    }

    pub async fn snapshot(&self) -> Option<EngineSnapshot> {
        let (reply, rx) = oneshot::channel();
        if !self.send(EngineCommand::Snapshot(reply)).await {
            return None;
        }
        rx.await.ok()
    }

    pub async fn dashboard(&self) -> Option<Vec<(Universe, [f32; DASHBOARD_CELLS])>> {
        let (reply, rx) = oneshot::channel();
        if !self.send(EngineCommand::Dashboard(reply)).await {
            return None;
        }
        rx.await.ok()
    }

    pub async fn shutdown(&self) -> bool {
        self.send(EngineCommand::Shutdown).await
    }

    async fn send(&self, cmd: EngineCommand) -> bool {
        self.tx.send(cmd).await.is_ok()
    }
}

/// Start the engine actor on the current tokio runtime.
///
/// The task ends when the event stream closes, every handle is dropped, or
/// `shutdown` is called, and yields the engine back.
pub fn spawn_engine<B: Backend>(
    engine: TelemetryEngine,
    backend: B,
    events: mpsc::Receiver<BackendEvent>,
) -> (EngineHandle, JoinHandle<TelemetryEngine>) {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let task = tokio::spawn(run_engine(engine, backend, events, rx));
    (EngineHandle { tx }, task)
}

/// Completed frame fetch
struct FetchResult {
    universe: Universe,
    sequence: u64,
    kind: UpdateKind,
    result: Result<Option<Vec<u8>>, BackendError>,
}

/// Issues frame fetches, at most one in flight per universe
struct Fetcher<B> {
    backend: B,
    tx: mpsc::UnboundedSender<FetchResult>,
    /// In-flight universes → whether a push arrived meanwhile
    inflight: HashMap<Universe, bool>,
    next_sequence: u64,
}

impl<B: Backend> Fetcher<B> {
    fn request(&mut self, universe: Universe, kind: UpdateKind) {
        if let Some(refetch) = self.inflight.get_mut(&universe) {
            // A poll needs no refetch: the in-flight result is at least as
            // fresh. A push means the backend has newer data than requested.
            if kind == UpdateKind::Push {
                *refetch = true;
            }
            trace!(universe, ?kind, "Fetch already in flight");
            return;
        }

        self.next_sequence += 1;
        let sequence = self.next_sequence;
        self.inflight.insert(universe, false);

        let backend = self.backend.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let result = backend.get_dmx_data(universe).await;
            // Receiver gone means the actor stopped; nothing to do
            let _ = tx.send(FetchResult {
                universe,
                sequence,
                kind,
                result,
            });
        });
    }

    fn complete(&mut self, engine: &mut TelemetryEngine, done: FetchResult) {
        let FetchResult {
            universe,
            sequence,
            kind,
            result,
        } = done;
        let refetch = self.inflight.remove(&universe).unwrap_or(false);

        match result {
            Ok(Some(data)) => {
                let update = FrameUpdate {
                    universe,
                    data: &data,
                    sequence: Some(sequence),
                    kind,
                };
                let outcome = engine.apply_frame_update(update, now_millis());
                trace!(universe, sequence, ?outcome, "Fetch applied");
            }
            Ok(None) => debug!(universe, "Backend has no data for universe"),
            Err(e) => warn!(universe, error = %e, "Frame fetch failed, keeping last-known state"),
        }

        if refetch {
            self.request(universe, UpdateKind::Push);
        }
    }
}

/// Actor loop; see `spawn_engine`
pub async fn run_engine<B: Backend>(
    mut engine: TelemetryEngine,
    backend: B,
    mut events: mpsc::Receiver<BackendEvent>,
    mut commands: mpsc::Receiver<EngineCommand>,
) -> TelemetryEngine {
    let (fetch_tx, mut fetch_rx) = mpsc::unbounded_channel();
    let mut fetcher = Fetcher {
        backend,
        tx: fetch_tx,
        inflight: HashMap::new(),
        next_sequence: 0,
    };

    let period = Duration::from_millis(engine.config().tick_interval_ms.max(1));
    let mut tick = tokio::time::interval(period);
    tick.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(tick_ms = period.as_millis() as u64, "Engine actor started");

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(BackendEvent::DmxUpdated(notice)) => {
                    engine.record_packet(notice.universe, now_millis());
                    fetcher.request(notice.universe, UpdateKind::Push);
                }
                Some(event) => engine.handle_event(event, now_millis()),
                None => {
                    info!("Backend event stream closed");
                    break;
                }
            },
            Some(done) = fetch_rx.recv() => fetcher.complete(&mut engine, done),
            _ = tick.tick() => {
                engine.tick(now_millis());
                if engine.config().poll_selected {
                    if let Some(universe) = engine.selected_universe() {
                        fetcher.request(universe, UpdateKind::Poll);
                    }
                }
            }
            cmd = commands.recv() => match cmd {
                Some(EngineCommand::Shutdown) | None => {
                    info!("Engine actor shutting down");
                    break;
                }
                Some(cmd) => apply_command(&mut engine, cmd),
            },
        }
    }

    engine
}

fn apply_command(engine: &mut TelemetryEngine, cmd: EngineCommand) {
    match cmd {
        EngineCommand::SelectUniverse(universe) => engine.select_universe(universe),
        EngineCommand::Track(channel, reply) => {
            let _ = reply.send(engine.track(channel));
        }
        EngineCommand::Untrack(channel) => {
            engine.untrack(channel);
        }
        EngineCommand::SetColorMode(mode) => engine.set_color_mode(mode),
        EngineCommand::SetColorblind(colorblind) => engine.set_colorblind(colorblind),
        EngineCommand::Snapshot(reply) => {
            let _ = reply.send(engine.snapshot(now_millis()));
        }
        EngineCommand::Dashboard(reply) => {
            let _ = reply.send(engine.dashboard());
        }
        EngineCommand::Shutdown => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DmxNotice, EngineConfig, MemoryBackend, Protocol, Source};

    fn notice(universe: Universe) -> BackendEvent {
        BackendEvent::DmxUpdated(DmxNotice {
            universe,
            source_ip: None,
            timestamp: None,
        })
    }

    fn sources(universes: &[Universe]) -> BackendEvent {
        BackendEvent::SourcesUpdated(vec![Source::new("console", "10.0.0.5", Protocol::ArtNet)
            .with_universes(universes.iter().copied())])
    }

    fn frame_with(channel: Channel, value: u8) -> Vec<u8> {
        let mut data = vec![0u8; 512];
        data[channel as usize - 1] = value;
        data
    }

    async fn wait_for(handle: &EngineHandle, f: impl Fn(&EngineSnapshot) -> bool) -> EngineSnapshot {
        for _ in 0..400 {
            if let Some(snap) = handle.snapshot().await {
                if f(&snap) {
                    return snap;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("engine never reached expected state");
    }

    #[tokio::test]
    async fn test_push_notification_fetches_frame() {
        let backend = MemoryBackend::new();
        backend.set_frame(1, frame_with(50, 128));

        let (event_tx, event_rx) = mpsc::channel(16);
        let (handle, task) = spawn_engine(TelemetryEngine::default(), backend, event_rx);

        event_tx.send(sources(&[1])).await.unwrap();
        event_tx.send(notice(1)).await.unwrap();

        let snap = wait_for(&handle, |s| s.frame.is_some()).await;
        assert_eq!(snap.selected_universe, Some(1));
        assert_eq!(snap.frame.as_ref().and_then(|f| f.channel(50)), Some(128));
        assert_eq!(snap.stats.map(|s| s.packet_count), Some(1));

        assert!(handle.shutdown().await);
        let engine = task.await.unwrap();
        assert_eq!(engine.get_history(50).map(|h| h.last_value), Some(128));
        assert!(engine.get_activity(50).unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_transport_failure_keeps_stale_state() {
        let backend = MemoryBackend::new();
        backend.set_frame(1, frame_with(1, 10));
        backend.fail_next(1);

        let (event_tx, event_rx) = mpsc::channel(16);
        let (handle, task) = spawn_engine(TelemetryEngine::default(), backend.clone(), event_rx);

        event_tx.send(sources(&[1])).await.unwrap();
        event_tx.send(notice(1)).await.unwrap();
        wait_for(&handle, |s| s.total_packets == 1).await;

        // Failed fetch leaves no frame; the next notification retries
        event_tx.send(notice(1)).await.unwrap();
        let snap = wait_for(&handle, |s| s.frame.is_some()).await;
        assert_eq!(snap.frame.and_then(|f| f.channel(1)), Some(10));
        assert_eq!(snap.total_packets, 2);

        drop(event_tx);
        let engine = task.await.unwrap();
        assert_eq!(engine.get_universe_stats(1).map(|s| s.packet_count), Some(2));
    }

    #[tokio::test]
    async fn test_unselected_universe_only_stored() {
        let backend = MemoryBackend::new();
        backend.set_frame(2, frame_with(7, 200));

        let (event_tx, event_rx) = mpsc::channel(16);
        let (handle, task) = spawn_engine(TelemetryEngine::default(), backend, event_rx);

        assert!(handle.select_universe(1).await);
        event_tx.send(notice(2)).await.unwrap();

        for _ in 0..400 {
            let dash = handle.dashboard().await.unwrap();
            if !dash.is_empty() {
                assert_eq!(dash[0].0, 2);
                assert_eq!(dash[0].1[1], 50.0);
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        assert!(handle.shutdown().await);
        let engine = task.await.unwrap();
        assert_eq!(engine.selected_universe(), Some(1));
        assert_eq!(engine.get_frame(2).and_then(|f| f.channel(7)), Some(200));
        assert!(engine.get_history(7).is_none());
    }

    #[tokio::test]
    async fn test_commands_reach_engine() {
        let (_event_tx, event_rx) = mpsc::channel(16);
        let (handle, task) =
            spawn_engine(TelemetryEngine::default(), MemoryBackend::new(), event_rx);

        assert_eq!(handle.track(3).await, Some(TrackChange::Tracked { evicted: None }));
        assert_eq!(handle.track(3).await, Some(TrackChange::Untracked));
        assert_eq!(handle.track(9).await, Some(TrackChange::Tracked { evicted: None }));
        assert!(handle.set_color_mode(ColorMode::Unused).await);
        assert!(handle.set_colorblind(true).await);
        assert!(handle.untrack(9).await);

        let snap = handle.snapshot().await.unwrap();
        assert!(snap.tracked.is_empty());
        assert_eq!(snap.color_mode, ColorMode::Unused);
        assert!(snap.colorblind);

        handle.shutdown().await;
        task.await.unwrap();
        assert!(handle.snapshot().await.is_none());
    }

    #[tokio::test]
    async fn test_poll_selected_fetches_on_tick() {
        let backend = MemoryBackend::new();
        backend.set_frame(4, frame_with(2, 255));

        let config = EngineConfig {
            poll_selected: true,
            selected_universe: Some(4),
            tick_interval_ms: 10,
            ..EngineConfig::default()
        };
        let (_event_tx, event_rx) = mpsc::channel(16);
        let (handle, task) = spawn_engine(TelemetryEngine::new(config), backend, event_rx);

        let snap = wait_for(&handle, |s| s.frame.is_some()).await;
        assert_eq!(snap.frame.as_ref().and_then(|f| f.channel(2)), Some(255));
        // Activity and history land with the polled frame
        assert!(snap.activity(2).unwrap() > 0.0);
        assert_eq!(snap.history(2).map(|h| h.last_value), Some(255));
        // Polling is not a notification
        assert_eq!(snap.total_packets, 0);

        handle.shutdown().await;
        let engine = task.await.unwrap();
        assert!(engine.get_activity(2).unwrap() > 0.0);
    }

    #[tokio::test]
    async fn test_views_read_derived_state() {
        let backend = MemoryBackend::new();
        backend.set_frame(1, frame_with(50, 128));

        let config = EngineConfig {
            tracked_channels: vec![50],
            ..EngineConfig::default()
        };
        let (event_tx, event_rx) = mpsc::channel(16);
        let (handle, task) = spawn_engine(TelemetryEngine::new(config), backend.clone(), event_rx);

        event_tx.send(sources(&[1])).await.unwrap();
        event_tx.send(notice(1)).await.unwrap();

        let snap = wait_for(&handle, |s| s.frame.is_some()).await;
        assert!(snap.activity(50).unwrap() > 0.0);
        assert_eq!(snap.activity(51), Some(0.0));
        assert_eq!(snap.history(50).map(|h| h.last_value), Some(128));
        assert!(snap.history(51).is_none());
        assert_eq!(snap.series(50).map(|points| points[0].value), Some(128));
        assert!(snap.cell_color(50).is_some());
        assert!(snap.cell_color(51).is_none());

        // A second, different frame shows up in the running actor's state
        backend.set_frame(1, frame_with(50, 200));
        event_tx.send(notice(1)).await.unwrap();
        let snap = wait_for(&handle, |s| s.history(50).map(|h| h.last_value) == Some(200)).await;
        assert_eq!(snap.series(50).map(|points| points.len()), Some(2));

        handle.shutdown().await;
        task.await.unwrap();
    }
}
