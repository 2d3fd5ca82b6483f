//! Owned state container for all telemetry state
//!
//! Every mutation goes through `TelemetryEngine`'s methods. Callers supply
//! timestamps, so the engine is deterministic and can be driven from a test,
//! a replay, or the async runtime alike.

use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info, trace, warn};

use super::activity::{ActivityEstimator, UpdateKind};
use super::aggregator::{Freshness, SourceAggregator, UniverseStats, UniverseSummary};
use super::color::{resolve_color, CellColor, ColorInputs, ColorMode};
use super::config::EngineConfig;
use super::downsample::{downsample, DASHBOARD_CELLS};
use super::frame::{Frame, FrameStore};
use super::history::{ChannelHistory, ChannelHistoryEntry};
use super::parser::BackendEvent;
use super::source::{Channel, Millis, Source, Universe, CHANNELS_PER_UNIVERSE};
use super::timeseries::{TimeSeriesBuffer, TimeSeriesPoint, TrackChange};

/// A fetched frame ready to apply
#[derive(Debug, Clone, Copy)]
pub struct FrameUpdate<'a> {
    pub universe: Universe,
    pub data: &'a [u8],
    /// Fetch sequence; when set, older results than the stored one are dropped
    pub sequence: Option<u64>,
    pub kind: UpdateKind,
}

/// What `apply_frame_update` did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// Stored and fed to history/activity/time series
    Applied,
    /// Stored only; the universe is not selected
    Stored,
    /// Dropped: a newer fetch was already applied
    Stale,
}

/// Samples of one tracked channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedSeries {
    pub channel: Channel,
    pub points: Vec<TimeSeriesPoint>,
}

/// Owned copy of the state views need, safe to hand to another thread.
///
/// Per-channel tables hold 512 entries indexed by `channel - 1` and describe
/// the selected universe.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineSnapshot {
    pub selected_universe: Option<Universe>,
    pub universes: Vec<Universe>,
    pub duplicate_universes: Vec<Universe>,
    pub sources: Vec<Source>,
    pub color_mode: ColorMode,
    pub colorblind: bool,
    pub frame: Option<Frame>,
    pub stats: Option<UniverseSummary>,
    pub freshness: Option<Freshness>,
    pub tracked: Vec<Channel>,
    /// Oldest tracked channel first
    pub series: Vec<TrackedSeries>,
    pub activity: Vec<f32>,
    pub history: Vec<Option<ChannelHistoryEntry>>,
    /// Resolved under the snapshot's color mode at `taken_at`
    pub cell_colors: Vec<Option<CellColor>>,
    pub total_packets: u64,
    pub taken_at: Millis,
}

impl EngineSnapshot {
    pub fn activity(&self, channel: Channel) -> Option<f32> {
        let idx = (channel as usize).checked_sub(1)?;
        self.activity.get(idx).copied()
    }

    pub fn history(&self, channel: Channel) -> Option<ChannelHistoryEntry> {
        let idx = (channel as usize).checked_sub(1)?;
        self.history.get(idx).copied().flatten()
    }

    pub fn cell_color(&self, channel: Channel) -> Option<CellColor> {
        let idx = (channel as usize).checked_sub(1)?;
        self.cell_colors.get(idx).copied().flatten()
    }

    /// Samples of a tracked channel, `None` if untracked
    pub fn series(&self, channel: Channel) -> Option<&[TimeSeriesPoint]> {
        self.series
            .iter()
            .find(|s| s.channel == channel)
            .map(|s| s.points.as_slice())
    }
}

pub struct TelemetryEngine {
    config: EngineConfig,
    frames: FrameStore,
    history: ChannelHistory,
    activity: ActivityEstimator,
    series: TimeSeriesBuffer,
    aggregator: SourceAggregator,
    selected: Option<Universe>,
}

impl TelemetryEngine {
    pub fn new(config: EngineConfig) -> Self {
        let mut series = TimeSeriesBuffer::new(config.max_tracked, config.window_ms());
        for &channel in &config.tracked_channels {
            if series.is_tracked(channel) {
                continue;
            }
            series.toggle(channel);
        }

        info!(
            window_seconds = config.window_seconds,
            max_tracked = config.max_tracked,
            tracked = series.tracked().len(),
            "Telemetry engine created"
        );

        Self {
            activity: ActivityEstimator::new(config.activity),
            selected: config.selected_universe,
            history: ChannelHistory::new(),
            frames: FrameStore::new(),
            aggregator: SourceAggregator::new(),
            series,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // =========================================================================
    // MUTATION
    // =========================================================================

    /// Apply a pushed backend event. Frame notifications only count the
    /// packet here; fetching the frame is the caller's job.
    pub fn handle_event(&mut self, event: BackendEvent, now: Millis) {
        match event {
            BackendEvent::SourcesUpdated(sources) => self.apply_sources(sources),
            BackendEvent::DmxUpdated(notice) => self.record_packet(notice.universe, now),
        }
    }

    /// Replace the source list; auto-selects a universe if configured
    pub fn apply_sources(&mut self, sources: Vec<Source>) {
        self.aggregator.set_sources(sources);

        if self.selected.is_none() && self.config.auto_select_universe {
            if let Some(&first) = self.aggregator.all_universes().first() {
                self.select_universe(first);
            }
        }
    }

    pub fn record_packet(&mut self, universe: Universe, now: Millis) {
        self.aggregator.record_packet(universe, now);
    }

    /// Store a fetched frame and, for the selected universe, feed it to the
    /// derived stores.
    ///
    /// History, activity and time series are updated together before this
    /// returns, using the decay policy configured for `kind`.
    pub fn apply_frame_update(&mut self, update: FrameUpdate<'_>, now: Millis) -> ApplyOutcome {
        let FrameUpdate {
            universe,
            data,
            sequence,
            kind,
        } = update;

        if data.len() != CHANNELS_PER_UNIVERSE {
            warn!(universe, len = data.len(), "Malformed frame, normalising to 512 channels");
        }
        let frame = Frame::from_slice(data);

        match sequence {
            Some(seq) => {
                if !self.frames.set_frame_ordered(universe, frame, seq) {
                    debug!(universe, seq, "Dropping out-of-order frame");
                    return ApplyOutcome::Stale;
                }
            }
            None => self.frames.set_frame(universe, frame),
        }

        if self.selected != Some(universe) {
            trace!(universe, "Frame stored for unselected universe");
            return ApplyOutcome::Stored;
        }

        let Some(frame) = self.frames.get_frame(universe) else {
            return ApplyOutcome::Stored;
        };
        self.history.observe(frame, now);
        self.activity.update(frame, kind);
        self.series.append_frame(frame, now);

        trace!(universe, ?kind, lit = frame.lit_count(), "Frame applied");
        ApplyOutcome::Applied
    }

    /// Periodic tick: one `Poll` step against the last-known frame of the
    /// selected universe, then prune samples. The frame is already the
    /// activity baseline once applied, so this decays unless a universe
    /// switch seeded a different one; without a frame it is pure decay.
    pub fn tick(&mut self, now: Millis) {
        match self.selected.and_then(|u| self.frames.get_frame(u)) {
            Some(frame) => {
                self.activity.update(frame, UpdateKind::Poll);
            }
            None => self.activity.decay(),
        }
        self.series.prune(now);
    }

    /// Switch the universe whose channels feed history, activity and time
    /// series. Derived state from the previous universe is discarded; the
    /// tracked channel set is kept.
    pub fn select_universe(&mut self, universe: Universe) {
        if self.selected == Some(universe) {
            return;
        }
        debug!(from = ?self.selected, to = universe, "Selected universe changed");

        self.selected = Some(universe);
        self.history.clear();
        self.activity.reset();
        self.series.clear_samples();
        if let Some(frame) = self.frames.get_frame(universe) {
            self.activity.seed_baseline(frame);
        }
    }

    /// Toggle tracking of a channel; an 11th channel evicts the oldest
    pub fn track(&mut self, channel: Channel) -> TrackChange {
        let change = self.series.toggle(channel);
        if change == TrackChange::Rejected {
            debug!(channel, "Ignoring track request for invalid channel");
        }
        change
    }

    pub fn untrack(&mut self, channel: Channel) -> bool {
        self.series.untrack(channel)
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        self.config.color_mode = mode;
    }

    pub fn set_colorblind(&mut self, colorblind: bool) {
        self.config.colorblind = colorblind;
    }

    /// Tear down, logging final counters
    pub fn dispose(self) {
        info!(
            universes = self.frames.len(),
            packets = self.aggregator.total_packets(),
            "Telemetry engine disposed"
        );
    }

    // =========================================================================
    // READING
    // =========================================================================

    pub fn selected_universe(&self) -> Option<Universe> {
        self.selected
    }

    pub fn get_frame(&self, universe: Universe) -> Option<&Frame> {
        self.frames.get_frame(universe)
    }

    /// History of a channel in the selected universe
    pub fn get_history(&self, channel: Channel) -> Option<ChannelHistoryEntry> {
        self.history.get(channel)
    }

    /// Activity of a channel in the selected universe
    pub fn get_activity(&self, channel: Channel) -> Option<f32> {
        self.activity.get(channel)
    }

    pub fn get_time_series(&self, channel: Channel) -> Option<&VecDeque<TimeSeriesPoint>> {
        self.series.series(channel)
    }

    pub fn get_universe_stats(&self, universe: Universe) -> Option<UniverseSummary> {
        self.aggregator.stats_for(universe)
    }

    pub fn universe_stats(&self, universe: Universe) -> Option<UniverseStats> {
        self.aggregator.universe_stats(universe)
    }

    pub fn freshness(&self, universe: Universe, now: Millis) -> Freshness {
        self.aggregator.freshness(universe, now)
    }

    pub fn all_universes(&self) -> &[Universe] {
        self.aggregator.all_universes()
    }

    pub fn duplicate_universes(&self) -> &[Universe] {
        self.aggregator.duplicate_universes()
    }

    pub fn source_for(&self, universe: Universe) -> Option<(usize, &Source)> {
        self.aggregator.source_for(universe)
    }

    pub fn tracked_channels(&self) -> Vec<Channel> {
        self.series.tracked()
    }

    /// Color of a channel in the selected universe under the configured mode
    pub fn cell_color(&self, channel: Channel, now: Millis) -> Option<CellColor> {
        let universe = self.selected?;
        let value = self.frames.get_frame(universe)?.channel(channel)?;
        let inputs = ColorInputs {
            history: self.history.get(channel),
            source_index: self.aggregator.source_for(universe).map(|(idx, _)| idx),
            now,
            colorblind: self.config.colorblind,
        };
        resolve_color(self.config.color_mode, value, &inputs)
    }

    /// Downsampled grid for every stored universe, ascending
    pub fn dashboard(&self) -> Vec<(Universe, [f32; DASHBOARD_CELLS])> {
        self.frames
            .universes()
            .into_iter()
            .filter_map(|u| self.frames.get_frame(u).map(|f| (u, downsample(f.as_slice()))))
            .collect()
    }

    pub fn snapshot(&self, now: Millis) -> EngineSnapshot {
        let selected = self.selected;
        EngineSnapshot {
            selected_universe: selected,
            universes: self.aggregator.all_universes().to_vec(),
            duplicate_universes: self.aggregator.duplicate_universes().to_vec(),
            sources: self.aggregator.sources().to_vec(),
            color_mode: self.config.color_mode,
            colorblind: self.config.colorblind,
            frame: selected.and_then(|u| self.frames.get_frame(u).cloned()),
            stats: selected.and_then(|u| self.aggregator.stats_for(u)),
            freshness: selected.map(|u| self.aggregator.freshness(u, now)),
            tracked: self.series.tracked(),
            series: self
                .series
                .tracked()
                .into_iter()
                .map(|channel| TrackedSeries {
                    channel,
                    points: self
                        .series
                        .series(channel)
                        .map(|buf| buf.iter().copied().collect())
                        .unwrap_or_default(),
                })
                .collect(),
            activity: self.activity.scores().to_vec(),
            history: self.history.entries().to_vec(),
            cell_colors: (1..=CHANNELS_PER_UNIVERSE as Channel)
                .map(|channel| self.cell_color(channel, now))
                .collect(),
            total_packets: self.aggregator.total_packets(),
            taken_at: now,
        }
    }
}

impl Default for TelemetryEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}
