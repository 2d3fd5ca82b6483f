//! Time-windowed sample buffers for a small set of user-tracked channels

use serde::Serialize;
use std::collections::{HashMap, VecDeque};
use tracing::{debug, trace, warn};

use super::frame::Frame;
use super::source::{Channel, Millis, CHANNELS_PER_UNIVERSE};

/// Hard limit on simultaneously tracked channels
pub const MAX_TRACKED: usize = 10;

/// One sample of a tracked channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeSeriesPoint {
    pub timestamp: Millis,
    pub value: u8,
}

/// Result of toggling a channel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackChange {
    /// Channel is now tracked; `evicted` is the oldest channel dropped to
    /// stay within the cap
    Tracked { evicted: Option<Channel> },
    Untracked,
    /// Channel number outside 1..=512
    Rejected,
}

/// Insertion-ordered tracked set plus one sample buffer per tracked channel
pub struct TimeSeriesBuffer {
    /// Oldest first
    tracked: VecDeque<Channel>,
    buffers: HashMap<Channel, VecDeque<TimeSeriesPoint>>,
    max_tracked: usize,
    window_ms: u64,
}

impl TimeSeriesBuffer {
    /// `max_tracked` is clamped to `1..=MAX_TRACKED`
    pub fn new(max_tracked: usize, window_ms: u64) -> Self {
        let capped = max_tracked.clamp(1, MAX_TRACKED);
        if capped != max_tracked {
            warn!(requested = max_tracked, capped, "Tracked channel cap out of range");
        }
        Self {
            tracked: VecDeque::with_capacity(capped),
            buffers: HashMap::with_capacity(capped),
            max_tracked: capped,
            window_ms,
        }
    }

    /// Track `channel`, or untrack it if already tracked
    pub fn toggle(&mut self, channel: Channel) -> TrackChange {
        if channel == 0 || channel as usize > CHANNELS_PER_UNIVERSE {
            return TrackChange::Rejected;
        }
        if self.untrack(channel) {
            return TrackChange::Untracked;
        }

        let evicted = if self.tracked.len() >= self.max_tracked {
            let oldest = self.tracked.pop_front();
            if let Some(oldest) = oldest {
                self.buffers.remove(&oldest);
                debug!(channel = oldest, "Evicted oldest tracked channel");
            }
            oldest
        } else {
            None
        };

        self.tracked.push_back(channel);
        self.buffers.insert(channel, VecDeque::new());
        debug!(channel, tracked = self.tracked.len(), "Channel tracked");
        TrackChange::Tracked { evicted }
    }

    /// Stop tracking and discard the buffer. Returns whether it was tracked.
    pub fn untrack(&mut self, channel: Channel) -> bool {
        let Some(pos) = self.tracked.iter().position(|&c| c == channel) else {
            return false;
        };
        self.tracked.remove(pos);
        self.buffers.remove(&channel);
        debug!(channel, "Channel untracked");
        true
    }

    pub fn is_tracked(&self, channel: Channel) -> bool {
        self.tracked.contains(&channel)
    }

    /// Tracked channels, oldest first
    pub fn tracked(&self) -> Vec<Channel> {
        self.tracked.iter().copied().collect()
    }

    /// Append a sample for a tracked channel and prune its buffer.
    /// Untracked channels are ignored.
    pub fn append(&mut self, channel: Channel, value: u8, now: Millis) {
        let window_ms = self.window_ms;
        if let Some(buffer) = self.buffers.get_mut(&channel) {
            buffer.push_back(TimeSeriesPoint { timestamp: now, value });
            prune_buffer(buffer, now, window_ms);
            trace!(channel, value, len = buffer.len(), "Time series sample");
        }
    }

    /// Append every tracked channel's value from `frame`
    pub fn append_frame(&mut self, frame: &Frame, now: Millis) {
        for channel in self.tracked() {
            if let Some(value) = frame.channel(channel) {
                self.append(channel, value, now);
            }
        }
    }

    /// Drop expired points from every buffer
    pub fn prune(&mut self, now: Millis) {
        let window_ms = self.window_ms;
        for buffer in self.buffers.values_mut() {
            prune_buffer(buffer, now, window_ms);
        }
    }

    /// Samples for a tracked channel, oldest first
    pub fn series(&self, channel: Channel) -> Option<&VecDeque<TimeSeriesPoint>> {
        self.buffers.get(&channel)
    }

    /// Empty every buffer, keeping the tracked set
    pub fn clear_samples(&mut self) {
        for buffer in self.buffers.values_mut() {
            buffer.clear();
        }
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    /// Total samples across all buffers
    pub fn point_count(&self) -> usize {
        self.buffers.values().map(|b| b.len()).sum()
    }
}

/// Remove points with `timestamp <= now - window`. Samples are appended in
/// time order, so expired points are always at the front.
fn prune_buffer(buffer: &mut VecDeque<TimeSeriesPoint>, now: Millis, window_ms: u64) {
    let Some(cutoff) = now.checked_sub(window_ms) else {
        return;
    };
    while let Some(front) = buffer.front() {
        if front.timestamp <= cutoff {
            buffer.pop_front();
        } else {
            break;
        }
    }
}
