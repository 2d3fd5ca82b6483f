//! Last-nonzero observation per channel
//!
//! Powers the "fade since last used" view: a channel that drops back to zero
//! keeps its entry so recency is still known.

use serde::Serialize;
use tracing::trace;

use super::frame::Frame;
use super::source::{Channel, Millis, CHANNELS_PER_UNIVERSE};

/// When a channel was last seen above zero, and at what level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelHistoryEntry {
    pub last_active_at: Millis,
    pub last_value: u8,
}

/// Fixed-size table indexed by `channel - 1`, bounded at 512 entries
pub struct ChannelHistory {
    entries: Vec<Option<ChannelHistoryEntry>>,
}

impl ChannelHistory {
    pub fn new() -> Self {
        Self {
            entries: vec![None; CHANNELS_PER_UNIVERSE],
        }
    }

    /// Record every nonzero channel of `frame` at `now`.
    ///
    /// Returns the number of channels touched.
    pub fn observe(&mut self, frame: &Frame, now: Millis) -> usize {
        let mut touched = 0;
        for (slot, &value) in self.entries.iter_mut().zip(frame.as_slice()) {
            if value > 0 {
                *slot = Some(ChannelHistoryEntry {
                    last_active_at: now,
                    last_value: value,
                });
                touched += 1;
            }
        }
        trace!(touched, now, "Channel history observed");
        touched
    }

    pub fn get(&self, channel: Channel) -> Option<ChannelHistoryEntry> {
        let idx = (channel as usize).checked_sub(1)?;
        self.entries.get(idx).copied().flatten()
    }

    /// Every slot, index = channel - 1
    pub fn entries(&self) -> &[Option<ChannelHistoryEntry>] {
        &self.entries
    }

    /// Number of channels with an entry
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries.fill(None);
    }
}

impl Default for ChannelHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame_with(channel: Channel, value: u8) -> Frame {
        let mut frame = Frame::zeroed();
        frame.set_channel(channel, value);
        frame
    }

    #[test]
    fn test_entry_created_on_first_nonzero() {
        let mut history = ChannelHistory::new();
        assert!(history.get(10).is_none());

        history.observe(&frame_with(10, 0), 5);
        assert!(history.get(10).is_none());

        assert_eq!(history.observe(&frame_with(10, 42), 100), 1);
        assert_eq!(
            history.get(10),
            Some(ChannelHistoryEntry { last_active_at: 100, last_value: 42 })
        );
    }

    #[test]
    fn test_entry_updates_on_nonzero_and_survives_zero() {
        let mut history = ChannelHistory::new();
        history.observe(&frame_with(3, 10), 0);
        history.observe(&frame_with(3, 20), 50);
        assert_eq!(
            history.get(3),
            Some(ChannelHistoryEntry { last_active_at: 50, last_value: 20 })
        );

        // Back to zero leaves the entry untouched
        history.observe(&frame_with(3, 0), 200);
        assert_eq!(
            history.get(3),
            Some(ChannelHistoryEntry { last_active_at: 50, last_value: 20 })
        );
    }

    #[test]
    fn test_out_of_range_channels() {
        let mut history = ChannelHistory::new();
        history.observe(&Frame::from_slice(&[255; 512]), 1);
        assert_eq!(history.len(), 512);
        assert!(history.get(0).is_none());
        assert!(history.get(513).is_none());

        history.clear();
        assert!(history.is_empty());
    }
}
