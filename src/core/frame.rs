//! Latest-frame storage, one 512-channel frame per universe

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, trace};

use super::source::{Channel, Universe, CHANNELS_PER_UNIVERSE};

/// A complete 512-value snapshot of one universe.
///
/// Always exactly 512 entries: short input is zero-padded and long input is
/// truncated on construction.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<u8>", into = "Vec<u8>")]
pub struct Frame {
    values: Box<[u8; CHANNELS_PER_UNIVERSE]>,
}

impl Frame {
    /// All channels at zero
    pub fn zeroed() -> Self {
        Self {
            values: Box::new([0; CHANNELS_PER_UNIVERSE]),
        }
    }

    /// Build a frame from raw data, zero-padding or truncating to 512
    pub fn from_slice(data: &[u8]) -> Self {
        let mut frame = Self::zeroed();
        let len = data.len().min(CHANNELS_PER_UNIVERSE);
        frame.values[..len].copy_from_slice(&data[..len]);
        frame
    }

    /// Value of a 1-based channel, `None` outside 1..=512
    pub fn channel(&self, channel: Channel) -> Option<u8> {
        let idx = (channel as usize).checked_sub(1)?;
        self.values.get(idx).copied()
    }

    /// Set a 1-based channel; out-of-range channels are ignored
    pub fn set_channel(&mut self, channel: Channel, value: u8) {
        if let Some(slot) = (channel as usize)
            .checked_sub(1)
            .and_then(|idx| self.values.get_mut(idx))
        {
            *slot = value;
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.values[..]
    }

    /// Iterate `(channel, value)` with 1-based channel numbers
    pub fn channels(&self) -> impl Iterator<Item = (Channel, u8)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(|(idx, &value)| (idx as Channel + 1, value))
    }

    /// Number of channels above zero
    pub fn lit_count(&self) -> usize {
        self.values.iter().filter(|&&v| v > 0).count()
    }
}

impl Default for Frame {
    fn default() -> Self {
        Self::zeroed()
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("lit", &self.lit_count())
            .finish()
    }
}

impl From<Vec<u8>> for Frame {
    fn from(data: Vec<u8>) -> Self {
        Self::from_slice(&data)
    }
}

impl From<Frame> for Vec<u8> {
    fn from(frame: Frame) -> Self {
        frame.values.to_vec()
    }
}

struct StoredFrame {
    frame: Frame,
    /// Sequence of the fetch that produced this frame (0 = unordered write)
    sequence: u64,
}

/// Holds the newest known frame for every universe seen
#[derive(Default)]
pub struct FrameStore {
    frames: HashMap<Universe, StoredFrame>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the stored frame unconditionally
    pub fn set_frame(&mut self, universe: Universe, frame: Frame) {
        match self.frames.get_mut(&universe) {
            Some(stored) => stored.frame = frame,
            None => {
                debug!(universe, "New universe in frame store");
                self.frames.insert(universe, StoredFrame { frame, sequence: 0 });
            }
        }
    }

    /// Replace the stored frame only if `sequence` is newer than the last
    /// applied one. Returns whether the frame was stored.
    pub fn set_frame_ordered(&mut self, universe: Universe, frame: Frame, sequence: u64) -> bool {
        match self.frames.get_mut(&universe) {
            Some(stored) if sequence <= stored.sequence => {
                trace!(universe, sequence, last = stored.sequence, "Stale frame rejected");
                false
            }
            Some(stored) => {
                stored.frame = frame;
                stored.sequence = sequence;
                true
            }
            None => {
                debug!(universe, sequence, "New universe in frame store");
                self.frames.insert(universe, StoredFrame { frame, sequence });
                true
            }
        }
    }

    pub fn get_frame(&self, universe: Universe) -> Option<&Frame> {
        self.frames.get(&universe).map(|s| &s.frame)
    }

    /// Sequence of the last ordered write for a universe
    pub fn sequence(&self, universe: Universe) -> Option<u64> {
        self.frames.get(&universe).map(|s| s.sequence)
    }

    /// Stored universes in ascending order
    pub fn universes(&self) -> Vec<Universe> {
        let mut universes: Vec<Universe> = self.frames.keys().copied().collect();
        universes.sort_unstable();
        universes
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}
