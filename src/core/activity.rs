//! Per-channel decaying activity score
//!
//! Every update multiplies the score by a decay factor and then adds a boost
//! for change since the previous value. How the boost is computed depends on
//! which path delivered the frame:
//!
//! - `Poll` updates come from periodic fetches and tick steps and use
//!   [`DecayPolicy::ContinuousChange`] by default: the boost scales with the
//!   size of the change.
//! - `Push` updates run per backend notification and use
//!   [`DecayPolicy::DiscreteChange`] by default: a fixed boost per change.
//!
//! Both paths share one estimator and one previous-value baseline.

use serde::{Deserialize, Serialize};
use tracing::trace;

use super::config::ActivityConfig;
use super::frame::Frame;
use super::source::{Channel, CHANNELS_PER_UNIVERSE};

/// Which ingestion path produced an update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateKind {
    /// Periodic fetch or tick against the last-known frame
    Poll,
    /// Backend "frame updated" notification
    Push,
}

/// How a change in value raises activity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DecayPolicy {
    /// `a * decay + |v - prev| / 255 * gain`
    ContinuousChange,
    /// `a * decay + boost` when `v != prev`, else `a * decay`
    DiscreteChange,
}

pub struct ActivityEstimator {
    activity: Vec<f32>,
    previous: Vec<u8>,
    config: ActivityConfig,
}

impl ActivityEstimator {
    pub fn new(config: ActivityConfig) -> Self {
        Self {
            activity: vec![0.0; CHANNELS_PER_UNIVERSE],
            previous: vec![0; CHANNELS_PER_UNIVERSE],
            config,
        }
    }

    pub fn config(&self) -> &ActivityConfig {
        &self.config
    }

    pub fn policy_for(&self, kind: UpdateKind) -> DecayPolicy {
        match kind {
            UpdateKind::Poll => self.config.poll_policy,
            UpdateKind::Push => self.config.push_policy,
        }
    }

    /// Apply one update from `frame`, then make it the new baseline.
    ///
    /// Returns the number of channels whose value changed.
    pub fn update(&mut self, frame: &Frame, kind: UpdateKind) -> usize {
        let policy = self.policy_for(kind);
        let ActivityConfig {
            decay,
            continuous_gain,
            discrete_boost,
            ..
        } = self.config;

        let mut changed = 0;
        for ((activity, prev), &value) in self
            .activity
            .iter_mut()
            .zip(self.previous.iter_mut())
            .zip(frame.as_slice())
        {
            let delta = value.abs_diff(*prev);
            if delta > 0 {
                changed += 1;
            }
            let boost = match policy {
                DecayPolicy::ContinuousChange => delta as f32 / 255.0 * continuous_gain,
                DecayPolicy::DiscreteChange if delta > 0 => discrete_boost,
                DecayPolicy::DiscreteChange => 0.0,
            };
            *activity = (*activity * decay + boost).clamp(0.0, 1.0);
            *prev = value;
        }

        trace!(?kind, ?policy, changed, "Activity updated");
        changed
    }

    /// One decay step for every channel with no change boost
    pub fn decay(&mut self) {
        let decay = self.config.decay;
        for activity in &mut self.activity {
            *activity = (*activity * decay).clamp(0.0, 1.0);
        }
    }

    /// Activity of a 1-based channel, `None` outside 1..=512
    pub fn get(&self, channel: Channel) -> Option<f32> {
        let idx = (channel as usize).checked_sub(1)?;
        self.activity.get(idx).copied()
    }

    /// All 512 scores, index = channel - 1
    pub fn scores(&self) -> &[f32] {
        &self.activity
    }

    /// Use `frame` as the change baseline without touching scores
    pub fn seed_baseline(&mut self, frame: &Frame) {
        self.previous.copy_from_slice(frame.as_slice());
    }

    /// Zero every score and the baseline
    pub fn reset(&mut self) {
        self.activity.fill(0.0);
        self.previous.fill(0);
    }
}
