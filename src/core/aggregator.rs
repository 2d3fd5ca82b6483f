//! Per-universe packet statistics joined with the backend's source list

use serde::Serialize;
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, trace};

use super::source::{Millis, Source, Universe};

/// Below this age a universe counts as active
pub const ACTIVE_WITHIN_MS: Millis = 3_000;
/// Below this age (and above `ACTIVE_WITHIN_MS`) a universe counts as idle
pub const IDLE_WITHIN_MS: Millis = 10_000;

/// Locally accumulated transport statistics for one universe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseStats {
    pub packet_count: u64,
    pub last_update_at: Millis,
}

/// What views show for a universe
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UniverseSummary {
    /// Reported by the owning source, not measured here
    pub fps: f32,
    pub packet_count: u64,
}

/// Staleness of a universe by time since its last update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Active,
    Idle,
    Stale,
}

impl Freshness {
    pub fn from_age(age: Millis) -> Self {
        if age < ACTIVE_WITHIN_MS {
            Freshness::Active
        } else if age < IDLE_WITHIN_MS {
            Freshness::Idle
        } else {
            Freshness::Stale
        }
    }
}

#[derive(Default)]
pub struct SourceAggregator {
    sources: Vec<Source>,
    stats: HashMap<Universe, UniverseStats>,
    /// Sorted, deduplicated union of all advertised universes
    universes: Vec<Universe>,
    /// Universes advertised by more than one source
    duplicates: Vec<Universe>,
}

impl SourceAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the source list and recompute the universe union
    pub fn set_sources(&mut self, sources: Vec<Source>) {
        let mut seen = BTreeSet::new();
        let mut duplicates = BTreeSet::new();
        for source in &sources {
            // A source listing a universe twice is not a conflict
            let own: BTreeSet<Universe> = source.universes.iter().copied().collect();
            for universe in own {
                if !seen.insert(universe) {
                    duplicates.insert(universe);
                }
            }
        }

        let universes: Vec<Universe> = seen.into_iter().collect();
        if universes != self.universes {
            debug!(count = universes.len(), "Universe list changed");
        }

        self.universes = universes;
        self.duplicates = duplicates.into_iter().collect();
        self.sources = sources;
    }

    /// Count one frame-update notification
    pub fn record_packet(&mut self, universe: Universe, now: Millis) {
        let stats = self.stats.entry(universe).or_insert_with(|| {
            debug!(universe, "New universe registered for stats");
            UniverseStats::default()
        });
        stats.packet_count += 1;
        stats.last_update_at = now;

        trace!(universe, packets = stats.packet_count, "Packet recorded");
    }

    /// `None` when the universe is neither advertised nor observed
    pub fn stats_for(&self, universe: Universe) -> Option<UniverseSummary> {
        let source = self.source_for(universe).map(|(_, s)| s);
        let stats = self.stats.get(&universe);
        if source.is_none() && stats.is_none() {
            return None;
        }
        Some(UniverseSummary {
            fps: source.map_or(0.0, |s| s.fps),
            packet_count: stats.map_or(0, |s| s.packet_count),
        })
    }

    pub fn universe_stats(&self, universe: Universe) -> Option<UniverseStats> {
        self.stats.get(&universe).copied()
    }

    pub fn all_universes(&self) -> &[Universe] {
        &self.universes
    }

    pub fn duplicate_universes(&self) -> &[Universe] {
        &self.duplicates
    }

    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// First source in list order advertising `universe`, with its index
    pub fn source_for(&self, universe: Universe) -> Option<(usize, &Source)> {
        self.sources
            .iter()
            .enumerate()
            .find(|(_, s)| s.advertises(universe))
    }

    /// Never-observed universes are stale
    pub fn freshness(&self, universe: Universe, now: Millis) -> Freshness {
        match self.stats.get(&universe) {
            Some(stats) => Freshness::from_age(now.saturating_sub(stats.last_update_at)),
            None => Freshness::Stale,
        }
    }

    /// Packets across all universes
    pub fn total_packets(&self) -> u64 {
        self.stats.values().map(|s| s.packet_count).sum()
    }
}
