//! Platform-agnostic core - the telemetry state engine and its stores
//!
//! Nothing here depends on tokio or a renderer; the runtime and CLI build on
//! top of it.

pub mod activity;
pub mod aggregator;
pub mod backend;
pub mod color;
pub mod config;
pub mod downsample;
pub mod engine;
pub mod error;
pub mod frame;
pub mod history;
pub mod parser;
pub mod source;
pub mod timeseries;

pub use activity::{ActivityEstimator, DecayPolicy, UpdateKind};
pub use aggregator::{Freshness, SourceAggregator, UniverseStats, UniverseSummary};
pub use backend::{Backend, MemoryBackend};
pub use color::{activity_color, resolve_color, CellColor, CellKind, Color, ColorInputs, ColorMode};
pub use config::{ActivityConfig, EngineConfig};
pub use downsample::{downsample, DASHBOARD_CELLS};
pub use engine::{ApplyOutcome, EngineSnapshot, FrameUpdate, TelemetryEngine, TrackedSeries};
pub use error::{BackendError, ConfigError};
pub use frame::{Frame, FrameStore};
pub use history::{ChannelHistory, ChannelHistoryEntry};
pub use parser::{parse_message, BackendEvent, DmxNotice, Inbound};
pub use source::{Channel, Millis, Protocol, Source, SourceStatus, Universe, CHANNELS_PER_UNIVERSE};
pub use timeseries::{TimeSeriesBuffer, TimeSeriesPoint, TrackChange, MAX_TRACKED};
