//! Contract with the backend process that owns discovery and decoding

use parking_lot::Mutex;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use super::error::BackendError;
use super::source::{Source, Universe};

/// On-demand queries the engine makes against the backend.
///
/// The event stream (`sources-updated`, `dmx-updated`) is delivered
/// separately as a queue of `BackendEvent`s.
pub trait Backend: Clone + Send + Sync + 'static {
    /// Snapshot of every known source
    fn get_sources(&self) -> impl Future<Output = Result<Vec<Source>, BackendError>> + Send;

    /// Current frame for a universe, `None` if the backend has none
    fn get_dmx_data(
        &self,
        universe: Universe,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, BackendError>> + Send;
}

/// In-process backend holding frames and sources in memory.
///
/// Used for replaying captures and in tests.
#[derive(Clone, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    sources: Vec<Source>,
    frames: HashMap<Universe, Vec<u8>>,
    fail_next: usize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_sources(&self, sources: Vec<Source>) {
        self.inner.lock().sources = sources;
    }

    pub fn set_frame(&self, universe: Universe, data: Vec<u8>) {
        self.inner.lock().frames.insert(universe, data);
    }

    /// Make the next `n` calls fail with `BackendError::Closed`
    pub fn fail_next(&self, n: usize) {
        self.inner.lock().fail_next = n;
    }

    fn take_failure(&self) -> Result<(), BackendError> {
        let mut state = self.inner.lock();
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(BackendError::Closed);
        }
        Ok(())
    }
}

impl Backend for MemoryBackend {
    async fn get_sources(&self) -> Result<Vec<Source>, BackendError> {
        self.take_failure()?;
        Ok(self.inner.lock().sources.clone())
    }

    async fn get_dmx_data(&self, universe: Universe) -> Result<Option<Vec<u8>>, BackendError> {
        self.take_failure()?;
        Ok(self.inner.lock().frames.get(&universe).cloned())
    }
}
