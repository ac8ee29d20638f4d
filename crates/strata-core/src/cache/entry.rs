//! Per-key cache entry state.

use crate::error::{Result, StrataError};
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

/// A fetch every consumer of a key can await. Cloning attaches another
/// consumer to the same store call.
pub type InFlight<V> = Shared<BoxFuture<'static, Result<Arc<V>>>>;

/// Lifecycle position of one cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Never fetched, or evicted.
    Absent,
    /// First fetch running, nothing to serve yet.
    Fetching,
    Fresh,
    /// Served as is; a background refresh may be running.
    Stale,
    /// Last fetch failed. Data from an earlier fetch may still be served.
    Failed,
}

/// Snapshot of one entry as seen by a consumer.
#[derive(Debug)]
pub struct CacheRead<V> {
    pub status: CacheStatus,
    pub data: Option<Arc<V>>,
    pub error: Option<StrataError>,
    pub is_fetching: bool,
    pub is_stale: bool,
    pub fetched_at: Option<Instant>,
    /// Wall-clock time of the last successful fetch.
    pub updated_at: Option<DateTime<Utc>>,
}

impl<V> Clone for CacheRead<V> {
    fn clone(&self) -> Self {
        Self {
            status: self.status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching: self.is_fetching,
            is_stale: self.is_stale,
            fetched_at: self.fetched_at,
            updated_at: self.updated_at,
        }
    }
}

impl<V> CacheRead<V> {
    pub(crate) fn absent() -> Self {
        Self {
            status: CacheStatus::Absent,
            data: None,
            error: None,
            is_fetching: false,
            is_stale: false,
            fetched_at: None,
            updated_at: None,
        }
    }

    /// Nothing to show and a fetch is running.
    pub fn is_loading(&self) -> bool {
        self.data.is_none() && self.is_fetching
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

pub(crate) struct EntryState<V> {
    pub data: Option<Arc<V>>,
    pub fetched_at: Option<Instant>,
    pub updated_at: Option<DateTime<Utc>>,
    pub error: Option<StrataError>,
    pub in_flight: Option<InFlight<V>>,
    /// Bumped for every fetch started; only the latest one may write.
    pub generation: u64,
    /// Whether crossing the staleness window may start a background refresh.
    pub refresh_armed: bool,
    /// Set by `invalidate`, cleared by the next successful write.
    pub invalidated: bool,
}

impl<V> EntryState<V> {
    fn new() -> Self {
        Self {
            data: None,
            fetched_at: None,
            updated_at: None,
            error: None,
            in_flight: None,
            generation: 0,
            refresh_armed: true,
            invalidated: false,
        }
    }

    pub fn is_stale(&self, stale_after: Duration) -> bool {
        match self.fetched_at {
            Some(fetched_at) => self.invalidated || fetched_at.elapsed() > stale_after,
            None => true,
        }
    }

    pub fn read(&self, stale_after: Duration) -> CacheRead<V> {
        let is_fetching = self.in_flight.is_some();
        let is_stale = self.data.is_some() && self.is_stale(stale_after);
        let status = if self.error.is_some() && !is_fetching {
            CacheStatus::Failed
        } else if self.data.is_none() {
            if is_fetching {
                CacheStatus::Fetching
            } else {
                CacheStatus::Absent
            }
        } else if is_stale {
            CacheStatus::Stale
        } else {
            CacheStatus::Fresh
        };

        CacheRead {
            status,
            data: self.data.clone(),
            error: self.error.clone(),
            is_fetching,
            is_stale,
            fetched_at: self.fetched_at,
            updated_at: self.updated_at,
        }
    }
}

/// One key's entry. The state is only locked for whole-value reads and
/// writes, never across an await.
pub(crate) struct Slot<V> {
    state: Mutex<EntryState<V>>,
}

impl<V> Slot<V> {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(EntryState::new()),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, EntryState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store the outcome of fetch `generation`. Returns false when a newer
    /// fetch has started since, in which case nothing is written.
    pub fn apply(&self, generation: u64, result: &Result<Arc<V>>) -> bool {
        let mut state = self.lock();
        if state.generation != generation {
            return false;
        }
        state.in_flight = None;
        match result {
            Ok(data) => {
                state.data = Some(Arc::clone(data));
                state.fetched_at = Some(Instant::now());
                state.updated_at = Some(Utc::now());
                state.error = None;
                state.refresh_armed = true;
                state.invalidated = false;
            }
            Err(error) => {
                // Last-good data stays; the error is reported beside it.
                state.error = Some(error.clone());
                state.refresh_armed = false;
            }
        }
        true
    }
}
