//! Shared telemetry cadence state
//!
//! Single source of truth for "how often to sample". Read by the telemetry
//! loop on every tick, written by the twin reconciler when a valid desired
//! patch arrives and by the supervisor once at startup.

use parking_lot::Mutex;
use std::sync::Arc;

/// Cadence used whenever no valid remote value is present.
pub const DEFAULT_INTERVAL_SECS: u64 = 60;

/// Where the current interval value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalSource {
    Default,
    RemoteDesired,
}

#[derive(Debug)]
struct Inner {
    interval_s: u64,
    source: IntervalSource,
}

/// Concurrently shared telemetry interval.
///
/// Invariant: `interval_s >= 1` at all times. An invalid candidate is never
/// installed; `try_set` simply reports failure and leaves state unchanged.
#[derive(Clone)]
pub struct ConfigState {
    inner: Arc<Mutex<Inner>>,
}

impl ConfigState {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                interval_s: DEFAULT_INTERVAL_SECS,
                source: IntervalSource::Default,
            })),
        }
    }

    /// Current interval in seconds. Non-blocking, never torn.
    pub fn get(&self) -> u64 {
        self.inner.lock().interval_s
    }

    /// Provenance of the current value.
    pub fn source(&self) -> IntervalSource {
        self.inner.lock().source
    }

    /// Install `candidate` iff it is a positive interval. Returns whether it
    /// was applied. A remote-supplied value always flips provenance.
    pub fn try_set(&self, candidate: i64) -> bool {
        if candidate < 1 {
            return false;
        }
        let mut inner = self.inner.lock();
        inner.interval_s = candidate as u64;
        inner.source = IntervalSource::RemoteDesired;
        true
    }

    /// Startup-time initialization from the initial twin fetch. Values below
    /// one second are rejected the same way `try_set` rejects them.
    pub fn seed(&self, interval_s: u64, source: IntervalSource) {
        if interval_s < 1 {
            return;
        }
        let mut inner = self.inner.lock();
        inner.interval_s = interval_s;
        inner.source = source;
    }
}

impl Default for ConfigState {
    fn default() -> Self {
        Self::new()
    }
}
