//! Periodic telemetry driver
//!
//! Each tick samples the metric source, sends the event, mirrors the snapshot
//! into reported properties, then sleeps for the current configured interval.
//! Delivery is best effort by design: a failed send is logged and dropped,
//! the next tick naturally resends fresher data. No queue, no retry.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::config::ConfigState;
use crate::hub::HubTransport;
use crate::metrics::MetricSource;
use crate::twin;

/// The periodic send/mirror/sleep cycle. Runs until the shutdown signal
/// flips; stopped is terminal and no further I/O happens after observing it.
pub struct TelemetryLoop<M: MetricSource> {
    source: M,
    hub: Arc<dyn HubTransport>,
    config: ConfigState,
    shutdown: watch::Receiver<bool>,
}

impl<M: MetricSource> TelemetryLoop<M> {
    pub fn new(
        source: M,
        hub: Arc<dyn HubTransport>,
        config: ConfigState,
        shutdown: watch::Receiver<bool>,
    ) -> Self {
        Self {
            source,
            hub,
            config,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        loop {
            if *self.shutdown.borrow() {
                break;
            }

            let snapshot = self.source.sample();

            if let Err(e) = self.hub.send_telemetry(&snapshot).await {
                warn!("telemetry send failed, dropping this tick: {e}");
            } else {
                debug!(
                    cpu_percent = snapshot.cpu_percent,
                    temperature_c = snapshot.temperature_c,
                    "telemetry sent"
                );
            }

            if let Err(e) = self.hub.patch_reported(twin::telemetry_mirror(&snapshot)).await {
                warn!("telemetry mirror patch failed: {e}");
            }

            // The interval is read fresh each tick: a remote change takes
            // effect starting with this sleep, never retroactively.
            let interval = Duration::from_secs(self.config.get());
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                changed = self.shutdown.changed() => {
                    if changed.is_err() || *self.shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("telemetry loop stopped");
    }
}
