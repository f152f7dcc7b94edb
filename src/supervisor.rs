//! Agent orchestration
//!
//! Ordered startup: connect (fatal on failure), initial twin fetch
//! (non-fatal, default cadence on failure), reconciler subscription, then the
//! telemetry loop. Shutdown drains the in-flight tick before releasing the
//! transport, and the transport is released even if the last tick failed.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use crate::config::{ConfigState, IntervalSource, DEFAULT_INTERVAL_SECS};
use crate::hub::HubTransport;
use crate::metrics::MetricSource;
use crate::telemetry::TelemetryLoop;
use crate::twin::TwinReconciler;

pub struct Supervisor {
    hub: Arc<dyn HubTransport>,
    config: ConfigState,
}

impl Supervisor {
    pub fn new(hub: Arc<dyn HubTransport>) -> Self {
        Self {
            hub,
            config: ConfigState::new(),
        }
    }

    /// Handle onto the shared cadence state, mostly for observability.
    pub fn config(&self) -> ConfigState {
        self.config.clone()
    }

    /// Run the agent until `signal` resolves, then shut down in order.
    pub async fn run<M, F>(self, source: M, signal: F) -> Result<()>
    where
        M: MetricSource,
        F: Future<Output = ()>,
    {
        self.hub
            .connect()
            .await
            .context("failed to establish hub connection")?;
        info!("connected to hub");

        match self.hub.get_twin().await {
            Ok(twin) => {
                let desired = twin
                    .desired
                    .get("telemetry_interval")
                    .and_then(|v| v.as_i64())
                    .filter(|n| *n >= 1);
                if let Some(interval) = desired {
                    self.config.seed(interval as u64, IntervalSource::RemoteDesired);
                }
                info!(
                    interval_s = self.config.get(),
                    "telemetry interval initialized from twin"
                );
            }
            Err(e) => {
                warn!("initial twin fetch failed, using default interval {DEFAULT_INTERVAL_SECS}s: {e}");
            }
        }

        let patches = self
            .hub
            .take_desired_patches()
            .context("desired-patch stream unavailable")?;
        let reconciler = TwinReconciler::new(self.config.clone(), Arc::clone(&self.hub));
        let reconciler_task = tokio::spawn(reconciler.run(patches));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let telemetry = TelemetryLoop::new(
            source,
            Arc::clone(&self.hub),
            self.config.clone(),
            shutdown_rx,
        );
        let telemetry_task = tokio::spawn(telemetry.run());
        info!("telemetry loop started");

        signal.await;
        info!("shutdown requested, stopping telemetry loop");

        // Let the in-flight tick finish before tearing anything down
        let _ = shutdown_tx.send(true);
        if let Err(e) = telemetry_task.await {
            warn!("telemetry loop task ended abnormally: {e}");
        }
        reconciler_task.abort();
        self.hub.disconnect().await;
        info!("disconnected from hub");
        Ok(())
    }
}
