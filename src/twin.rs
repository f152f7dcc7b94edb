//! Twin reconciliation
//!
//! Bridges untrusted remote desired-property patches into validated local
//! state and acknowledges exactly what was applied. The two outbound
//! reported-property namespaces (config confirmation, telemetry mirror) are
//! deliberately independent documents: they are eventually consistent and
//! carry no ordering guarantee relative to each other.

use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::ConfigState;
use crate::hub::HubTransport;
use crate::metrics::Snapshot;

/// Inbound desired-property patch. Untrusted: only the `telemetry_interval`
/// key is recognized, anything else is ignored rather than rejected.
#[derive(Debug, Clone)]
pub struct DesiredPatch(Value);

impl DesiredPatch {
    pub fn new(doc: Value) -> Self {
        Self(doc)
    }

    pub fn telemetry_interval(&self) -> Option<&Value> {
        self.0.get("telemetry_interval")
    }
}

/// Reported-property document confirming an applied interval.
pub fn config_confirmation(interval_s: u64) -> Value {
    json!({ "telemetry_interval": interval_s })
}

/// Reported-property document mirroring the latest telemetry snapshot.
pub fn telemetry_mirror(snapshot: &Snapshot) -> Value {
    json!({
        "cpu_percent": snapshot.cpu_percent,
        "temperature_c": snapshot.temperature_c,
        "uptime_s": snapshot.uptime_s,
        "last_update_utc": snapshot.iso_timestamp(),
    })
}

/// Applies validated desired patches to `ConfigState` and pushes a
/// confirmation back through the hub.
pub struct TwinReconciler {
    config: ConfigState,
    hub: Arc<dyn HubTransport>,
}

impl TwinReconciler {
    pub fn new(config: ConfigState, hub: Arc<dyn HubTransport>) -> Self {
        Self { config, hub }
    }

    /// Consume the desired-patch stream until the transport tears it down.
    pub async fn run(self, mut patches: mpsc::Receiver<DesiredPatch>) {
        while let Some(patch) = patches.recv().await {
            self.on_patch(patch).await;
        }
        debug!("desired-patch stream closed");
    }

    /// Handle one desired patch.
    ///
    /// An absent `telemetry_interval` is a no-op: patches may carry unrelated
    /// fields. A present but invalid value is dropped without acknowledgment.
    /// A valid value is installed and confirmed through reported properties.
    pub async fn on_patch(&self, patch: DesiredPatch) {
        let Some(raw) = patch.telemetry_interval() else {
            return;
        };
        let Some(interval) = raw.as_i64().filter(|n| *n >= 1) else {
            warn!(value = %raw, "ignoring invalid desired telemetry_interval");
            return;
        };
        if !self.config.try_set(interval) {
            return;
        }
        info!(interval_s = interval, "applied desired telemetry interval");

        // One immediate retry, then drop: the periodic telemetry mirror is
        // the implicit retry channel for eventual consistency.
        let confirmation = config_confirmation(interval as u64);
        if let Err(first) = self.hub.patch_reported(confirmation.clone()).await {
            debug!("interval confirmation failed, retrying once: {first}");
            if let Err(second) = self.hub.patch_reported(confirmation).await {
                warn!("dropping interval confirmation after retry: {second}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn desired_patch_exposes_only_the_recognized_key() {
        let patch = DesiredPatch::new(json!({ "telemetry_interval": 30, "other": true }));
        assert_eq!(patch.telemetry_interval(), Some(&json!(30)));

        let patch = DesiredPatch::new(json!({ "unrelated": 1 }));
        assert!(patch.telemetry_interval().is_none());
    }

    #[test]
    fn confirmation_document_shape() {
        assert_eq!(config_confirmation(10), json!({ "telemetry_interval": 10 }));
    }

    #[test]
    fn mirror_document_shape() {
        let snapshot = Snapshot {
            timestamp: Utc::now(),
            cpu_percent: 7.5,
            temperature_c: 39.0,
            uptime_s: 120,
        };
        let doc = telemetry_mirror(&snapshot);
        assert_eq!(doc["cpu_percent"], 7.5);
        assert_eq!(doc["temperature_c"], 39.0);
        assert_eq!(doc["uptime_s"], 120);
        assert_eq!(doc["last_update_utc"], snapshot.iso_timestamp());
    }
}
