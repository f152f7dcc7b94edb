//! Hub transport capability
//!
//! The agent treats the cloud endpoint as an opaque capability: send a
//! telemetry event, read the twin, patch reported properties, and receive
//! desired-property patches. Production uses the MQTT implementation in
//! `crate::mqtt`; tests drive the agent with in-memory fakes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::HubError;
use crate::metrics::Snapshot;
use crate::twin::DesiredPatch;

/// Both halves of the device twin as last seen by the hub.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TwinDocument {
    #[serde(default)]
    pub desired: Value,
    #[serde(default)]
    pub reported: Value,
}

/// Transport to the hub. All operations may fail transiently; only `connect`
/// failure is fatal, and only at startup.
///
/// `send_telemetry` and `patch_reported` must be safe to call concurrently
/// from the telemetry loop and the reconciler.
#[async_trait]
pub trait HubTransport: Send + Sync {
    /// Establish the connection. Must be called before any other operation.
    async fn connect(&self) -> Result<(), HubError>;

    /// Release the connection. Idempotent; also tears down the patch stream.
    async fn disconnect(&self);

    /// Publish one telemetry event, best effort.
    async fn send_telemetry(&self, event: &Snapshot) -> Result<(), HubError>;

    /// Fetch the current desired/reported twin document.
    async fn get_twin(&self) -> Result<TwinDocument, HubError>;

    /// Push an incremental update to the device's reported properties.
    async fn patch_reported(&self, doc: Value) -> Result<(), HubError>;

    /// Inbound desired-property patches. The stream can be taken once; the
    /// supervisor hands it to the reconciler task.
    fn take_desired_patches(&self) -> Option<mpsc::Receiver<DesiredPatch>>;
}
