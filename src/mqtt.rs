//! MQTT hub transport
//!
//! Carries the twin exchange over MQTT using versioned device topics:
//! - `twinline/devices/telemetry@v1/{device_id}` - outbound telemetry events
//! - `twinline/devices/twin-reported@v1/{device_id}` - outbound reported patches
//! - `twinline/devices/twin-desired@v1/{device_id}` - inbound desired patches
//! - `twinline/devices/twin-get@v1/{device_id}` + `twin-res@v1` - twin fetch
//!   as request/response with a bounded wait

use parking_lot::Mutex;
use rumqttc::{AsyncClient, Event, EventLoop, Incoming, MqttOptions, Publish, QoS};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::HubError;
use crate::hub::{HubTransport, TwinDocument};
use crate::metrics::Snapshot;
use crate::settings::AgentSettings;
use crate::twin::DesiredPatch;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const TWIN_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
const PATCH_CHANNEL_CAPACITY: usize = 16;

fn topic(kind: &str, device_id: &str) -> String {
    format!("twinline/devices/{kind}@v1/{device_id}")
}

/// Hub transport over rumqttc. The event loop runs in a background task
/// spawned by `connect`; publishes go through the shared `AsyncClient`, which
/// is safe for concurrent callers.
pub struct MqttHub {
    client: AsyncClient,
    eventloop: Mutex<Option<EventLoop>>,
    patches_rx: Mutex<Option<mpsc::Receiver<DesiredPatch>>>,
    shared: Arc<Shared>,
    device_id: String,
    broker_host: String,
    broker_port: u16,
}

struct Shared {
    patch_tx: mpsc::Sender<DesiredPatch>,
    pending_twin: Mutex<Option<oneshot::Sender<TwinDocument>>>,
    connack_tx: Mutex<Option<oneshot::Sender<()>>>,
    stopped: AtomicBool,
    desired_topic: String,
    twin_res_topic: String,
}

impl MqttHub {
    pub fn new(settings: &AgentSettings) -> Self {
        let device_id = settings.device.device_id.clone();
        let client_id = format!("twinline-agent-{}-{}", device_id, Uuid::new_v4().simple());

        let mut options = MqttOptions::new(
            &client_id,
            &settings.broker.host,
            settings.broker.port,
        );
        options.set_keep_alive(Duration::from_secs(u64::from(settings.broker.keep_alive_secs)));
        options.set_clean_session(true);

        let (client, eventloop) = AsyncClient::new(options, 10);
        let (patch_tx, patch_rx) = mpsc::channel(PATCH_CHANNEL_CAPACITY);

        Self {
            client,
            eventloop: Mutex::new(Some(eventloop)),
            patches_rx: Mutex::new(Some(patch_rx)),
            shared: Arc::new(Shared {
                patch_tx,
                pending_twin: Mutex::new(None),
                connack_tx: Mutex::new(None),
                stopped: AtomicBool::new(false),
                desired_topic: topic("twin-desired", &device_id),
                twin_res_topic: topic("twin-res", &device_id),
            }),
            device_id,
            broker_host: settings.broker.host.clone(),
            broker_port: settings.broker.port,
        }
    }

    fn device_topic(&self, kind: &str) -> String {
        topic(kind, &self.device_id)
    }
}

#[async_trait::async_trait]
impl HubTransport for MqttHub {
    async fn connect(&self) -> Result<(), HubError> {
        let eventloop = self
            .eventloop
            .lock()
            .take()
            .ok_or_else(|| HubError::Connect("transport already connected".to_string()))?;

        let (connack_tx, connack_rx) = oneshot::channel();
        *self.shared.connack_tx.lock() = Some(connack_tx);

        let shared = Arc::clone(&self.shared);
        tokio::spawn(event_loop_task(eventloop, shared));

        // Subscriptions are queued now and flushed once the broker accepts us
        self.client
            .subscribe(&self.shared.desired_topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| HubError::Connect(format!("subscribe failed: {e}")))?;
        self.client
            .subscribe(&self.shared.twin_res_topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| HubError::Connect(format!("subscribe failed: {e}")))?;

        match tokio::time::timeout(CONNECT_TIMEOUT, connack_rx).await {
            Ok(Ok(())) => {
                info!(
                    broker = %self.broker_host,
                    port = self.broker_port,
                    "connected to MQTT broker"
                );
                Ok(())
            }
            _ => Err(HubError::Connect(format!(
                "no acknowledgment from {}:{} within {}s",
                self.broker_host,
                self.broker_port,
                CONNECT_TIMEOUT.as_secs()
            ))),
        }
    }

    async fn disconnect(&self) {
        // Idempotent: the first caller wins, later calls are no-ops
        if self.shared.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect: {e}");
        }
    }

    async fn send_telemetry(&self, event: &Snapshot) -> Result<(), HubError> {
        let payload = serde_json::to_string(event)
            .map_err(|e| HubError::Transient(format!("serialize telemetry: {e}")))?;
        self.client
            .publish(self.device_topic("telemetry"), QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| HubError::Transient(e.to_string()))
    }

    async fn get_twin(&self) -> Result<TwinDocument, HubError> {
        let (tx, rx) = oneshot::channel();
        *self.shared.pending_twin.lock() = Some(tx);

        self.client
            .publish(self.device_topic("twin-get"), QoS::AtLeastOnce, false, "{}")
            .await
            .map_err(|e| HubError::Transient(e.to_string()))?;

        match tokio::time::timeout(TWIN_FETCH_TIMEOUT, rx).await {
            Ok(Ok(twin)) => Ok(twin),
            _ => {
                self.shared.pending_twin.lock().take();
                Err(HubError::Transient(format!(
                    "twin fetch timed out after {}s",
                    TWIN_FETCH_TIMEOUT.as_secs()
                )))
            }
        }
    }

    async fn patch_reported(&self, doc: Value) -> Result<(), HubError> {
        self.client
            .publish(
                self.device_topic("twin-reported"),
                QoS::AtLeastOnce,
                false,
                doc.to_string(),
            )
            .await
            .map_err(|e| HubError::Transient(e.to_string()))
    }

    fn take_desired_patches(&self) -> Option<mpsc::Receiver<DesiredPatch>> {
        self.patches_rx.lock().take()
    }
}

async fn event_loop_task(mut eventloop: EventLoop, shared: Arc<Shared>) {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                debug!("broker connection acknowledged");
                if let Some(tx) = shared.connack_tx.lock().take() {
                    let _ = tx.send(());
                }
            }
            Ok(Event::Incoming(Incoming::Publish(publish))) => {
                shared.handle_publish(publish).await;
            }
            Ok(_) => {}
            Err(e) => {
                if shared.stopped.load(Ordering::SeqCst) {
                    break;
                }
                error!("MQTT connection error: {e}");
                tokio::time::sleep(Duration::from_secs(5)).await;
            }
        }
    }
    debug!("MQTT event loop task exited");
}

impl Shared {
    async fn handle_publish(&self, publish: Publish) {
        let text = match String::from_utf8(publish.payload.to_vec()) {
            Ok(text) => text,
            Err(_) => {
                warn!(topic = %publish.topic, "dropping non-UTF-8 payload");
                return;
            }
        };

        if publish.topic == self.desired_topic {
            match serde_json::from_str::<Value>(&text) {
                Ok(doc) => {
                    if self.patch_tx.send(DesiredPatch::new(doc)).await.is_err() {
                        debug!("desired-patch consumer gone, dropping patch");
                    }
                }
                Err(e) => warn!("invalid desired patch JSON ({e}): {text}"),
            }
        } else if publish.topic == self.twin_res_topic {
            match serde_json::from_str::<TwinDocument>(&text) {
                Ok(twin) => {
                    if let Some(tx) = self.pending_twin.lock().take() {
                        let _ = tx.send(twin);
                    }
                }
                Err(e) => warn!("invalid twin document JSON ({e}): {text}"),
            }
        } else {
            debug!(topic = %publish.topic, "ignoring message on unexpected topic");
        }
    }
}
