//! Twinline agent binary
//!
//! Device-side telemetry agent with a twin-synchronized reporting cadence:
//! samples CPU, temperature and uptime, sends them to the hub, and applies
//! remote `telemetry_interval` changes without restarting.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

use twinline_agent::metrics::SysinfoSource;
use twinline_agent::mqtt::MqttHub;
use twinline_agent::settings::AgentSettings;
use twinline_agent::supervisor::Supervisor;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("twinline_agent=info")),
        )
        .init();

    info!("twinline-agent v{} starting", env!("CARGO_PKG_VERSION"));

    let settings = AgentSettings::load()
        .await
        .context("failed to load agent settings")?;
    info!(
        broker = %settings.broker.host,
        port = settings.broker.port,
        device_id = %settings.device.device_id,
        "settings loaded"
    );

    let hub = Arc::new(MqttHub::new(&settings));
    let supervisor = Supervisor::new(hub);
    let source = SysinfoSource::new();

    supervisor
        .run(source, async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await
        .context("agent execution failed")
}
