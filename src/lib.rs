//! Twinline agent library - twin-synchronized telemetry loop
//!
//! The agent periodically samples local machine metrics and reports them to a
//! remote hub, while the reporting cadence can be changed remotely at runtime
//! through desired/reported twin properties:
//! - `metrics` samples the machine (CPU, temperature, uptime)
//! - `config` holds the live cadence parameter shared between tasks
//! - `twin` validates desired patches and acknowledges what was applied
//! - `telemetry` drives the periodic send/mirror/sleep cycle
//! - `supervisor` orders startup, runs both tasks, and shuts down cleanly
//! - `hub` / `mqtt` define and implement the transport capability

pub mod config;
pub mod error;
pub mod hub;
pub mod metrics;
pub mod mqtt;
pub mod settings;
pub mod supervisor;
pub mod telemetry;
pub mod twin;
