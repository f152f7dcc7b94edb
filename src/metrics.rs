//! Machine metric sampling
//!
//! Provides the `MetricSource` capability consumed by the telemetry loop and
//! its production implementation over sysinfo:
//! - CPU usage percentage
//! - CPU temperature (0.0 when no thermal sensor is present)
//! - System uptime

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use sysinfo::{Components, System};

/// One sampling tick's worth of machine state. Immutable once produced.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f32,
    pub temperature_c: f32,
    pub uptime_s: u64,
}

impl Snapshot {
    /// UTC ISO-8601 timestamp with 'Z' suffix, as carried in wire documents.
    pub fn iso_timestamp(&self) -> String {
        self.timestamp.to_rfc3339_opts(SecondsFormat::AutoSi, true)
    }
}

/// Capability producing snapshots. Never fails: a missing sensor degrades to
/// a defined default instead of erroring.
pub trait MetricSource: Send + 'static {
    fn sample(&mut self) -> Snapshot;
}

/// Production metric source backed by the sysinfo crate.
pub struct SysinfoSource {
    sys: System,
    components: Components,
}

impl SysinfoSource {
    pub fn new() -> Self {
        let mut sys = System::new();
        // Prime CPU counters so the first real sample is a usable delta
        sys.refresh_cpu_usage();
        Self {
            sys,
            components: Components::new_with_refreshed_list(),
        }
    }

    /// CPU thermal reading, 0.0 when no CPU sensor is present. Unrelated
    /// sensors (NVMe, GPU) are never substituted.
    fn cpu_temperature(&mut self) -> f32 {
        self.components.refresh();
        self.components
            .iter()
            .find(|c| is_cpu_sensor(c.label()))
            .map(|c| c.temperature())
            .unwrap_or(0.0)
    }
}

fn is_cpu_sensor(label: &str) -> bool {
    let label = label.to_ascii_lowercase();
    label.contains("cpu") || label.contains("thermal") || label.contains("tdie")
}

impl Default for SysinfoSource {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricSource for SysinfoSource {
    fn sample(&mut self) -> Snapshot {
        self.sys.refresh_cpu_usage();
        let cpu_percent = self.sys.global_cpu_info().cpu_usage().clamp(0.0, 100.0);
        let temperature_c = self.cpu_temperature();

        Snapshot {
            timestamp: Utc::now(),
            cpu_percent,
            temperature_c,
            uptime_s: System::uptime(),
        }
    }
}
