//! Normalized telemetry samples shared by every source

pub mod history;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

pub use history::{downsample, HistorySeries, HistoryStore};

/// Every quantity the dashboard tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    BatteryPercent,
    BatteryChargeRate,
    BatteryCycles,
    BatteryHealth,
    BatteryTemperature,
    CpuPower,
    GpuPower,
    AnePower,
    PackagePower,
    ProcessCpu,
    ProcessMemory,
}

impl Metric {
    pub const ALL: [Metric; 11] = [
        Metric::BatteryPercent,
        Metric::BatteryChargeRate,
        Metric::BatteryCycles,
        Metric::BatteryHealth,
        Metric::BatteryTemperature,
        Metric::CpuPower,
        Metric::GpuPower,
        Metric::AnePower,
        Metric::PackagePower,
        Metric::ProcessCpu,
        Metric::ProcessMemory,
    ];

    pub fn unit(self) -> Unit {
        match self {
            Self::BatteryPercent | Self::BatteryHealth | Self::ProcessCpu => Unit::Percent,
            Self::BatteryChargeRate
            | Self::CpuPower
            | Self::GpuPower
            | Self::AnePower
            | Self::PackagePower => Unit::Watts,
            Self::BatteryCycles => Unit::Count,
            Self::BatteryTemperature => Unit::Celsius,
            Self::ProcessMemory => Unit::Bytes,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::BatteryPercent => "Charge",
            Self::BatteryChargeRate => "Rate",
            Self::BatteryCycles => "Cycles",
            Self::BatteryHealth => "Health",
            Self::BatteryTemperature => "Temp",
            Self::CpuPower => "CPU",
            Self::GpuPower => "GPU",
            Self::AnePower => "ANE",
            Self::PackagePower => "Package",
            Self::ProcessCpu => "CPU load",
            Self::ProcessMemory => "Resident",
        }
    }

    /// Name used in config files and machine-readable output
    pub fn name(self) -> &'static str {
        match self {
            Self::BatteryPercent => "battery-percent",
            Self::BatteryChargeRate => "battery-charge-rate",
            Self::BatteryCycles => "battery-cycles",
            Self::BatteryHealth => "battery-health",
            Self::BatteryTemperature => "battery-temperature",
            Self::CpuPower => "cpu-power",
            Self::GpuPower => "gpu-power",
            Self::AnePower => "ane-power",
            Self::PackagePower => "package-power",
            Self::ProcessCpu => "process-cpu",
            Self::ProcessMemory => "process-memory",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// The adapter a metric comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Battery,
    Power,
    Processes,
}

impl SourceKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Battery => "battery",
            Self::Power => "power",
            Self::Processes => "processes",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Percent,
    Watts,
    Count,
    Celsius,
    Bytes,
}

impl Unit {
    pub fn format(self, value: f64) -> String {
        match self {
            Self::Percent => format!("{:.1}%", value),
            Self::Watts => format!("{:.2} W", value),
            Self::Count => format!("{:.0}", value),
            Self::Celsius => format!("{:.1} °C", value),
            Self::Bytes => humansize::format_size(value.max(0.0) as u64, humansize::BINARY),
        }
    }
}

/// A reading tagged with how much it can be trusted.
///
/// `Stale` repeats the last good value of a source that failed this cycle.
/// `Unavailable` has no value at all and must never be graphed as zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Fresh(f64),
    Stale(f64),
    Unavailable,
}

impl Value {
    pub fn quality(&self) -> Quality {
        match self {
            Self::Fresh(_) => Quality::Fresh,
            Self::Stale(_) => Quality::Stale,
            Self::Unavailable => Quality::Unavailable,
        }
    }

    pub fn get(&self) -> Option<f64> {
        match *self {
            Self::Fresh(v) | Self::Stale(v) => Some(v),
            Self::Unavailable => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Fresh,
    Stale,
    Unavailable,
}

/// One normalized reading from one source at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub metric: Metric,
    pub timestamp: Instant,
    pub value: Value,
}

impl Sample {
    pub fn fresh(metric: Metric, timestamp: Instant, value: f64) -> Self {
        Self {
            metric,
            timestamp,
            value: Value::Fresh(value),
        }
    }

    pub fn unavailable(metric: Metric, timestamp: Instant) -> Self {
        Self {
            metric,
            timestamp,
            value: Value::Unavailable,
        }
    }

    /// Repeat this reading as stale, keeping the instant it was captured
    pub fn into_stale(self) -> Self {
        let value = match self.value {
            Value::Fresh(v) | Value::Stale(v) => Value::Stale(v),
            Value::Unavailable => Value::Unavailable,
        };
        Self { value, ..self }
    }

    pub fn quality(&self) -> Quality {
        self.value.quality()
    }

    pub fn value(&self) -> Option<f64> {
        self.value.get()
    }

    pub fn is_available(&self) -> bool {
        !matches!(self.value, Value::Unavailable)
    }

    pub fn format(&self) -> String {
        match self.value() {
            Some(v) => self.metric.unit().format(v),
            None => "—".to_string(),
        }
    }
}

/// One process row of the top-N table
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub cpu_percent: f64,
    pub memory_bytes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChargeState {
    Charging,
    Discharging,
    Charged,
    AcAttached,
    #[default]
    Unknown,
}

impl ChargeState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Charging => "charging",
            Self::Discharging => "discharging",
            Self::Charged => "charged",
            Self::AcAttached => "AC attached",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum PowerMode {
    LowPower,
    Automatic,
    HighPerformance,
    #[default]
    Unknown,
}

impl PowerMode {
    pub fn label(self) -> &'static str {
        match self {
            Self::LowPower => "Low Power",
            Self::Automatic => "Automatic",
            Self::HighPerformance => "High Performance",
            Self::Unknown => "Unknown",
        }
    }
}

/// Coarse failure category kept for diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    Unsupported,
    Parse,
    Timeout,
    Process,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Unsupported => "unsupported",
            Self::Parse => "parse error",
            Self::Timeout => "timeout",
            Self::Process => "process error",
        }
    }
}

/// Diagnostic view of one source's bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceStatus {
    pub kind: SourceKind,
    pub consecutive_failures: u32,
    pub total_failures: u64,
    pub last_error: Option<ErrorKind>,
    pub disabled: bool,
}

impl SourceStatus {
    #[cfg(test)]
    pub fn new(kind: SourceKind) -> Self {
        Self {
            kind,
            consecutive_failures: 0,
            total_failures: 0,
            last_error: None,
            disabled: false,
        }
    }
}

/// Latest sample per metric, replaced wholesale on every tick
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub tick: u64,
    pub taken_at: Instant,
    pub captured_at: DateTime<Utc>,
    pub samples: BTreeMap<Metric, Sample>,
    pub processes: Vec<ProcessInfo>,
    pub charge_state: ChargeState,
    pub time_remaining: Option<Duration>,
    pub power_mode: PowerMode,
    pub sources: Vec<SourceStatus>,
}

impl Snapshot {
    /// The snapshot published before the first tick completes
    pub fn empty(now: Instant) -> Self {
        Self {
            tick: 0,
            taken_at: now,
            captured_at: Utc::now(),
            samples: BTreeMap::new(),
            processes: Vec::new(),
            charge_state: ChargeState::Unknown,
            time_remaining: None,
            power_mode: PowerMode::Unknown,
            sources: Vec::new(),
        }
    }

    pub fn sample(&self, metric: Metric) -> Sample {
        self.samples
            .get(&metric)
            .copied()
            .unwrap_or_else(|| Sample::unavailable(metric, self.taken_at))
    }

    pub fn value(&self, metric: Metric) -> Option<f64> {
        self.samples.get(&metric).and_then(|s| s.value())
    }

    pub fn source(&self, kind: SourceKind) -> Option<&SourceStatus> {
        self.sources.iter().find(|s| s.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_metric_has_a_distinct_name() {
        let mut names: Vec<_> = Metric::ALL.iter().map(|m| m.name()).collect();
        names.sort();
        names.dedup();
        assert_eq!(names.len(), Metric::ALL.len());
    }

    #[test]
    fn metric_names_match_serde_representation() {
        for metric in Metric::ALL {
            let json = serde_json::to_string(&metric).unwrap();
            assert_eq!(json, format!("\"{}\"", metric.name()));
        }
    }

    #[test]
    fn stale_keeps_capture_instant_and_value() {
        let t0 = Instant::now();
        let sample = Sample::fresh(Metric::BatteryPercent, t0, 40.0);
        let stale = sample.into_stale();

        assert_eq!(stale.timestamp, t0);
        assert_eq!(stale.value, Value::Stale(40.0));
        assert_eq!(stale.quality(), Quality::Stale);
    }

    #[test]
    fn unavailable_has_no_value() {
        let sample = Sample::unavailable(Metric::CpuPower, Instant::now());
        assert_eq!(sample.value(), None);
        assert!(!sample.is_available());
        assert_eq!(sample.format(), "—");
    }

    #[test]
    fn empty_snapshot_reports_unavailable() {
        let snapshot = Snapshot::empty(Instant::now());
        assert_eq!(
            snapshot.sample(Metric::PackagePower).quality(),
            Quality::Unavailable
        );
        assert_eq!(snapshot.value(Metric::PackagePower), None);
    }

    #[test]
    fn formats_units() {
        assert_eq!(Unit::Watts.format(3.14159), "3.14 W");
        assert_eq!(Unit::Percent.format(40.0), "40.0%");
        assert_eq!(Unit::Count.format(212.0), "212");
        assert!(Unit::Bytes.format(2048.0).contains("KiB"));
    }
}
