//! SoC power draw from the IOReport energy model

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{run_command, Adapter, AdapterError, Detail, Reading};
use crate::telemetry::{Metric, PowerMode, SourceKind};

#[cfg(target_os = "macos")]
use super::ioreport::EnergyReporter;

const METRICS: &[Metric] = &[
    Metric::CpuPower,
    Metric::GpuPower,
    Metric::AnePower,
    Metric::PackagePower,
];

/// Shortest elapsed time used when converting energy to power
const MIN_ELAPSED: Duration = Duration::from_millis(1);

/// Energy reported by one IOReport channel over a sampling interval
#[derive(Debug, Clone, PartialEq)]
pub struct EnergyChannel {
    pub name: String,
    pub unit: String,
    pub value: i64,
}

impl EnergyChannel {
    pub fn joules(&self) -> f64 {
        unit_to_joules(self.value as f64, &self.unit)
    }
}

/// Outcome of reading the energy counters once
#[derive(Debug, Clone, PartialEq)]
pub enum EnergyRead {
    /// No baseline existed yet; this read only established one
    Primed,
    Delta {
        channels: Vec<EnergyChannel>,
        elapsed: Duration,
    },
}

pub fn unit_to_joules(value: f64, unit: &str) -> f64 {
    match unit.trim() {
        "mJ" => value / 1e3,
        "uJ" | "µJ" => value / 1e6,
        "nJ" => value / 1e9,
        // unlabelled channels report microjoules
        _ => value / 1e6,
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PowerDraw {
    pub cpu: f64,
    pub gpu: f64,
    pub ane: f64,
}

impl PowerDraw {
    pub fn package(&self) -> f64 {
        self.cpu + self.gpu + self.ane
    }
}

/// Sum channel energy by subsystem and divide by the interval length
pub fn energy_to_watts(channels: &[EnergyChannel], elapsed: Duration) -> PowerDraw {
    let mut joules = PowerDraw::default();
    for channel in channels {
        let name = channel.name.to_ascii_lowercase();
        let slot = if name.contains("cpu") {
            &mut joules.cpu
        } else if name.contains("gpu") {
            &mut joules.gpu
        } else if name.contains("ane") {
            &mut joules.ane
        } else {
            continue;
        };
        *slot += channel.joules();
    }

    let seconds = elapsed.max(MIN_ELAPSED).as_secs_f64();
    PowerDraw {
        cpu: joules.cpu / seconds,
        gpu: joules.gpu / seconds,
        ane: joules.ane / seconds,
    }
}

/// Interpret `pmset -g` settings
pub fn parse_power_mode(output: &str) -> PowerMode {
    let enabled = |key: &str| {
        output.lines().any(|line| {
            let mut fields = line.split_whitespace();
            fields.next() == Some(key) && fields.next() == Some("1")
        })
    };

    if enabled("lowpowermode") {
        PowerMode::LowPower
    } else if enabled("highpowermode") {
        PowerMode::HighPerformance
    } else {
        PowerMode::Automatic
    }
}

#[cfg(not(target_os = "macos"))]
struct EnergyReporter;

#[cfg(not(target_os = "macos"))]
impl EnergyReporter {
    fn open() -> Option<Self> {
        None
    }

    fn read(&mut self) -> Option<EnergyRead> {
        None
    }
}

pub struct PowerAdapter {
    reporter: Option<EnergyReporter>,
    timeout: Duration,
}

impl PowerAdapter {
    /// Subscribes to the energy model immediately so the first refresh has a baseline
    pub fn new(timeout: Duration) -> Self {
        let reporter = EnergyReporter::open();
        if reporter.is_none() {
            debug!("IOReport energy model not available");
        }
        Self { reporter, timeout }
    }

    async fn power_mode(&self) -> PowerMode {
        match run_command("pmset", &["-g"], self.timeout).await {
            Ok(output) => parse_power_mode(&output),
            Err(e) => {
                debug!(error = %e, "power mode unavailable");
                PowerMode::Unknown
            }
        }
    }
}

#[async_trait]
impl Adapter for PowerAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Power
    }

    fn metrics(&self) -> &'static [Metric] {
        METRICS
    }

    async fn refresh(&mut self) -> Result<Reading, AdapterError> {
        let reporter = self
            .reporter
            .as_mut()
            .ok_or_else(|| AdapterError::Unsupported("IOReport energy model".to_string()))?;

        let read = reporter
            .read()
            .ok_or_else(|| AdapterError::process("IOReport", "energy sample delta failed"))?;

        let draw = match read {
            EnergyRead::Primed => None,
            EnergyRead::Delta { channels, .. } if channels.is_empty() => {
                return Err(AdapterError::parse("IOReport", "no energy channels in sample"));
            }
            EnergyRead::Delta { channels, elapsed } => Some(energy_to_watts(&channels, elapsed)),
        };

        let mode = self.power_mode().await;

        Ok(Reading::new()
            .with(Metric::CpuPower, draw.map(|d| d.cpu))
            .with(Metric::GpuPower, draw.map(|d| d.gpu))
            .with(Metric::AnePower, draw.map(|d| d.ane))
            .with(Metric::PackagePower, draw.map(|d| d.package()))
            .with_detail(Detail::PowerMode(mode)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn channel(name: &str, unit: &str, value: i64) -> EnergyChannel {
        EnergyChannel {
            name: name.to_string(),
            unit: unit.to_string(),
            value,
        }
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn converts_energy_units() {
        assert!(close(unit_to_joules(1500.0, "mJ"), 1.5));
        assert!(close(unit_to_joules(2_000_000.0, "uJ"), 2.0));
        assert!(close(unit_to_joules(3_000_000_000.0, "nJ"), 3.0));
        assert!(close(unit_to_joules(4_000_000.0, ""), 4.0));
    }

    #[test]
    fn sums_channels_per_subsystem() {
        let channels = vec![
            channel("ECPU", "mJ", 400),
            channel("PCPU", "mJ", 1600),
            channel("GPU Energy", "nJ", 500_000_000),
            channel("ANE", "uJ", 250_000),
            channel("DRAM", "mJ", 9_999),
        ];

        let draw = energy_to_watts(&channels, Duration::from_millis(500));
        assert!(close(draw.cpu, 4.0));
        assert!(close(draw.gpu, 1.0));
        assert!(close(draw.ane, 0.5));
        assert!(close(draw.package(), 5.5));
    }

    #[test]
    fn elapsed_is_floored() {
        let channels = vec![channel("CPU Energy", "mJ", 1)];
        let draw = energy_to_watts(&channels, Duration::ZERO);
        assert!(close(draw.cpu, 1.0));
    }

    #[test]
    fn parses_power_modes() {
        let low = "System-wide power settings:\nCurrently in use:\n lowpowermode         1\n sleep                1\n";
        let high = "Currently in use:\n lowpowermode         0\n highpowermode        1\n";
        let auto = "Currently in use:\n lowpowermode         0\n powermode            0\n";

        assert_eq!(parse_power_mode(low), PowerMode::LowPower);
        assert_eq!(parse_power_mode(high), PowerMode::HighPerformance);
        assert_eq!(parse_power_mode(auto), PowerMode::Automatic);
    }

    #[tokio::test]
    async fn missing_energy_model_is_unsupported() {
        let mut adapter = PowerAdapter {
            reporter: None,
            timeout: Duration::from_secs(1),
        };
        let err = adapter.refresh().await.unwrap_err();
        assert_eq!(err.kind(), crate::telemetry::ErrorKind::Unsupported);
    }
}
