//! Battery adapter built on `pmset` and the AppleSmartBattery registry entry

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{Adapter, AdapterError, CommandRunner, Detail, Reading, SystemCommands};
use crate::telemetry::{ChargeState, Metric, SourceKind};

const METRICS: &[Metric] = &[
    Metric::BatteryPercent,
    Metric::BatteryChargeRate,
    Metric::BatteryCycles,
    Metric::BatteryHealth,
    Metric::BatteryTemperature,
];

static PERCENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3})%").expect("valid regex"));
static REMAINING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+):(\d{2}) remaining").expect("valid regex"));
static IOREG_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?m)^[\s|]*"([A-Za-z]+)" = (.+?)\s*$"#).expect("valid regex")
});

/// Battery line of `pmset -g batt`
#[derive(Debug, Clone, PartialEq)]
pub struct PmsetBattery {
    pub percent: f64,
    pub state: ChargeState,
    pub time_remaining: Option<Duration>,
}

/// Parse `pmset -g batt`.
///
/// Returns `Ok(None)` when the machine has no internal battery.
pub fn parse_pmset_batt(output: &str) -> Result<Option<PmsetBattery>, AdapterError> {
    let Some(line) = output.lines().find(|l| l.contains("InternalBattery")) else {
        return Ok(None);
    };

    let percent = PERCENT_RE
        .captures(line)
        .and_then(|c| c[1].parse::<f64>().ok())
        .filter(|p| (0.0..=100.0).contains(p))
        .ok_or_else(|| AdapterError::parse("pmset", format!("no percentage in {:?}", line.trim())))?;

    let state = line
        .split(';')
        .nth(1)
        .map(|s| parse_charge_state(s.trim()))
        .unwrap_or_default();

    let time_remaining = match state {
        ChargeState::Charging | ChargeState::Discharging => {
            REMAINING_RE.captures(line).and_then(|c| {
                let hours: u64 = c[1].parse().ok()?;
                let minutes: u64 = c[2].parse().ok()?;
                Some(Duration::from_secs(hours * 3600 + minutes * 60))
            })
        }
        _ => None,
    };

    Ok(Some(PmsetBattery {
        percent,
        state,
        time_remaining,
    }))
}

fn parse_charge_state(field: &str) -> ChargeState {
    match field.to_ascii_lowercase().as_str() {
        "charging" | "finishing charge" => ChargeState::Charging,
        "discharging" => ChargeState::Discharging,
        "charged" => ChargeState::Charged,
        "ac attached" => ChargeState::AcAttached,
        _ => ChargeState::Unknown,
    }
}

/// Top-level `"Key" = value` pairs of `ioreg -rn AppleSmartBattery`
pub fn parse_ioreg(output: &str) -> HashMap<String, String> {
    IOREG_KEY_RE
        .captures_iter(output)
        .map(|c| (c[1].to_string(), c[2].to_string()))
        .collect()
}

/// Registry integers are printed unsigned, so negative currents show up as
/// huge two's-complement values.
fn ioreg_int(props: &HashMap<String, String>, key: &str) -> Option<i64> {
    let raw = props.get(key)?.trim();
    raw.parse::<i64>()
        .ok()
        .or_else(|| raw.parse::<u64>().ok().map(|v| v as i64))
}

/// Metrics derived from the battery registry entry
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegistryBattery {
    pub charge_rate_watts: Option<f64>,
    pub cycles: Option<f64>,
    pub health_percent: Option<f64>,
    pub temperature_celsius: Option<f64>,
}

impl RegistryBattery {
    pub fn from_props(props: &HashMap<String, String>) -> Self {
        let voltage = ioreg_int(props, "Voltage");
        let amperage = ioreg_int(props, "Amperage").or_else(|| ioreg_int(props, "InstantAmperage"));
        let charge_rate_watts = voltage
            .zip(amperage)
            .map(|(mv, ma)| (mv as f64 / 1000.0) * (ma as f64 / 1000.0));

        let health_percent = ioreg_int(props, "AppleRawMaxCapacity")
            .zip(ioreg_int(props, "DesignCapacity"))
            .filter(|&(_, design)| design > 0)
            .map(|(max, design)| max as f64 / design as f64 * 100.0);

        Self {
            charge_rate_watts,
            cycles: ioreg_int(props, "CycleCount").map(|c| c as f64),
            health_percent,
            temperature_celsius: ioreg_int(props, "Temperature").map(|t| t as f64 / 100.0),
        }
    }
}

pub struct BatteryAdapter {
    runner: Box<dyn CommandRunner>,
    timeout: Duration,
}

impl BatteryAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self::with_runner(Box::new(SystemCommands), timeout)
    }

    pub fn with_runner(runner: Box<dyn CommandRunner>, timeout: Duration) -> Self {
        Self { runner, timeout }
    }

    /// A failed `ioreg` fails the whole refresh. Only keys absent from a
    /// successful read count as missing.
    async fn registry(&self) -> Result<RegistryBattery, AdapterError> {
        let output = self
            .runner
            .run("ioreg", &["-rn", "AppleSmartBattery"], self.timeout)
            .await
            .map_err(|e| {
                debug!(error = %e, "battery registry read failed");
                e
            })?;
        Ok(RegistryBattery::from_props(&parse_ioreg(&output)))
    }
}

#[async_trait]
impl Adapter for BatteryAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Battery
    }

    fn metrics(&self) -> &'static [Metric] {
        METRICS
    }

    async fn refresh(&mut self) -> Result<Reading, AdapterError> {
        let output = self.runner.run("pmset", &["-g", "batt"], self.timeout).await?;
        let battery = parse_pmset_batt(&output)?
            .ok_or_else(|| AdapterError::Unsupported("internal battery".to_string()))?;

        let registry = self.registry().await?;

        Ok(Reading::new()
            .with(Metric::BatteryPercent, Some(battery.percent))
            .with(Metric::BatteryChargeRate, registry.charge_rate_watts)
            .with(Metric::BatteryCycles, registry.cycles)
            .with(Metric::BatteryHealth, registry.health_percent)
            .with(Metric::BatteryTemperature, registry.temperature_celsius)
            .with_detail(Detail::Battery {
                state: battery.state,
                time_remaining: battery.time_remaining,
            }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integrations::{MockCommandRunner, Source};
    use crate::telemetry::{ErrorKind, Quality, Sample, Value};
    use pretty_assertions::assert_eq;
    use std::time::Instant;

    const DISCHARGING: &str = "Now drawing from 'Battery Power'\n \
        -InternalBattery-0 (id=17039459)\t40%; discharging; 3:12 remaining present: true\n";

    const CHARGING: &str = "Now drawing from 'AC Power'\n \
        -InternalBattery-0 (id=17039459)\t55%; charging; 1:05 remaining present: true\n";

    const CHARGED: &str = "Now drawing from 'AC Power'\n \
        -InternalBattery-0 (id=17039459)\t100%; charged; 0:00 remaining present: true\n";

    const AC_ATTACHED: &str = "Now drawing from 'AC Power'\n \
        -InternalBattery-0 (id=17039459)\t80%; AC attached; not charging present: true\n";

    const NO_ESTIMATE: &str = "Now drawing from 'Battery Power'\n \
        -InternalBattery-0 (id=17039459)\t97%; discharging; (no estimate) present: true\n";

    const DESKTOP: &str = "Now drawing from 'AC Power'\n";

    const IOREG: &str = r#"+-o AppleSmartBattery  <class AppleSmartBattery, id 0x100000254, registered, matched, active, busy 0 (0 ms), retain 8>
    {
      "PostChargeWaitSeconds" = 120
      "AppleRawCurrentCapacity" = 2190
      "Voltage" = 11920
      "DesignCapacity" = 5103
      "AppleRawMaxCapacity" = 4593
      "CycleCount" = 212
      "Amperage" = 18446744073709550616
      "InstantAmperage" = 18446744073709550600
      "Temperature" = 3055
      "ExternalConnected" = No
      "BatteryData" = {"Serial"="F5D1234","DesignCapacity"=5103}
    }
"#;

    #[test]
    fn parses_discharging_battery() {
        let battery = parse_pmset_batt(DISCHARGING).unwrap().unwrap();
        assert_eq!(
            battery,
            PmsetBattery {
                percent: 40.0,
                state: ChargeState::Discharging,
                time_remaining: Some(Duration::from_secs(3 * 3600 + 12 * 60)),
            }
        );
    }

    #[test]
    fn parses_charge_states() {
        let charging = parse_pmset_batt(CHARGING).unwrap().unwrap();
        assert_eq!(charging.state, ChargeState::Charging);
        assert_eq!(charging.time_remaining, Some(Duration::from_secs(65 * 60)));

        let charged = parse_pmset_batt(CHARGED).unwrap().unwrap();
        assert_eq!(charged.state, ChargeState::Charged);
        assert_eq!(charged.percent, 100.0);
        assert_eq!(charged.time_remaining, None);

        let attached = parse_pmset_batt(AC_ATTACHED).unwrap().unwrap();
        assert_eq!(attached.state, ChargeState::AcAttached);
        assert_eq!(attached.time_remaining, None);
    }

    #[test]
    fn no_estimate_has_no_time_remaining() {
        let battery = parse_pmset_batt(NO_ESTIMATE).unwrap().unwrap();
        assert_eq!(battery.percent, 97.0);
        assert_eq!(battery.time_remaining, None);
    }

    #[test]
    fn desktop_has_no_battery() {
        assert_eq!(parse_pmset_batt(DESKTOP).unwrap(), None);
        assert_eq!(parse_pmset_batt("").unwrap(), None);
    }

    #[test]
    fn garbled_battery_line_is_a_parse_error() {
        let err = parse_pmset_batt(" -InternalBattery-0 (id=1)\t??; discharging").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
    }

    #[test]
    fn reads_registry_properties() {
        let props = parse_ioreg(IOREG);
        assert_eq!(props.get("CycleCount").map(String::as_str), Some("212"));
        assert_eq!(props.get("ExternalConnected").map(String::as_str), Some("No"));
        assert!(!props.contains_key("Serial"));

        let registry = RegistryBattery::from_props(&props);
        assert_eq!(registry.cycles, Some(212.0));
        assert_eq!(registry.temperature_celsius, Some(30.55));

        // -1000 mA at 11.92 V
        let rate = registry.charge_rate_watts.unwrap();
        assert!((rate + 11.92).abs() < 1e-9, "rate was {}", rate);

        let health = registry.health_percent.unwrap();
        assert!((health - 90.005).abs() < 0.01, "health was {}", health);
    }

    #[test]
    fn missing_registry_keys_stay_missing() {
        let props = parse_ioreg("  \"CycleCount\" = 7\n");
        let registry = RegistryBattery::from_props(&props);

        assert_eq!(registry.cycles, Some(7.0));
        assert_eq!(registry.charge_rate_watts, None);
        assert_eq!(registry.health_percent, None);
        assert_eq!(registry.temperature_celsius, None);
    }

    #[test]
    fn zero_design_capacity_has_no_health() {
        let props = parse_ioreg("\"AppleRawMaxCapacity\" = 4000\n\"DesignCapacity\" = 0\n");
        assert_eq!(RegistryBattery::from_props(&props).health_percent, None);
    }

    fn scripted(
        mut ioreg: impl FnMut() -> Result<String, AdapterError> + Send + 'static,
    ) -> BatteryAdapter {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|tool, _, _| tool == "pmset")
            .returning(|_, _, _| Ok(DISCHARGING.to_string()));
        runner
            .expect_run()
            .withf(|tool, _, _| tool == "ioreg")
            .returning(move |_, _, _| ioreg());
        BatteryAdapter::with_runner(Box::new(runner), Duration::from_secs(2))
    }

    fn sample_of(samples: &[Sample], metric: Metric) -> Sample {
        *samples
            .iter()
            .find(|s| s.metric == metric)
            .expect("metric reported")
    }

    #[tokio::test]
    async fn refresh_combines_pmset_and_registry() {
        let mut adapter = scripted(|| Ok(IOREG.to_string()));
        let reading = adapter.refresh().await.unwrap();

        assert_eq!(reading.value(Metric::BatteryPercent), Some(40.0));
        assert_eq!(reading.value(Metric::BatteryCycles), Some(212.0));
        assert_eq!(
            reading.detail,
            Some(Detail::Battery {
                state: ChargeState::Discharging,
                time_remaining: Some(Duration::from_secs(3 * 3600 + 12 * 60)),
            })
        );
    }

    #[tokio::test]
    async fn failed_registry_read_fails_the_refresh() {
        let mut adapter = scripted(|| Err(AdapterError::process("ioreg", "exited with 1")));
        let err = adapter.refresh().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Process);
    }

    #[tokio::test]
    async fn registry_failure_keeps_values_stale_and_counts() {
        let mut calls = 0;
        let adapter = scripted(move || {
            calls += 1;
            if calls == 1 {
                Ok(IOREG.to_string())
            } else {
                Err(AdapterError::process("ioreg", "exited with 1"))
            }
        });
        let mut source = Source::new(Box::new(adapter), 5);
        let t1 = Instant::now();

        let first = source.refresh(t1).await;
        assert_eq!(sample_of(&first.samples, Metric::BatteryCycles).value, Value::Fresh(212.0));
        assert_eq!(first.status.consecutive_failures, 0);

        let second = source.refresh(t1 + Duration::from_secs(1)).await;
        let cycles = sample_of(&second.samples, Metric::BatteryCycles);
        assert_eq!(cycles.value, Value::Stale(212.0));
        assert_eq!(cycles.timestamp, t1);
        assert_eq!(
            sample_of(&second.samples, Metric::BatteryChargeRate).quality(),
            Quality::Stale
        );
        assert_eq!(second.status.consecutive_failures, 1);
        assert_eq!(second.status.last_error, Some(ErrorKind::Process));
    }
}
