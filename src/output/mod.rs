//! One-shot `debug` and `pipe` modes over the same acquisition core

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{self, Write as _};
use std::io::{self, Write};
use std::time::{Duration, Instant};
use tokio::sync::watch;

use crate::config::Config;
use crate::core::acquisition::Acquisition;
use crate::core::store::{Telemetry, TelemetryStore};
use crate::integrations::processes::SortKey;
use crate::telemetry::{
    ChargeState, HistoryStore, Metric, PowerMode, ProcessInfo, Quality, Snapshot, SourceStatus,
};

/// One metric as written by `pipe`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricRecord {
    pub value: Option<f64>,
    pub quality: Quality,
    pub age_ms: u64,
}

/// A snapshot flattened for JSON lines
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotRecord {
    pub tick: u64,
    pub captured_at: chrono::DateTime<chrono::Utc>,
    pub metrics: BTreeMap<Metric, MetricRecord>,
    pub charge_state: ChargeState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_remaining_secs: Option<u64>,
    pub power_mode: PowerMode,
    pub processes: Vec<ProcessInfo>,
    pub sources: Vec<SourceStatus>,
}

impl SnapshotRecord {
    pub fn new(
        snapshot: &Snapshot,
        metrics: impl IntoIterator<Item = Metric>,
        now: Instant,
    ) -> Self {
        let metrics = metrics
            .into_iter()
            .map(|metric| {
                let sample = snapshot.sample(metric);
                let age = now.saturating_duration_since(sample.timestamp);
                (
                    metric,
                    MetricRecord {
                        value: sample.value(),
                        quality: sample.quality(),
                        age_ms: age.as_millis() as u64,
                    },
                )
            })
            .collect();

        Self {
            tick: snapshot.tick,
            captured_at: snapshot.captured_at,
            metrics,
            charge_state: snapshot.charge_state,
            time_remaining_secs: snapshot.time_remaining.map(|d| d.as_secs()),
            power_mode: snapshot.power_mode,
            processes: snapshot.processes.clone(),
            sources: snapshot.sources.clone(),
        }
    }
}

fn acquisition(config: &Config) -> Acquisition {
    let store = TelemetryStore::new(HistoryStore::new(
        config.metrics.enabled.iter().copied(),
        config.history_capacity(),
    ));
    // no key input in one-shot modes, so the sender can go
    let (_, sort_rx) = watch::channel::<SortKey>(config.display.process_sort);
    Acquisition::from_config(config, store, sort_rx)
}

/// Power and process CPU are deltas, so the first pass primes them
async fn settle(acquisition: &mut Acquisition, settle: Duration) {
    if settle.is_zero() {
        return;
    }
    acquisition.run_tick().await;
    tokio::time::sleep(settle).await;
}

/// Human-readable report of one pass, including source diagnostics
pub fn report(telemetry: &Telemetry) -> Result<String, fmt::Error> {
    let snapshot = &telemetry.snapshot;
    let mut out = String::new();

    writeln!(
        out,
        "amperage tick #{} at {}",
        snapshot.tick,
        snapshot.captured_at.to_rfc3339()
    )?;
    writeln!(out)?;
    writeln!(out, "{:<20} {:>14} {:<12}", "METRIC", "VALUE", "QUALITY")?;
    writeln!(out, "{}", "-".repeat(48))?;
    for metric in telemetry.history.metrics() {
        let sample = snapshot.sample(metric);
        let quality = match sample.quality() {
            Quality::Fresh => "fresh",
            Quality::Stale => "stale",
            Quality::Unavailable => "unavailable",
        };
        writeln!(out, "{:<20} {:>14} {:<12}", metric.name(), sample.format(), quality)?;
    }

    writeln!(out)?;
    writeln!(out, "charge state: {}", snapshot.charge_state.label())?;
    if let Some(left) = snapshot.time_remaining {
        writeln!(out, "time remaining: {}m", left.as_secs() / 60)?;
    }
    writeln!(out, "power mode: {}", snapshot.power_mode.label())?;

    if !snapshot.processes.is_empty() {
        writeln!(out)?;
        writeln!(out, "{:>7}  {:<28} {:>8} {:>12}", "PID", "NAME", "CPU%", "MEM")?;
        for p in &snapshot.processes {
            writeln!(
                out,
                "{:>7}  {:<28} {:>8.1} {:>12}",
                p.pid,
                p.name,
                p.cpu_percent,
                humansize::format_size(p.memory_bytes, humansize::BINARY)
            )?;
        }
    }

    writeln!(out)?;
    writeln!(
        out,
        "{:<12} {:<10} {:>8} {:>8}  LAST ERROR",
        "SOURCE", "STATUS", "STREAK", "TOTAL"
    )?;
    writeln!(out, "{}", "-".repeat(56))?;
    for status in &snapshot.sources {
        let state = if status.disabled {
            "disabled"
        } else if status.consecutive_failures > 0 {
            "failing"
        } else {
            "ok"
        };
        writeln!(
            out,
            "{:<12} {:<10} {:>8} {:>8}  {}",
            status.kind.label(),
            state,
            status.consecutive_failures,
            status.total_failures,
            status.last_error.map_or("-", |e| e.label())
        )?;
    }

    Ok(out)
}

/// `amperage debug`: one reported pass, printed once
pub async fn debug(config: &Config, settle_for: Duration) -> Result<()> {
    let mut acquisition = acquisition(config);
    settle(&mut acquisition, settle_for).await;
    let tick = acquisition.run_tick().await;
    tracing::debug!(?tick, "debug pass complete");

    let text = report(&acquisition.store().read()).context("failed to format report")?;
    print!("{}", text);
    Ok(())
}

fn write_line(record: &SnapshotRecord) -> io::Result<()> {
    let mut stdout = io::stdout().lock();
    serde_json::to_writer(&mut stdout, record)?;
    writeln!(stdout)?;
    stdout.flush()
}

/// `amperage pipe`: `count` passes, one JSON object per line. Zero runs until stdout closes.
pub async fn pipe(
    config: &Config,
    count: u64,
    interval: Duration,
    settle_for: Duration,
) -> Result<()> {
    let mut acquisition = acquisition(config);
    settle(&mut acquisition, settle_for).await;

    let metrics: Vec<Metric> = Metric::ALL
        .into_iter()
        .filter(|m| config.is_enabled(*m))
        .collect();
    let mut written = 0u64;
    loop {
        let started = Instant::now();
        acquisition.run_tick().await;

        let record = SnapshotRecord::new(
            &acquisition.store().snapshot(),
            metrics.iter().copied(),
            Instant::now(),
        );
        match write_line(&record) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                tracing::debug!(ticks = acquisition.tick(), "stdout closed, stopping");
                return Ok(());
            }
            Err(e) => return Err(e).context("failed to write sample"),
        }

        written += 1;
        if count != 0 && written >= count {
            return Ok(());
        }
        tokio::time::sleep(interval.saturating_sub(started.elapsed())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{ErrorKind, Sample, SourceKind};
    use pretty_assertions::assert_eq;

    fn snapshot(now: Instant) -> Snapshot {
        let mut snapshot = Snapshot::empty(now);
        snapshot.tick = 7;
        snapshot.charge_state = ChargeState::Discharging;
        snapshot.time_remaining = Some(Duration::from_secs(90 * 60));
        snapshot.power_mode = PowerMode::LowPower;
        snapshot
            .samples
            .insert(Metric::BatteryPercent, Sample::fresh(Metric::BatteryPercent, now, 81.0));
        snapshot.samples.insert(
            Metric::CpuPower,
            Sample::fresh(Metric::CpuPower, now - Duration::from_secs(3), 2.5).into_stale(),
        );
        let mut power = SourceStatus::new(SourceKind::Power);
        power.consecutive_failures = 2;
        power.total_failures = 4;
        power.last_error = Some(ErrorKind::Timeout);
        snapshot.sources = vec![SourceStatus::new(SourceKind::Battery), power];
        snapshot
    }

    #[test]
    fn record_carries_quality_and_age() {
        let now = Instant::now();
        let record = SnapshotRecord::new(
            &snapshot(now),
            [Metric::BatteryPercent, Metric::CpuPower, Metric::GpuPower],
            now,
        );

        assert_eq!(
            record.metrics[&Metric::BatteryPercent],
            MetricRecord { value: Some(81.0), quality: Quality::Fresh, age_ms: 0 }
        );
        assert_eq!(record.metrics[&Metric::CpuPower].quality, Quality::Stale);
        assert_eq!(record.metrics[&Metric::CpuPower].age_ms, 3000);
        assert_eq!(record.metrics[&Metric::GpuPower].value, None);
        assert_eq!(record.time_remaining_secs, Some(5400));
    }

    #[test]
    fn record_serializes_as_one_line() {
        let now = Instant::now();
        let record = SnapshotRecord::new(&snapshot(now), [Metric::BatteryPercent], now);
        let json = serde_json::to_string(&record).unwrap();

        assert!(!json.contains('\n'));
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["tick"], 7);
        assert_eq!(value["power_mode"], "low-power");
        assert_eq!(value["metrics"]["battery-percent"]["quality"], "fresh");
        assert_eq!(value["sources"][1]["last_error"], "timeout");
    }

    #[test]
    fn report_lists_metrics_and_failing_sources() {
        let now = Instant::now();
        let store = TelemetryStore::new(HistoryStore::new(
            [Metric::BatteryPercent, Metric::CpuPower, Metric::GpuPower],
            8,
        ));
        store.commit(Vec::<Sample>::new(), snapshot(now));
        let text = report(&store.read()).unwrap();

        assert!(text.contains("tick #7"));
        assert!(text.contains("81.0%"));
        assert!(text.contains("stale"));
        assert!(text.contains("unavailable"));
        assert!(text.contains("failing"));
        assert!(text.contains("timeout"));
    }
}
