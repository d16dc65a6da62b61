//! One sampling pass over every source, committed as a single tick

use chrono::Utc;
use futures::future::join_all;
use std::collections::{BTreeMap, BTreeSet};
use std::time::Instant;
use tokio::sync::watch;
use tracing::debug;

use super::store::TelemetryStore;
use crate::config::Config;
use crate::integrations::battery::BatteryAdapter;
use crate::integrations::power::PowerAdapter;
use crate::integrations::processes::{ProcessAdapter, SortKey};
use crate::integrations::source::SourceOutput;
use crate::integrations::{Adapter, Detail, Source};
use crate::telemetry::{Metric, Quality, Snapshot};

/// Outcome counts of one tick, for logging and the one-shot modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    pub tick: u64,
    pub fresh: usize,
    pub stale: usize,
    pub unavailable: usize,
    pub appended: usize,
}

/// Owns every source. Only this type commits to the `TelemetryStore`.
pub struct Acquisition {
    sources: Vec<Source>,
    enabled: BTreeSet<Metric>,
    store: TelemetryStore,
    tick: u64,
}

impl Acquisition {
    pub fn new(
        adapters: Vec<Box<dyn Adapter>>,
        stale_limit: u32,
        enabled: impl IntoIterator<Item = Metric>,
        store: TelemetryStore,
    ) -> Self {
        let enabled: BTreeSet<Metric> = enabled.into_iter().collect();
        let sources = adapters
            .into_iter()
            .filter(|a| a.metrics().iter().any(|m| enabled.contains(m)))
            .map(|a| Source::new(a, stale_limit))
            .collect();

        Self {
            sources,
            enabled,
            store,
            tick: 0,
        }
    }

    /// The production adapters, skipping sources whose metrics are all disabled
    pub fn from_config(
        config: &Config,
        store: TelemetryStore,
        sort: watch::Receiver<SortKey>,
    ) -> Self {
        let timeout = config.command_timeout();
        let adapters: Vec<Box<dyn Adapter>> = vec![
            Box::new(BatteryAdapter::new(timeout)),
            Box::new(PowerAdapter::new(timeout)),
            Box::new(ProcessAdapter::new(config.sampling.top_processes, sort)),
        ];

        Self::new(
            adapters,
            config.sampling.stale_limit,
            config.metrics.enabled.iter().copied(),
            store,
        )
    }

    pub fn store(&self) -> &TelemetryStore {
        &self.store
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Refresh every source and publish the results together.
    ///
    /// Sources run concurrently and a failing one never holds back the rest.
    pub async fn run_tick(&mut self) -> TickReport {
        let now = Instant::now();
        let outputs: Vec<SourceOutput> =
            join_all(self.sources.iter_mut().map(|source| source.refresh(now))).await;

        self.tick += 1;
        let mut snapshot = Snapshot::empty(now);
        snapshot.tick = self.tick;
        snapshot.captured_at = Utc::now();

        let mut report = TickReport {
            tick: self.tick,
            ..TickReport::default()
        };
        let mut samples = BTreeMap::new();

        for output in outputs {
            for sample in output.samples {
                if !self.enabled.contains(&sample.metric) {
                    continue;
                }
                match sample.quality() {
                    Quality::Fresh => report.fresh += 1,
                    Quality::Stale => report.stale += 1,
                    Quality::Unavailable => report.unavailable += 1,
                }
                samples.insert(sample.metric, sample);
            }

            match output.detail {
                Some(Detail::Battery {
                    state,
                    time_remaining,
                }) => {
                    snapshot.charge_state = state;
                    snapshot.time_remaining = time_remaining;
                }
                Some(Detail::PowerMode(mode)) => snapshot.power_mode = mode,
                Some(Detail::Processes(rows)) => snapshot.processes = rows,
                None => {}
            }
            snapshot.sources.push(output.status);
        }

        snapshot.samples = samples;
        let appended = self
            .store
            .commit(snapshot.samples.values().copied().collect::<Vec<_>>(), snapshot);
        report.appended = appended;

        debug!(
            tick = report.tick,
            fresh = report.fresh,
            stale = report.stale,
            unavailable = report.unavailable,
            "tick committed"
        );
        report
    }
}

impl std::fmt::Debug for Acquisition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Acquisition")
            .field("sources", &self.sources)
            .field("enabled", &self.enabled)
            .field("tick", &self.tick)
            .finish()
    }
}
