//! Per-adapter bookkeeping: last good values, failure counting, disablement

use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::{Adapter, AdapterError, Detail};
use crate::telemetry::{ErrorKind, Metric, Sample, SourceKind, SourceStatus};

/// State one adapter keeps between ticks. Only its own `Source` touches it.
#[derive(Debug, Default)]
struct SourceState {
    last_good: BTreeMap<Metric, Sample>,
    last_detail: Option<Detail>,
    consecutive_failures: u32,
    total_failures: u64,
    last_error: Option<ErrorKind>,
    disabled: bool,
}

/// What one source contributes to a tick
#[derive(Debug, Clone)]
pub struct SourceOutput {
    pub samples: Vec<Sample>,
    pub detail: Option<Detail>,
    pub status: SourceStatus,
}

/// An adapter plus the fallback policy applied to its results
pub struct Source {
    adapter: Box<dyn Adapter>,
    state: SourceState,
    stale_limit: u32,
}

impl Source {
    pub fn new(adapter: Box<dyn Adapter>, stale_limit: u32) -> Self {
        Self {
            adapter,
            state: SourceState::default(),
            stale_limit,
        }
    }

    pub fn kind(&self) -> SourceKind {
        self.adapter.kind()
    }

    pub fn metrics(&self) -> &'static [Metric] {
        self.adapter.metrics()
    }

    #[cfg(test)]
    pub fn is_disabled(&self) -> bool {
        self.state.disabled
    }

    pub fn status(&self) -> SourceStatus {
        SourceStatus {
            kind: self.kind(),
            consecutive_failures: self.state.consecutive_failures,
            total_failures: self.state.total_failures,
            last_error: self.state.last_error,
            disabled: self.state.disabled,
        }
    }

    /// Refresh the adapter once and turn the outcome into samples.
    ///
    /// Never fails: every adapter error ends up as stale or unavailable samples.
    pub async fn refresh(&mut self, now: Instant) -> SourceOutput {
        if self.state.disabled {
            return self.unavailable(now);
        }

        match self.adapter.refresh().await {
            Ok(reading) => {
                if self.state.consecutive_failures > 0 {
                    info!(
                        source = %self.kind(),
                        failures = self.state.consecutive_failures,
                        "source recovered"
                    );
                }
                self.state.consecutive_failures = 0;

                let mut samples = Vec::with_capacity(self.metrics().len());
                for &metric in self.metrics() {
                    match reading.value(metric) {
                        Some(value) => {
                            let sample = Sample::fresh(metric, now, value);
                            self.state.last_good.insert(metric, sample);
                            samples.push(sample);
                        }
                        None => {
                            self.state.last_good.remove(&metric);
                            samples.push(Sample::unavailable(metric, now));
                        }
                    }
                }
                self.state.last_detail = reading.detail;

                SourceOutput {
                    samples,
                    detail: self.state.last_detail.clone(),
                    status: self.status(),
                }
            }
            Err(AdapterError::Unsupported(what)) => {
                info!(source = %self.kind(), %what, "source unsupported, disabling");
                self.state.disabled = true;
                self.state.last_error = Some(ErrorKind::Unsupported);
                self.state.last_good.clear();
                self.state.last_detail = None;
                self.unavailable(now)
            }
            Err(err) => self.record_failure(err, now),
        }
    }

    fn record_failure(&mut self, err: AdapterError, now: Instant) -> SourceOutput {
        self.state.consecutive_failures = self.state.consecutive_failures.saturating_add(1);
        self.state.total_failures += 1;
        self.state.last_error = Some(err.kind());

        if self.state.consecutive_failures == 1 {
            warn!(source = %self.kind(), error = %err, "source refresh failed");
        } else {
            debug!(
                source = %self.kind(),
                failures = self.state.consecutive_failures,
                error = %err,
                "source still failing"
            );
        }

        if self.state.consecutive_failures > self.stale_limit {
            return self.unavailable(now);
        }

        let samples = self
            .metrics()
            .iter()
            .map(|&metric| match self.state.last_good.get(&metric) {
                Some(good) => good.into_stale(),
                None => Sample::unavailable(metric, now),
            })
            .collect();

        SourceOutput {
            samples,
            detail: self.state.last_detail.clone(),
            status: self.status(),
        }
    }

    fn unavailable(&self, now: Instant) -> SourceOutput {
        SourceOutput {
            samples: self
                .metrics()
                .iter()
                .map(|&metric| Sample::unavailable(metric, now))
                .collect(),
            detail: None,
            status: self.status(),
        }
    }
}

impl std::fmt::Debug for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Source")
            .field("kind", &self.kind())
            .field("state", &self.state)
            .field("stale_limit", &self.stale_limit)
            .finish()
    }
}
