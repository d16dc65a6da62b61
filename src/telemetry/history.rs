//! Bounded per-metric time series backing the graphs

use std::collections::{BTreeMap, VecDeque};
use std::time::{Duration, Instant};

use super::{Metric, Sample};

/// Fixed-capacity FIFO of samples for one metric, oldest first
#[derive(Debug, Clone)]
pub struct HistorySeries {
    capacity: usize,
    samples: VecDeque<Sample>,
}

impl HistorySeries {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            samples: VecDeque::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Append a sample, evicting the oldest one when full.
    ///
    /// Unavailable samples and samples older than the current tail are
    /// rejected; returns whether the sample was stored.
    pub fn append(&mut self, sample: Sample) -> bool {
        if !sample.is_available() {
            return false;
        }
        if let Some(last) = self.samples.back() {
            if sample.timestamp < last.timestamp {
                return false;
            }
        }
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
        true
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + Clone + '_ {
        self.samples.iter()
    }

    /// Samples captured within `window` before `now`, oldest first
    pub fn range(&self, window: Duration, now: Instant) -> impl Iterator<Item = &Sample> + Clone + '_ {
        let start = match now.checked_sub(window) {
            Some(cutoff) => self.samples.partition_point(|s| s.timestamp < cutoff),
            None => 0,
        };
        self.samples.range(start..)
    }
}

/// One `HistorySeries` per tracked metric
#[derive(Debug, Clone)]
pub struct HistoryStore {
    capacity: usize,
    series: BTreeMap<Metric, HistorySeries>,
}

impl HistoryStore {
    pub fn new(metrics: impl IntoIterator<Item = Metric>, capacity: usize) -> Self {
        let series = metrics
            .into_iter()
            .map(|m| (m, HistorySeries::new(capacity)))
            .collect();
        Self { capacity, series }
    }

    /// Samples needed to cover `retention` at the fastest sampling rate
    pub fn capacity_for(retention: Duration, min_interval: Duration) -> usize {
        let step = min_interval.as_millis().max(1);
        let slots = retention.as_millis().div_ceil(step);
        usize::try_from(slots).unwrap_or(usize::MAX).max(1)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn metrics(&self) -> impl Iterator<Item = Metric> + '_ {
        self.series.keys().copied()
    }

    pub fn append(&mut self, sample: Sample) -> bool {
        match self.series.get_mut(&sample.metric) {
            Some(series) => series.append(sample),
            None => false,
        }
    }

    pub fn len(&self, metric: Metric) -> usize {
        self.series.get(&metric).map_or(0, HistorySeries::len)
    }

    /// Most recent sample, or `Unavailable` when nothing was ever stored
    pub fn latest(&self, metric: Metric) -> Sample {
        self.series
            .get(&metric)
            .and_then(|s| s.latest())
            .copied()
            .unwrap_or_else(|| Sample::unavailable(metric, Instant::now()))
    }

    /// Trailing window ending now
    pub fn range(&self, metric: Metric, window: Duration) -> impl Iterator<Item = &Sample> + Clone + '_ {
        self.range_at(metric, window, Instant::now())
    }

    pub fn range_at(
        &self,
        metric: Metric,
        window: Duration,
        now: Instant,
    ) -> impl Iterator<Item = &Sample> + Clone + '_ {
        self.series
            .get(&metric)
            .into_iter()
            .flat_map(move |s| s.range(window, now))
    }
}

/// Average samples into at most `width` buckets for a graph row
pub fn downsample<'a>(samples: impl Iterator<Item = &'a Sample>, width: usize) -> Vec<f64> {
    let values: Vec<f64> = samples.filter_map(Sample::value).collect();
    if width == 0 || values.is_empty() {
        return Vec::new();
    }
    if values.len() <= width {
        return values;
    }

    (0..width)
        .map(|bucket| {
            let start = bucket * values.len() / width;
            let end = ((bucket + 1) * values.len() / width).max(start + 1);
            let chunk = &values[start..end];
            chunk.iter().sum::<f64>() / chunk.len() as f64
        })
        .collect()
}
