//! Shared telemetry: history plus the latest snapshot, committed together

use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Instant;

use crate::telemetry::{HistoryStore, Sample, Snapshot};

/// Everything the rendering side is allowed to read
#[derive(Debug)]
pub struct Telemetry {
    pub history: HistoryStore,
    pub snapshot: Arc<Snapshot>,
}

/// Handle to the telemetry shared between acquisition and rendering.
///
/// Only the acquisition side commits. A commit appends a whole tick and swaps
/// the snapshot under one write lock, so readers see either the previous tick
/// or the new one in full.
#[derive(Debug, Clone)]
pub struct TelemetryStore {
    inner: Arc<RwLock<Telemetry>>,
}

impl TelemetryStore {
    pub fn new(history: HistoryStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Telemetry {
                history,
                snapshot: Arc::new(Snapshot::empty(Instant::now())),
            })),
        }
    }

    pub fn read(&self) -> parking_lot::RwLockReadGuard<'_, Telemetry> {
        self.inner.read()
    }

    /// The latest published snapshot
    pub fn snapshot(&self) -> Arc<Snapshot> {
        Arc::clone(&self.inner.read().snapshot)
    }

    /// Publish one tick. Returns how many samples were appended to history.
    pub fn commit(&self, samples: impl IntoIterator<Item = Sample>, snapshot: Snapshot) -> usize {
        let snapshot = Arc::new(snapshot);
        let mut telemetry = self.inner.write();
        let appended = samples
            .into_iter()
            .filter(|sample| telemetry.history.append(*sample))
            .count();
        telemetry.snapshot = snapshot;
        appended
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::{Metric, Quality};
    use std::collections::BTreeMap;
    use std::thread;
    use std::time::Duration;

    const TRACKED: [Metric; 3] = [Metric::CpuPower, Metric::GpuPower, Metric::BatteryPercent];

    fn tick(n: u64, at: Instant) -> (Vec<Sample>, Snapshot) {
        let samples: Vec<Sample> = TRACKED
            .iter()
            .map(|&m| Sample::fresh(m, at, n as f64))
            .collect();
        let mut snapshot = Snapshot::empty(at);
        snapshot.tick = n;
        snapshot.samples = samples.iter().map(|s| (s.metric, *s)).collect::<BTreeMap<_, _>>();
        (samples, snapshot)
    }

    #[test]
    fn commit_appends_and_publishes() {
        let store = TelemetryStore::new(HistoryStore::new(TRACKED, 16));
        let mut samples = tick(1, Instant::now()).0;
        samples.push(Sample::unavailable(Metric::GpuPower, Instant::now()));
        let (_, snapshot) = tick(1, Instant::now());

        assert_eq!(store.commit(samples, snapshot), 3);
        assert_eq!(store.snapshot().tick, 1);
        assert_eq!(store.read().history.len(Metric::GpuPower), 1);
        assert_eq!(
            store.read().history.latest(Metric::CpuPower).quality(),
            Quality::Fresh
        );
    }

    #[test]
    fn readers_never_see_a_mixed_tick() {
        let store = TelemetryStore::new(HistoryStore::new(TRACKED, 64));
        let base = Instant::now();

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = store.clone();
                thread::spawn(move || {
                    for _ in 0..2_000 {
                        let telemetry = store.read();
                        let tick = telemetry.snapshot.tick as f64;
                        for metric in TRACKED {
                            if telemetry.snapshot.tick == 0 {
                                continue;
                            }
                            assert_eq!(telemetry.snapshot.value(metric), Some(tick));
                            assert_eq!(telemetry.history.latest(metric).value(), Some(tick));
                        }
                    }
                })
            })
            .collect();

        for n in 1..=500u64 {
            let (samples, snapshot) = tick(n, base + Duration::from_millis(n));
            store.commit(samples, snapshot);
        }

        for reader in readers {
            reader.join().unwrap();
        }
        assert_eq!(store.snapshot().tick, 500);
    }
}
