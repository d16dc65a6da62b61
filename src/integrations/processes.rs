//! Process table adapter backed by a reusable `sysinfo::System`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::ffi::OsStr;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System};
use tokio::sync::watch;

use super::{Adapter, AdapterError, Detail, Reading};
use crate::telemetry::{Metric, ProcessInfo, SourceKind};

const METRICS: &[Metric] = &[Metric::ProcessCpu, Metric::ProcessMemory];

/// Column the top-N table is ranked by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Cpu,
    Memory,
}

impl SortKey {
    pub fn toggle(self) -> Self {
        match self {
            Self::Cpu => Self::Memory,
            Self::Memory => Self::Cpu,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Cpu => "CPU",
            Self::Memory => "memory",
        }
    }
}

/// Highest usage first, lowest pid among equals
fn rank(a: &ProcessInfo, b: &ProcessInfo, key: SortKey) -> Ordering {
    let by_usage = match key {
        SortKey::Cpu => b.cpu_percent.total_cmp(&a.cpu_percent),
        SortKey::Memory => b.memory_bytes.cmp(&a.memory_bytes),
    };
    by_usage.then_with(|| a.pid.cmp(&b.pid))
}

/// Keep the `n` heaviest processes, sorted. Only the kept rows are fully sorted.
pub fn top_n(mut processes: Vec<ProcessInfo>, n: usize, key: SortKey) -> Vec<ProcessInfo> {
    if n == 0 {
        return Vec::new();
    }
    if processes.len() > n {
        processes.select_nth_unstable_by(n - 1, |a, b| rank(a, b, key));
        processes.truncate(n);
    }
    processes.sort_unstable_by(|a, b| rank(a, b, key));
    processes
}

pub struct ProcessAdapter {
    sys: System,
    limit: usize,
    sort: watch::Receiver<SortKey>,
}

impl ProcessAdapter {
    pub fn new(limit: usize, sort: watch::Receiver<SortKey>) -> Self {
        // Prime CPU counters so the first refresh reports real usage
        let mut sys = System::new();
        sys.refresh_processes_specifics(ProcessesToUpdate::All, Self::refresh_kind());
        Self { sys, limit, sort }
    }

    fn refresh_kind() -> ProcessRefreshKind {
        ProcessRefreshKind::new().with_cpu().with_memory()
    }

    fn collect(&self) -> Vec<ProcessInfo> {
        self.sys
            .processes()
            .values()
            .map(|process| ProcessInfo {
                pid: process.pid().as_u32(),
                name: OsStr::new(process.name()).to_string_lossy().into_owned(),
                cpu_percent: f64::from(process.cpu_usage()),
                memory_bytes: process.memory(),
            })
            .collect()
    }
}

#[async_trait]
impl Adapter for ProcessAdapter {
    fn kind(&self) -> SourceKind {
        SourceKind::Processes
    }

    fn metrics(&self) -> &'static [Metric] {
        METRICS
    }

    async fn refresh(&mut self) -> Result<Reading, AdapterError> {
        self.sys
            .refresh_processes_specifics(ProcessesToUpdate::All, Self::refresh_kind());

        let processes = self.collect();
        if processes.is_empty() {
            return Err(AdapterError::process("sysinfo", "process table is empty"));
        }

        let total_cpu: f64 = processes.iter().map(|p| p.cpu_percent).sum();
        let total_memory: u64 = processes.iter().map(|p| p.memory_bytes).sum();
        let key = *self.sort.borrow();

        Ok(Reading::new()
            .with(Metric::ProcessCpu, Some(total_cpu))
            .with(Metric::ProcessMemory, Some(total_memory as f64))
            .with_detail(Detail::Processes(top_n(processes, self.limit, key))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn simulated(count: u32) -> Vec<ProcessInfo> {
        (1..=count)
            .map(|pid| ProcessInfo {
                pid,
                name: format!("proc-{}", pid),
                // many ties on purpose
                cpu_percent: f64::from(pid % 17),
                memory_bytes: u64::from(pid % 23) * 1024,
            })
            .collect()
    }

    #[test]
    fn top_five_by_cpu() {
        let top = top_n(simulated(200), 5, SortKey::Cpu);

        assert_eq!(top.len(), 5);
        assert!(top.windows(2).all(|w| w[0].cpu_percent >= w[1].cpu_percent));
        assert!(top.iter().all(|p| p.cpu_percent == 16.0));
        // pids with 16% cpu: 16, 33, 50, 67, 84, ...
        let pids: Vec<u32> = top.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![16, 33, 50, 67, 84]);
    }

    #[test]
    fn top_by_memory_breaks_ties_by_pid() {
        let top = top_n(simulated(200), 3, SortKey::Memory);
        let pids: Vec<u32> = top.iter().map(|p| p.pid).collect();
        // pid % 23 == 22: 22, 45, 68, ...
        assert_eq!(pids, vec![22, 45, 68]);
    }

    #[test]
    fn fewer_processes_than_limit_are_all_sorted() {
        let top = top_n(simulated(4), 10, SortKey::Cpu);
        let pids: Vec<u32> = top.iter().map(|p| p.pid).collect();
        assert_eq!(pids, vec![4, 3, 2, 1]);
    }

    #[test]
    fn zero_limit_is_empty() {
        assert!(top_n(simulated(10), 0, SortKey::Cpu).is_empty());
    }

    #[test]
    fn sort_key_toggles() {
        assert_eq!(SortKey::Cpu.toggle(), SortKey::Memory);
        assert_eq!(SortKey::Memory.toggle(), SortKey::Cpu);
    }

    #[tokio::test]
    async fn reads_live_process_table() {
        let (_tx, rx) = watch::channel(SortKey::Memory);
        let mut adapter = ProcessAdapter::new(5, rx);
        let reading = adapter.refresh().await.unwrap();

        assert!(reading.value(Metric::ProcessMemory).unwrap() > 0.0);
        match reading.detail {
            Some(Detail::Processes(rows)) => {
                assert!(!rows.is_empty() && rows.len() <= 5);
                assert!(rows.windows(2).all(|w| w[0].memory_bytes >= w[1].memory_bytes));
            }
            other => panic!("unexpected detail {:?}", other),
        }
    }
}
