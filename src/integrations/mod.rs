//! Source adapters wrapping the OS telemetry channels

pub mod battery;
#[cfg(target_os = "macos")]
mod ioreport;
pub mod power;
pub mod processes;
pub mod source;

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

use crate::telemetry::{ChargeState, ErrorKind, Metric, PowerMode, ProcessInfo, SourceKind};

pub use source::Source;

/// Recoverable failure of one adapter refresh
#[derive(Debug, Error)]
pub enum AdapterError {
    /// The channel does not exist on this hardware, OS or privilege level
    #[error("{0} is not supported on this machine")]
    Unsupported(String),

    #[error("unexpected output from {tool}: {detail}")]
    Parse { tool: &'static str, detail: String },

    #[error("{tool} did not answer within {after:?}")]
    Timeout { tool: &'static str, after: Duration },

    #[error("{tool} failed: {detail}")]
    Process { tool: &'static str, detail: String },
}

impl AdapterError {
    pub fn parse(tool: &'static str, detail: impl Into<String>) -> Self {
        Self::Parse {
            tool,
            detail: detail.into(),
        }
    }

    pub fn process(tool: &'static str, detail: impl Into<String>) -> Self {
        Self::Process {
            tool,
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Unsupported(_) => ErrorKind::Unsupported,
            Self::Parse { .. } => ErrorKind::Parse,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Process { .. } => ErrorKind::Process,
        }
    }
}

/// Non-numeric context a source reports alongside its metrics
#[derive(Debug, Clone, PartialEq)]
pub enum Detail {
    Battery {
        state: ChargeState,
        time_remaining: Option<Duration>,
    },
    PowerMode(PowerMode),
    Processes(Vec<ProcessInfo>),
}

/// Raw result of one successful refresh.
///
/// A metric reported as `None` was missing from the output this cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reading {
    pub values: Vec<(Metric, Option<f64>)>,
    pub detail: Option<Detail>,
}

impl Reading {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, metric: Metric, value: Option<f64>) -> Self {
        self.values.push((metric, value));
        self
    }

    pub fn with_detail(mut self, detail: Detail) -> Self {
        self.detail = Some(detail);
        self
    }

    /// `None` when the metric was not reported or is not a finite number
    pub fn value(&self, metric: Metric) -> Option<f64> {
        self.values
            .iter()
            .find(|(m, _)| *m == metric)
            .and_then(|(_, v)| *v)
            .filter(|v| v.is_finite())
    }
}

/// One external telemetry channel
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Adapter: Send {
    fn kind(&self) -> SourceKind;

    /// Metrics this adapter reports on every successful refresh
    fn metrics(&self) -> &'static [Metric];

    async fn refresh(&mut self) -> Result<Reading, AdapterError>;
}

/// Launches the external tools an adapter reads from
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        tool: &'static str,
        args: &'static [&'static str],
        timeout: Duration,
    ) -> Result<String, AdapterError>;
}

/// Runs tools as child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemCommands;

#[async_trait]
impl CommandRunner for SystemCommands {
    async fn run(
        &self,
        tool: &'static str,
        args: &'static [&'static str],
        timeout: Duration,
    ) -> Result<String, AdapterError> {
        run_command(tool, args, timeout).await
    }
}

/// Run an external tool and capture stdout, treating every failure as recoverable
pub(crate) async fn run_command(
    tool: &'static str,
    args: &[&str],
    timeout: Duration,
) -> Result<String, AdapterError> {
    let child = Command::new(tool).args(args).kill_on_drop(true).output();

    let output = match tokio::time::timeout(timeout, child).await {
        Err(_) => {
            return Err(AdapterError::Timeout {
                tool,
                after: timeout,
            })
        }
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AdapterError::Unsupported(format!("`{}`", tool)))
        }
        Ok(Err(e)) => return Err(AdapterError::process(tool, e.to_string())),
        Ok(Ok(output)) => output,
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(AdapterError::process(
            tool,
            format!("exited with {}: {}", output.status, stderr.trim()),
        ));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reading_value_filters_missing_and_non_finite() {
        let reading = Reading::new()
            .with(Metric::CpuPower, Some(2.5))
            .with(Metric::GpuPower, None)
            .with(Metric::AnePower, Some(f64::NAN));

        assert_eq!(reading.value(Metric::CpuPower), Some(2.5));
        assert_eq!(reading.value(Metric::GpuPower), None);
        assert_eq!(reading.value(Metric::AnePower), None);
        assert_eq!(reading.value(Metric::PackagePower), None);
    }

    #[tokio::test]
    async fn missing_tool_is_unsupported() {
        let err = run_command(
            "amperage-definitely-missing-tool",
            &[],
            Duration::from_secs(1),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unsupported);
    }

    #[tokio::test]
    async fn failing_tool_is_a_process_error() {
        let err = run_command("sh", &["-c", "echo nope >&2; exit 3"], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Process);
        assert!(err.to_string().contains("nope"));
    }

    #[tokio::test]
    async fn slow_tool_times_out() {
        let err = run_command("sleep", &["5"], Duration::from_millis(50))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn captures_stdout() {
        let out = run_command("sh", &["-c", "printf 'hello'"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(out, "hello");
    }
}
