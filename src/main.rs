//! Amperage - live battery, power and process telemetry for your terminal
//!
//! Samples the battery, SoC power rails and the busiest processes on a
//! fixed cadence, keeps a rolling history, and renders it as a TUI or
//! streams it as JSON lines.

mod config;
mod core;
mod integrations;
mod output;
mod telemetry;
mod ui;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Config;
use crate::core::app::App;
use crate::core::scheduler::clamp_interval;

#[derive(Parser)]
#[command(name = "amperage")]
#[command(author = "Amperage Contributors")]
#[command(version = "0.1.0")]
#[command(about = "Live battery, power and process telemetry for your terminal", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Configuration file path
    #[arg(short, long, value_name = "FILE", env = "AMPERAGE_CONFIG")]
    config: Option<PathBuf>,

    /// Sampling interval in milliseconds (overrides the config file)
    #[arg(short, long, value_name = "MS")]
    interval: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Take one sample and print a report with source diagnostics
    Debug {
        /// Run an unreported priming pass and wait this long before the
        /// reported one. Power and process CPU need it to show values, and its
        /// failures count in the source diagnostics. 0 takes exactly one pass.
        #[arg(long, default_value = "0", value_name = "MS")]
        settle_ms: u64,
    },

    /// Stream samples as JSON lines
    Pipe {
        /// Number of samples to emit (0 for unlimited)
        #[arg(short = 'n', long, default_value = "1")]
        samples: u64,

        /// Milliseconds between samples
        #[arg(long, default_value = "1000", value_name = "MS")]
        interval: u64,

        /// Run an unreported priming pass and wait this long before the first
        /// sample (0 to skip)
        #[arg(long, default_value = "1000", value_name = "MS")]
        settle_ms: u64,
    },

    /// Write the default configuration file
    Init {
        /// Force overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },
}

fn setup_logging(verbosity: u8) -> Result<tracing_appender::non_blocking::WorkerGuard> {
    let level = match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    // The terminal belongs to the TUI, so logs only ever go to a file
    let log_dir = dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("amperage")
        .join("logs");

    std::fs::create_dir_all(&log_dir)?;

    let file_appender = tracing_appender::rolling::daily(&log_dir, "amperage.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    // Keep the guard alive for the duration of the program
    let _logging_guard = setup_logging(cli.verbose)?;

    let command = match cli.command {
        Some(Commands::Init { force }) => {
            let path = match cli.config {
                Some(path) => path,
                None => Config::default_path()
                    .ok_or_else(|| anyhow::anyhow!("no config directory on this system"))?,
            };
            config::init_config(&path, force)?;
            println!("Wrote {}", path.display());
            return Ok(ExitCode::SUCCESS);
        }
        command => command,
    };

    if !cfg!(target_os = "macos") {
        eprintln!(
            "amperage: unsupported platform '{}'; battery and power telemetry needs macOS",
            std::env::consts::OS
        );
        return Ok(ExitCode::from(2));
    }

    let config_path = cli
        .config
        .or_else(|| Config::default_path().filter(|p| p.exists()));
    let mut config = Config::load_or_default(config_path.as_deref());
    if let Some(ms) = cli.interval {
        config.sampling.interval_ms = clamp_interval(Duration::from_millis(ms)).as_millis() as u64;
    }
    tracing::info!(interval = ?config.interval(), "starting");

    match command {
        Some(Commands::Debug { settle_ms }) => {
            output::debug(&config, Duration::from_millis(settle_ms)).await?;
        }
        Some(Commands::Pipe {
            samples,
            interval,
            settle_ms,
        }) => {
            output::pipe(
                &config,
                samples,
                clamp_interval(Duration::from_millis(interval)),
                Duration::from_millis(settle_ms),
            )
            .await?;
        }
        _ => {
            // Launch the main TUI
            let mut app = App::new(config)?;
            app.run().await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
