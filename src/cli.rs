//! Command-line arguments for the `order-automation` binary.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Parser)]
#[command(
    name = "order-automation",
    version,
    about = "Advance orders through their lifecycle on a timer and notify the people involved.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `$ORDER_AUTOMATION_CONFIG`, else `OrderAutomation.toml` if it exists,
    /// else built-in defaults.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logging level. Overrides `RUST_LOG`.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Run the timers against the wall clock until Ctrl-C instead of the demo.
    #[arg(long)]
    pub serve: bool,

    /// Demo only: number of sweeps to run.
    #[arg(long, default_value_t = 8)]
    pub sweeps: u32,

    /// Demo only: simulated hours between two sweeps.
    #[arg(long, default_value_t = 48)]
    pub step_hours: u32,
}

#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}
