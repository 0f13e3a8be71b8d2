// src/cli.rs

//! CLI argument parsing using `clap`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Command-line arguments for `vela-dispatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "vela-dispatch",
    version,
    about = "Reconcile an application manifest with stage-gated trait dispatch.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the application manifest (TOML).
    #[arg(long, value_name = "PATH", default_value = "vela.toml")]
    pub app: PathBuf,

    /// JSON file with live object state (e.g. `status` blocks) merged into
    /// every snapshot. Re-read each tick.
    #[arg(long, value_name = "PATH")]
    pub live: Option<PathBuf>,

    /// Write the application status as JSON to this file on every tick.
    #[arg(long, value_name = "PATH")]
    pub status_file: Option<PathBuf>,

    /// Exit as soon as the application is running.
    #[arg(long)]
    pub once: bool,

    /// Exit after this many reconcile ticks.
    #[arg(long, value_name = "N")]
    pub max_ticks: Option<u64>,

    /// Reload the manifest when it changes on disk.
    #[arg(long)]
    pub watch: bool,

    /// Render components and default-stage traits, print them, and exit.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `VELA_DISPATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

pub fn parse() -> CliArgs {
    CliArgs::parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_flags() {
        let args = CliArgs::try_parse_from(["vela-dispatch"]).unwrap();
        assert_eq!(args.app, PathBuf::from("vela.toml"));
        assert!(!args.once && !args.watch && !args.dry_run);

        let args = CliArgs::try_parse_from([
            "vela-dispatch",
            "--app",
            "demos/postdispatch.toml",
            "--live",
            "live.json",
            "--max-ticks",
            "5",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert_eq!(args.live, Some(PathBuf::from("live.json")));
        assert_eq!(args.max_ticks, Some(5));
        assert_eq!(args.log_level, Some(LogLevel::Debug));
    }
}
