// src/cli.rs

//! CLI argument parsing using `clap`.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use clap::{Parser, ValueEnum};

/// Command-line arguments for `permwatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "permwatch",
    version,
    about = "Keep every file and directory under DIRPATH readable and writable by everyone.",
    long_about = None
)]
pub struct CliArgs {
    /// Directories to watch. With more than one, a separate watcher process
    /// is started for each.
    #[arg(value_name = "DIRPATH", required = true, num_args = 1..)]
    pub dirs: Vec<PathBuf>,

    /// Optional schedule config file (TOML).
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Fix the tree once and exit, without watching.
    #[arg(long)]
    pub once: bool,

    /// Do not chroot into the target; watch it at its real path.
    ///
    /// Needed when running without the privilege to chroot.
    #[arg(long)]
    pub no_chroot: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `PERMWATCH_LOG` or a default level will be used.
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

impl CliArgs {
    /// Arguments for a child process that watches only `dir`, carrying over
    /// every other flag.
    pub fn child_args(&self, dir: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = Vec::new();
        if let Some(ref config) = self.config {
            args.push("--config".into());
            args.push(config.clone().into_os_string());
        }
        if self.once {
            args.push("--once".into());
        }
        if self.no_chroot {
            args.push("--no-chroot".into());
        }
        if let Some(level) = self.log_level.and_then(|l| l.to_possible_value()) {
            args.push("--log-level".into());
            args.push(level.get_name().into());
        }
        args.push("--".into());
        args.push(dir.as_os_str().to_os_string());
        args
    }
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
