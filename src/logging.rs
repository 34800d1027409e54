// src/logging.rs

//! Logging setup for `permwatch` using `tracing` + `tracing-subscriber`.
//!
//! The filter is chosen as follows:
//! 1. `--log-level LEVEL` sets permwatch's own level; other crates (`notify`,
//!    `tokio`) stay at `warn`.
//! 2. Otherwise `PERMWATCH_LOG` is read as a full `EnvFilter` directive
//!    string, e.g. `debug` or `permwatch::engine=trace,notify=debug`.
//! 3. Otherwise permwatch logs at `info`.
//!
//! Logs are sent to STDERR.

use anyhow::{anyhow, Context, Result};
use tracing::Level;
use tracing_subscriber::{fmt, EnvFilter};

use crate::cli::LogLevel;

pub const LOG_ENV: &str = "PERMWATCH_LOG";

/// Install the global subscriber. Call once at startup.
pub fn init_logging(cli_level: Option<LogLevel>) -> Result<()> {
    let env = std::env::var(LOG_ENV).ok();
    let filter = build_filter(cli_level, env.as_deref())?;

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| anyhow!("installing log subscriber: {e}"))
}

fn build_filter(cli_level: Option<LogLevel>, env: Option<&str>) -> Result<EnvFilter> {
    if let Some(level) = cli_level {
        return Ok(EnvFilter::new(crate_directive(level.into())));
    }
    match env.map(str::trim) {
        Some(spec) if !spec.is_empty() => {
            EnvFilter::try_new(spec).with_context(|| format!("invalid {LOG_ENV} value {spec:?}"))
        }
        _ => Ok(EnvFilter::new(crate_directive(Level::INFO))),
    }
}

/// `level` for permwatch itself, `warn` for everything else.
fn crate_directive(level: Level) -> String {
    format!(
        "warn,{}={}",
        env!("CARGO_CRATE_NAME"),
        level.as_str().to_ascii_lowercase()
    )
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_level_is_scoped_to_this_crate() {
        assert_eq!(crate_directive(LogLevel::Debug.into()), "warn,permwatch=debug");
    }

    #[test]
    fn flag_wins_over_environment() {
        // The env value would not even parse; the flag means it is never read.
        assert!(build_filter(Some(LogLevel::Trace), Some("permwatch=loud")).is_ok());
    }

    #[test]
    fn environment_accepts_directives_and_rejects_garbage() {
        assert!(build_filter(None, Some("permwatch::engine=trace,notify=debug")).is_ok());
        assert!(build_filter(None, Some("  ")).is_ok());
        assert!(build_filter(None, Some("permwatch=loud")).is_err());
    }
}
