// src/config/model.rs

use std::time::Duration;

use chrono::NaiveTime;
use serde::Deserialize;

use crate::config::validate::{parse_duration, parse_time_of_day};
use crate::errors::PermwatchError;

/// Configuration file as read from TOML.
///
/// ```toml
/// [schedule]
/// flush_interval = "60s"
/// rescan_at = "04:00:00"
/// ```
///
/// All sections are optional and have the defaults shown above. The
/// permission policy itself is fixed and has no configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub schedule: RawScheduleSection,
}

/// `[schedule]` section, unparsed.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawScheduleSection {
    /// How often queued changes are flushed (`"250ms"`, `"60s"`, `"5m"`, `"1h"`).
    #[serde(default = "default_flush_interval")]
    pub flush_interval: String,

    /// Local time of day for the full rescan, `HH:MM` or `HH:MM:SS`.
    #[serde(default = "default_rescan_at")]
    pub rescan_at: String,
}

fn default_flush_interval() -> String {
    "60s".to_string()
}

fn default_rescan_at() -> String {
    "04:00:00".to_string()
}

impl Default for RawScheduleSection {
    fn default() -> Self {
        Self {
            flush_interval: default_flush_interval(),
            rescan_at: default_rescan_at(),
        }
    }
}

/// Validated configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub schedule: ScheduleConfig,
}

/// When the two periodic jobs fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleConfig {
    /// Period of the change-queue flush.
    pub flush_interval: Duration,
    /// Local wall-clock time of the daily full rescan.
    pub rescan_at: NaiveTime,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            flush_interval: Duration::from_secs(60),
            rescan_at: NaiveTime::from_hms_opt(4, 0, 0).unwrap_or_default(),
        }
    }
}

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = PermwatchError;

    fn try_from(raw: RawConfigFile) -> Result<Self, Self::Error> {
        Ok(ConfigFile {
            schedule: ScheduleConfig::try_from(raw.schedule)?,
        })
    }
}

impl TryFrom<RawScheduleSection> for ScheduleConfig {
    type Error = PermwatchError;

    fn try_from(raw: RawScheduleSection) -> Result<Self, Self::Error> {
        let flush_interval = parse_duration(&raw.flush_interval).map_err(|e| {
            PermwatchError::ConfigError(format!("[schedule].flush_interval: {e}"))
        })?;
        if flush_interval.is_zero() {
            return Err(PermwatchError::ConfigError(
                "[schedule].flush_interval must be greater than zero".to_string(),
            ));
        }

        let rescan_at = parse_time_of_day(&raw.rescan_at)
            .map_err(|e| PermwatchError::ConfigError(format!("[schedule].rescan_at: {e}")))?;

        Ok(ScheduleConfig {
            flush_interval,
            rescan_at,
        })
    }
}
