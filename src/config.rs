//! Configuration management module
//!
//! Layers built-in defaults under `WQMS__`-prefixed environment variables
//! (for example `WQMS__SERVER__PORT`) and validates the result.

use chrono::{FixedOffset, Local, Offset};
use ::config::{Config, ConfigError, Environment};
use serde::Deserialize;
use thiserror::Error;

use crate::calendar::CalendarWindow;

/// Configuration errors
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ConfigError),

    #[error("UTC offset of {0} minutes is out of range")]
    InvalidOffset(i32),

    #[error("Calendar year {0} is out of range")]
    InvalidYear(i32),

    #[error("{0} must be greater than zero")]
    Zero(&'static str),
}

/// Server configuration settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

/// History pipeline settings
#[derive(Debug, Clone, Deserialize)]
pub struct HistorySettings {
    /// Raw records kept from each history snapshot (most recent)
    pub limit: usize,
    pub page_size: usize,
    /// Offset used for calendar days and display times
    pub utc_offset_minutes: i32,
}

impl HistorySettings {
    pub fn offset(&self) -> Option<FixedOffset> {
        FixedOffset::east_opt(self.utc_offset_minutes.checked_mul(60)?)
    }
}

/// Date picker settings
#[derive(Debug, Clone, Deserialize)]
pub struct CalendarSettings {
    pub year: i32,
}

impl CalendarSettings {
    pub fn window(&self) -> Option<CalendarWindow> {
        CalendarWindow::for_year(self.year)
    }
}

/// Feed subscription settings
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSettings {
    /// Grace period before a silent feed is reported unavailable
    pub startup_timeout_ms: u64,
    /// Capacity of the feed event channel
    pub channel_capacity: usize,
}

/// Simulated remote store settings
#[derive(Debug, Clone, Deserialize)]
pub struct SimulatorSettings {
    pub enabled: bool,
    /// Interval in milliseconds between simulated pushes
    pub interval_ms: u64,
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub history: HistorySettings,
    pub calendar: CalendarSettings,
    pub feeds: FeedSettings,
    pub simulator: SimulatorSettings,
}

impl Settings {
    /// Load settings from environment variables
    pub fn from_env() -> Result<Self, SettingsError> {
        Self::from_source(Environment::with_prefix("WQMS").separator("__").try_parsing(true))
    }

    fn from_source(env: Environment) -> Result<Self, SettingsError> {
        let local_offset = i64::from(Local::now().offset().fix().local_minus_utc() / 60);

        let settings: Settings = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8080_i64)?
            .set_default("history.limit", 500_i64)?
            .set_default("history.page_size", 10_i64)?
            .set_default("history.utc_offset_minutes", local_offset)?
            .set_default("calendar.year", 2026_i64)?
            .set_default("feeds.startup_timeout_ms", 10_000_i64)?
            .set_default("feeds.channel_capacity", 64_i64)?
            .set_default("simulator.enabled", true)?
            .set_default("simulator.interval_ms", 2_000_i64)?
            .add_source(env)
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), SettingsError> {
        if self.history.offset().is_none() {
            return Err(SettingsError::InvalidOffset(self.history.utc_offset_minutes));
        }
        if self.calendar.window().is_none() {
            return Err(SettingsError::InvalidYear(self.calendar.year));
        }
        if self.history.limit == 0 {
            return Err(SettingsError::Zero("history.limit"));
        }
        if self.history.page_size == 0 {
            return Err(SettingsError::Zero("history.page_size"));
        }
        if self.feeds.channel_capacity == 0 {
            return Err(SettingsError::Zero("feeds.channel_capacity"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix("WQMS")
            .separator("__")
            .try_parsing(true)
            .source(Some(map))
    }

    #[test]
    fn test_default_settings() {
        let settings = Settings::from_source(env(&[])).unwrap();

        assert_eq!(settings.server.host, "0.0.0.0");
        assert_eq!(settings.server.port, 8080);
        assert_eq!(settings.history.limit, 500);
        assert_eq!(settings.history.page_size, 10);
        assert_eq!(settings.calendar.year, 2026);
        assert!(settings.simulator.enabled);
        assert_eq!(
            settings.history.offset(),
            Some(Local::now().offset().fix())
        );
    }

    #[test]
    fn test_custom_settings() {
        let settings = Settings::from_source(env(&[
            ("WQMS__SERVER__PORT", "3000"),
            ("WQMS__HISTORY__UTC_OFFSET_MINUTES", "-300"),
            ("WQMS__SIMULATOR__ENABLED", "false"),
        ]))
        .unwrap();

        assert_eq!(settings.server.port, 3000);
        assert_eq!(
            settings.history.offset(),
            FixedOffset::west_opt(5 * 3600)
        );
        assert!(!settings.simulator.enabled);
    }

    #[test]
    fn test_invalid_settings() {
        assert!(matches!(
            Settings::from_source(env(&[("WQMS__HISTORY__UTC_OFFSET_MINUTES", "2000")])),
            Err(SettingsError::InvalidOffset(2000))
        ));
        assert!(matches!(
            Settings::from_source(env(&[("WQMS__HISTORY__PAGE_SIZE", "0")])),
            Err(SettingsError::Zero("history.page_size"))
        ));
        assert!(matches!(
            Settings::from_source(env(&[("WQMS__SERVER__PORT", "not-a-port")])),
            Err(SettingsError::Load(_))
        ));
    }
}
