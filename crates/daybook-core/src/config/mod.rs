//! Client sync configuration.
//!
//! Provides a unified `SyncSettings` struct resolved from `DAYBOOK_*`
//! environment variables, with optional overrides from the caller.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::sync::{SchedulerConfig, DEFAULT_CHUNK_SIZE};
use crate::util::{is_http_url, normalize_text_option};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Everything a client needs to run delta sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Base URL of the sync server; `None` disables networked sync
    pub server_url: Option<String>,
    pub chunk_size: usize,
    pub scheduler: SchedulerConfig,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            server_url: None,
            chunk_size: DEFAULT_CHUNK_SIZE,
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl SyncSettings {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let server_url = normalize_text_option(lookup("DAYBOOK_SERVER_URL"))
            .map(|url| url.trim_end_matches('/').to_string());
        if let Some(url) = server_url.as_deref() {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(
                    "DAYBOOK_SERVER_URL must start with http:// or https://".to_string(),
                ));
            }
        }

        let chunk_size = parse_in_range(&lookup, "DAYBOOK_SYNC_CHUNK_SIZE", 50, 1, 1_000)?;
        let debounce_ms = parse_in_range(&lookup, "DAYBOOK_SYNC_DEBOUNCE_MS", 1_000, 0, 60_000)?;
        let startup_delay_ms =
            parse_in_range(&lookup, "DAYBOOK_SYNC_STARTUP_DELAY_MS", 500, 0, 60_000)?;
        let base_interval_secs =
            parse_in_range(&lookup, "DAYBOOK_SYNC_BASE_INTERVAL_SECS", 10, 1, 3_600)?;
        let max_interval_secs =
            parse_in_range(&lookup, "DAYBOOK_SYNC_MAX_INTERVAL_SECS", 300, 1, 86_400)?;
        if max_interval_secs < base_interval_secs {
            return Err(ConfigError::Invalid(
                "DAYBOOK_SYNC_MAX_INTERVAL_SECS must be >= DAYBOOK_SYNC_BASE_INTERVAL_SECS"
                    .to_string(),
            ));
        }

        Ok(Self {
            server_url,
            chunk_size: usize::try_from(chunk_size).unwrap_or(DEFAULT_CHUNK_SIZE),
            scheduler: SchedulerConfig {
                debounce: Duration::from_millis(debounce_ms),
                startup_delay: Duration::from_millis(startup_delay_ms),
                base_interval: Duration::from_secs(base_interval_secs),
                max_interval: Duration::from_secs(max_interval_secs),
            },
        })
    }

    /// Replace the server URL, e.g. from a command-line flag.
    pub fn with_server_url(mut self, server_url: Option<String>) -> Result<Self, ConfigError> {
        if let Some(url) = normalize_text_option(server_url) {
            if !is_http_url(&url) {
                return Err(ConfigError::Invalid(
                    "server URL must start with http:// or https://".to_string(),
                ));
            }
            self.server_url = Some(url.trim_end_matches('/').to_string());
        }
        Ok(self)
    }

    /// The configured server URL, or an error naming the variable to set.
    pub fn require_server_url(&self) -> Result<&str, ConfigError> {
        self.server_url
            .as_deref()
            .ok_or(ConfigError::MissingVar("DAYBOOK_SERVER_URL"))
    }
}

fn parse_in_range(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
    min: u64,
    max: u64,
) -> Result<u64, ConfigError> {
    let Some(raw) = normalize_text_option(lookup(name)) else {
        return Ok(default);
    };
    let value = raw.parse::<u64>().map_err(|_| {
        ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]"))
    })?;
    if (min..=max).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::Invalid(format!("{name} must be in [{min}, {max}]")))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;

    fn settings(pairs: &[(&str, &str)]) -> Result<SyncSettings, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        SyncSettings::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn defaults_apply_when_unset() {
        let settings = settings(&[]).unwrap();
        assert_eq!(settings, SyncSettings::default());
        assert!(settings.require_server_url().is_err());
    }

    #[test]
    fn reads_tunables() {
        let settings = settings(&[
            ("DAYBOOK_SERVER_URL", " https://journal.example.com/ "),
            ("DAYBOOK_SYNC_CHUNK_SIZE", "25"),
            ("DAYBOOK_SYNC_DEBOUNCE_MS", "250"),
            ("DAYBOOK_SYNC_BASE_INTERVAL_SECS", "5"),
            ("DAYBOOK_SYNC_MAX_INTERVAL_SECS", "60"),
        ])
        .unwrap();

        assert_eq!(settings.require_server_url().unwrap(), "https://journal.example.com");
        assert_eq!(settings.chunk_size, 25);
        assert_eq!(settings.scheduler.debounce, Duration::from_millis(250));
        assert_eq!(settings.scheduler.base_interval, Duration::from_secs(5));
        assert_eq!(settings.scheduler.max_interval, Duration::from_secs(60));
    }

    #[test]
    fn rejects_invalid_values() {
        assert!(settings(&[("DAYBOOK_SERVER_URL", "journal.example.com")]).is_err());
        assert!(settings(&[("DAYBOOK_SYNC_CHUNK_SIZE", "0")]).is_err());
        assert!(settings(&[("DAYBOOK_SYNC_CHUNK_SIZE", "many")]).is_err());
        let error = settings(&[
            ("DAYBOOK_SYNC_BASE_INTERVAL_SECS", "60"),
            ("DAYBOOK_SYNC_MAX_INTERVAL_SECS", "30"),
        ])
        .unwrap_err();
        assert!(error.to_string().contains("DAYBOOK_SYNC_MAX_INTERVAL_SECS"));
    }

    #[test]
    fn flag_overrides_environment_url() {
        let settings = settings(&[("DAYBOOK_SERVER_URL", "https://env.example.com")])
            .unwrap()
            .with_server_url(Some("http://localhost:3000/".to_string()))
            .unwrap();
        assert_eq!(settings.server_url.as_deref(), Some("http://localhost:3000"));

        let unchanged = SyncSettings::default().with_server_url(None).unwrap();
        assert_eq!(unchanged.server_url, None);
    }
}
