use std::collections::HashMap;
use std::env;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "DAYBOOK_API_BIND_ADDR", "127.0.0.1:3000");
        if !bind_addr.contains(':') {
            return Err(ConfigError::Invalid(
                "DAYBOOK_API_BIND_ADDR must be host:port".to_string(),
            ));
        }

        let db_path = PathBuf::from(value_or_default(
            &lookup,
            "DAYBOOK_API_DB_PATH",
            "db/journal.db",
        ));

        Ok(Self { bind_addr, db_path })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use pretty_assertions::assert_eq;

    fn config(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(
            config,
            AppConfig {
                bind_addr: "127.0.0.1:3000".to_string(),
                db_path: PathBuf::from("db/journal.db"),
            }
        );
    }

    #[test]
    fn config_reads_overrides() {
        let config = config(&[
            ("DAYBOOK_API_BIND_ADDR", " 0.0.0.0:8080 "),
            ("DAYBOOK_API_DB_PATH", "/var/lib/daybook/journal.db"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/daybook/journal.db"));
    }

    #[test]
    fn config_rejects_bind_addr_without_port() {
        let err = config(&[("DAYBOOK_API_BIND_ADDR", "localhost")]).unwrap_err();
        assert!(err.to_string().contains("DAYBOOK_API_BIND_ADDR"));
    }
}
