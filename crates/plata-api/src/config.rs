use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: String,
    pub gist: Option<GistRuntimeConfig>,
    pub sheets_webapp_url: Option<String>,
    pub sheets_csv_url: Option<String>,
    pub auto_sync: bool,
    pub sync_debounce: Duration,
    pub sync_poll_interval: Duration,
}

#[derive(Clone, PartialEq, Eq)]
pub struct GistRuntimeConfig {
    pub token: String,
    pub gist_id: String,
}

impl fmt::Debug for GistRuntimeConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("GistRuntimeConfig")
            .field("token", &"[REDACTED]")
            .field("gist_id", &self.gist_id)
            .finish()
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("db_path", &self.db_path)
            .field("gist", &self.gist)
            .field("sheets_webapp_url", &self.sheets_webapp_url)
            .field("sheets_csv_url", &self.sheets_csv_url)
            .field("auto_sync", &self.auto_sync)
            .field("sync_debounce", &self.sync_debounce)
            .field("sync_poll_interval", &self.sync_poll_interval)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "PLATA_API_BIND_ADDR", "127.0.0.1:8080");
        let db_path = value_or_default(&lookup, "PLATA_DB_PATH", "plata.db");

        let gist = parse_gist_config(&lookup)?;

        let sheets_webapp_url = optional_trimmed(&lookup, "PLATA_SHEETS_WEBAPP_URL");
        if let Some(url) = sheets_webapp_url.as_deref() {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(
                    "PLATA_SHEETS_WEBAPP_URL must start with http:// or https://".to_string(),
                ));
            }
        }

        let sheets_csv_url = optional_trimmed(&lookup, "PLATA_SHEETS_CSV_URL");
        if let Some(url) = sheets_csv_url.as_deref() {
            if !is_http_url(url) {
                return Err(ConfigError::Invalid(
                    "PLATA_SHEETS_CSV_URL must start with http:// or https://".to_string(),
                ));
            }
        }

        let auto_sync = value_or_default(&lookup, "PLATA_AUTO_SYNC", "true");
        let auto_sync = matches!(auto_sync.to_lowercase().as_str(), "1" | "true" | "yes" | "on");

        let debounce_ms = value_or_default(&lookup, "PLATA_SYNC_DEBOUNCE_MS", "800")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "PLATA_SYNC_DEBOUNCE_MS must be an integer in [50, 60000]".to_string(),
                )
            })?;
        if !(50..=60_000).contains(&debounce_ms) {
            return Err(ConfigError::Invalid(
                "PLATA_SYNC_DEBOUNCE_MS must be in [50, 60000]".to_string(),
            ));
        }

        let poll_secs = value_or_default(&lookup, "PLATA_SYNC_POLL_SECS", "30")
            .parse::<u64>()
            .map_err(|_| {
                ConfigError::Invalid(
                    "PLATA_SYNC_POLL_SECS must be an integer in [5, 3600]".to_string(),
                )
            })?;
        if !(5..=3_600).contains(&poll_secs) {
            return Err(ConfigError::Invalid(
                "PLATA_SYNC_POLL_SECS must be in [5, 3600]".to_string(),
            ));
        }

        Ok(Self {
            bind_addr,
            db_path,
            gist,
            sheets_webapp_url,
            sheets_csv_url,
            auto_sync,
            sync_debounce: Duration::from_millis(debounce_ms),
            sync_poll_interval: Duration::from_secs(poll_secs),
        })
    }
}

fn parse_gist_config(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<GistRuntimeConfig>, ConfigError> {
    let token = optional_trimmed(&lookup, "GITHUB_TOKEN");
    let gist_id = optional_trimmed(&lookup, "PLATA_GIST_ID");

    if token.is_none() && gist_id.is_none() {
        return Ok(None);
    }

    let token = token.ok_or(ConfigError::MissingVar("GITHUB_TOKEN"))?;
    let gist_id = gist_id.ok_or(ConfigError::MissingVar("PLATA_GIST_ID"))?;

    Ok(Some(GistRuntimeConfig { token, gist_id }))
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

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}
