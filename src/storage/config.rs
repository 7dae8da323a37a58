use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),
    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub google: GoogleConfig,
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoogleConfig {
    /// OAuth client secrets JSON downloaded from the Google Cloud console.
    pub credentials_file: PathBuf,
    pub token_cache: PathBuf,
    /// Overrides `credentials_file` when both id and secret are set.
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseConfig {
    pub path: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    pub calendar_id: String,
    pub time_zone: String,
    pub site_base_url: String,
    #[serde(default = "default_site_name")]
    pub site_name: String,
    #[serde(default = "default_detail_path")]
    pub detail_path: String,
    #[serde(default)]
    pub continue_on_error: bool,
}

fn default_site_name() -> String {
    "HKN website".to_string()
}

fn default_detail_path() -> String {
    "/events/{id}".to_string()
}

impl GoogleConfig {
    pub fn has_inline_client(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

impl Config {
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::from)
    }

    pub fn load_or_create() -> Result<Self, ConfigError> {
        Self::load_or_create_at(&Self::config_path())
    }

    pub fn load_or_create_at(config_path: &Path) -> Result<Self, ConfigError> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)?;
            let config = Self::from_toml(&content)?;
            tracing::debug!("Loaded config from {}", config_path.display());
            Ok(config)
        } else {
            let config = Self::default();
            config.save_to(config_path)?;
            tracing::info!("Wrote default config to {}", config_path.display());
            Ok(config)
        }
    }

    pub fn config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("event-cal-sync")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    pub fn save_to(&self, config_path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.calendar_id.trim().is_empty() {
            return Err(ConfigError::Invalid("sync.calendar_id is empty".to_string()));
        }

        if self.sync.time_zone.parse::<chrono_tz::Tz>().is_err() {
            return Err(ConfigError::Invalid(format!(
                "sync.time_zone '{}' is not an IANA time zone",
                self.sync.time_zone
            )));
        }

        if !self.sync.detail_path.contains("{id}") {
            return Err(ConfigError::Invalid(format!(
                "sync.detail_path '{}' must contain {{id}}",
                self.sync.detail_path
            )));
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = Self::config_dir();

        Self {
            google: GoogleConfig {
                credentials_file: config_dir.join("credentials.json"),
                token_cache: config_dir.join("token.json"),
                client_id: String::new(),
                client_secret: String::new(),
            },
            database: DatabaseConfig {
                path: config_dir.join("events.sqlite3"),
            },
            sync: SyncConfig {
                calendar_id: "primary".to_string(),
                time_zone: "America/Los_Angeles".to_string(),
                site_base_url: "https://dev-hkn.eecs.berkeley.edu".to_string(),
                site_name: default_site_name(),
                detail_path: default_detail_path(),
                continue_on_error: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn default_config_targets_primary_calendar() {
        let config = Config::default();
        assert_eq!(config.sync.calendar_id, "primary");
    }

    #[test]
    fn default_config_uses_pacific_time() {
        let config = Config::default();
        assert_eq!(config.sync.time_zone, "America/Los_Angeles");
    }

    #[test]
    fn default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn parse_valid_toml_config() {
        let toml_content = r#"
            [google]
            credentials_file = "/etc/sync/credentials.json"
            token_cache = "/tmp/token.json"

            [database]
            path = "/srv/app/db.sqlite3"

            [sync]
            calendar_id = "club@group.calendar.google.com"
            time_zone = "Europe/Berlin"
            site_base_url = "https://example.org"
            continue_on_error = true
        "#;

        let config = Config::from_toml(toml_content).unwrap();

        assert_eq!(config.google.token_cache, PathBuf::from("/tmp/token.json"));
        assert!(!config.google.has_inline_client());
        assert_eq!(config.database.path, PathBuf::from("/srv/app/db.sqlite3"));
        assert_eq!(config.sync.calendar_id, "club@group.calendar.google.com");
        assert_eq!(config.sync.site_name, "HKN website");
        assert_eq!(config.sync.detail_path, "/events/{id}");
        assert!(config.sync.continue_on_error);
    }

    #[test]
    fn parse_invalid_toml_returns_error() {
        let invalid_toml = "this is not valid toml";
        let result = Config::from_toml(invalid_toml);
        assert!(result.is_err());
    }

    #[test]
    fn unknown_time_zone_fails_validation() {
        let mut config = Config::default();
        config.sync.time_zone = "Mars/Olympus_Mons".to_string();

        let result = config.validate();

        assert!(matches!(result, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn detail_path_without_placeholder_fails_validation() {
        let mut config = Config::default();
        config.sync.detail_path = "/events/".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn blank_calendar_id_fails_validation() {
        let mut config = Config::default();
        config.sync.calendar_id = "  ".to_string();

        assert!(config.validate().is_err());
    }

    #[test]
    fn load_or_create_writes_defaults_then_reads_them_back() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        let created = Config::load_or_create_at(&path).unwrap();
        let loaded = Config::load_or_create_at(&path).unwrap();

        assert!(path.exists());
        assert_eq!(created, loaded);
    }
}
