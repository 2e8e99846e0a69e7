//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/deskbot/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/deskbot/` (~/.config/deskbot/)
//! - Data: `$XDG_DATA_HOME/deskbot/` (~/.local/share/deskbot/)
//! - State/Logs: `$XDG_STATE_HOME/deskbot/` (~/.local/state/deskbot/)

use crate::error::{Error, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// Content storage configuration
    #[serde(default)]
    pub content: ContentConfig,

    /// Admin allow-list for the reporting surface
    #[serde(default)]
    pub admin: AdminConfig,

    /// Catalog source override
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Action-log retention
    #[serde(default)]
    pub retention: RetentionConfig,

    /// Timezone for the daily snapshot job
    #[serde(default)]
    pub timezone: TimezoneConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where solution images and documents live.
#[derive(Debug, Deserialize)]
pub struct ContentConfig {
    /// Base directory holding the `images/` and `files/` trees
    #[serde(default = "default_content_base")]
    pub base_path: PathBuf,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            base_path: default_content_base(),
        }
    }
}

fn default_content_base() -> PathBuf {
    PathBuf::from("data")
}

/// Admin identities allowed to query statistics.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct AdminConfig {
    /// User ids allowed on admin commands
    #[serde(default)]
    pub admin_ids: Vec<i64>,

    /// Chat id the daily snapshot report is delivered to
    pub admin_chat_id: Option<i64>,
}

impl AdminConfig {
    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admin_ids.contains(&user_id)
    }
}

/// Optional catalog file; the built-in catalog is used when absent.
#[derive(Debug, Deserialize, Default)]
pub struct CatalogConfig {
    pub path: Option<PathBuf>,
}

/// Retention window for the action log and snapshots.
#[derive(Debug, Deserialize)]
pub struct RetentionConfig {
    #[serde(default = "default_retention_days")]
    pub days: u32,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_retention_days(),
        }
    }
}

fn default_retention_days() -> u32 {
    90
}

/// Fixed UTC offset the daily snapshot job uses to decide what "yesterday"
/// means. Defaults to UTC+3 (Moscow).
#[derive(Debug, Deserialize)]
pub struct TimezoneConfig {
    #[serde(default = "default_utc_offset_hours")]
    pub utc_offset_hours: i32,
}

impl Default for TimezoneConfig {
    fn default() -> Self {
        Self {
            utc_offset_hours: default_utc_offset_hours(),
        }
    }
}

fn default_utc_offset_hours() -> i32 {
    3
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/deskbot/config.toml` (~/.config/deskbot/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("deskbot").join("config.toml")
    }

    /// Returns the data directory path (for the SQLite database)
    ///
    /// `$XDG_DATA_HOME/deskbot/` (~/.local/share/deskbot/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("deskbot")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/deskbot/` (~/.local/state/deskbot/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("deskbot")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/deskbot/stats.db` (~/.local/share/deskbot/stats.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("stats.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/deskbot/deskbot.log` (~/.local/state/deskbot/deskbot.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("deskbot.log")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.content.base_path, PathBuf::from("data"));
        assert_eq!(config.retention.days, 90);
        assert_eq!(config.timezone.utc_offset_hours, 3);
        assert!(config.admin.admin_ids.is_empty());
        assert!(config.catalog.path.is_none());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[content]
base_path = "/srv/deskbot/content"

[admin]
admin_ids = [550680968, 332518486]
admin_chat_id = -1003131568927

[retention]
days = 30

[timezone]
utc_offset_hours = 0

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(
            config.content.base_path,
            PathBuf::from("/srv/deskbot/content")
        );
        assert!(config.admin.is_admin(550680968));
        assert!(!config.admin.is_admin(42));
        assert_eq!(config.admin.admin_chat_id, Some(-1003131568927));
        assert_eq!(config.retention.days, 30);
        assert_eq!(config.timezone.utc_offset_hours, 0);
        assert_eq!(config.logging.level, "debug");
    }
}
