//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/siteref/config.toml`, then
//! overlaid with the secrets file (`~/.config/siteref/.secrets`) and finally
//! with `SITEREF_TOKEN` / `SITEREF_CHANNEL_ID` from the environment.
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/siteref/` (~/.config/siteref/)
//! - Data: `$XDG_DATA_HOME/siteref/` (~/.local/share/siteref/)
//! - State/Logs: `$XDG_STATE_HOME/siteref/` (~/.local/state/siteref/)

use crate::error::{Error, Result};
use crate::types::ChannelId;
use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder description for websites discovered by the collector.
pub const DEFAULT_DESCRIPTION: &str = "Scraped from channel - description unknown";

/// Upper bound for `interval_hours` and `window_hours` (ten years).
pub const MAX_HOURS: u64 = 24 * 365 * 10;

const TOKEN_ENV: &str = "SITEREF_TOKEN";
const CHANNEL_ID_ENV: &str = "SITEREF_CHANNEL_ID";

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
    /// Chat platform settings
    #[serde(default)]
    pub chat: ChatConfig,

    /// Collection job settings
    #[serde(default)]
    pub collection: CollectionConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Chat platform configuration
#[derive(Deserialize, Clone)]
pub struct ChatConfig {
    /// Authentication token for the chat platform
    pub token: Option<String>,

    /// Channel the collector scans
    pub channel_id: Option<ChannelId>,

    /// Identity the bot posts as; its own messages are never counted
    #[serde(default = "default_bot_identity")]
    pub bot_identity: String,

    /// Prefix that marks a message as a command
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,

    /// Directory of channel transcripts (`<channel_id>.jsonl`)
    pub transcript_dir: Option<PathBuf>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            token: None,
            channel_id: None,
            bot_identity: default_bot_identity(),
            command_prefix: default_command_prefix(),
            transcript_dir: None,
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("channel_id", &self.channel_id)
            .field("bot_identity", &self.bot_identity)
            .field("command_prefix", &self.command_prefix)
            .field("transcript_dir", &self.transcript_dir)
            .finish()
    }
}

impl ChatConfig {
    /// The transcript directory, defaulting to the data directory.
    pub fn transcript_dir(&self) -> PathBuf {
        self.transcript_dir
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("channels"))
    }
}

fn default_bot_identity() -> String {
    "siteref".to_string()
}

fn default_command_prefix() -> String {
    "!".to_string()
}

/// Collection job configuration
#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    /// Hours between runs
    #[serde(default = "default_interval_hours")]
    pub interval_hours: u64,

    /// Hours of channel history scanned per run
    #[serde(default = "default_window_hours")]
    pub window_hours: u64,

    /// Description given to websites the collector discovers
    #[serde(default = "default_description")]
    pub default_description: String,

    /// Where the snapshot export is written
    pub export_path: Option<PathBuf>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            interval_hours: default_interval_hours(),
            window_hours: default_window_hours(),
            default_description: default_description(),
            export_path: None,
        }
    }
}

impl CollectionConfig {
    pub fn interval(&self) -> Result<Duration> {
        self.interval_hours
            .checked_mul(3600)
            .map(Duration::from_secs)
            .ok_or_else(|| {
                Error::Config(format!(
                    "collection.interval_hours is out of range: {}",
                    self.interval_hours
                ))
            })
    }

    pub fn window(&self) -> Result<chrono::Duration> {
        i64::try_from(self.window_hours)
            .ok()
            .and_then(chrono::Duration::try_hours)
            .ok_or_else(|| {
                Error::Config(format!(
                    "collection.window_hours is out of range: {}",
                    self.window_hours
                ))
            })
    }

    /// The export path, defaulting to the data directory.
    pub fn export_path(&self) -> PathBuf {
        self.export_path
            .clone()
            .unwrap_or_else(|| Config::data_dir().join("websites_data.json"))
    }
}

fn default_interval_hours() -> u64 {
    24
}

fn default_window_hours() -> u64 {
    24
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Secrets read from a `KEY=value` file.
///
/// Recognized keys are `TOKEN` and `CHANNEL_ID`; other lines are ignored.
#[derive(Default, Clone, PartialEq, Eq)]
pub struct Secrets {
    pub token: Option<String>,
    pub channel_id: Option<ChannelId>,
}

impl fmt::Debug for Secrets {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Secrets")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

impl Secrets {
    /// Parse secrets file content
    pub fn parse(content: &str) -> Result<Self> {
        let mut secrets = Secrets::default();

        for line in content.lines() {
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                "TOKEN" => secrets.token = Some(value.to_string()),
                "CHANNEL_ID" => {
                    secrets.channel_id = Some(parse_channel_id(value)?);
                }
                _ => {}
            }
        }

        Ok(secrets)
    }

    /// Load secrets from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read secrets file {:?}: {}", path, e)))?;
        Self::parse(&content)
    }
}

fn parse_channel_id(value: &str) -> Result<ChannelId> {
    value
        .trim()
        .parse()
        .map_err(|_| Error::Config(format!("invalid channel id: {:?}", value)))
}

impl Config {
    /// Load configuration from the default paths and the environment
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        let mut config = if config_path.exists() {
            Self::load_from(&config_path)?
        } else {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            Config::default()
        };

        let secrets_path = Self::secrets_path();
        if secrets_path.exists() {
            config.apply_secrets(Secrets::load_from(&secrets_path)?);
        }

        config.apply_env()?;
        Ok(config)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &PathBuf) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        Ok(config)
    }

    /// Overlay values from a secrets file
    pub fn apply_secrets(&mut self, secrets: Secrets) {
        if secrets.token.is_some() {
            self.chat.token = secrets.token;
        }
        if secrets.channel_id.is_some() {
            self.chat.channel_id = secrets.channel_id;
        }
    }

    /// Overlay `SITEREF_TOKEN` and `SITEREF_CHANNEL_ID`
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(token) = std::env::var(TOKEN_ENV) {
            self.chat.token = Some(token);
        }
        if let Ok(channel_id) = std::env::var(CHANNEL_ID_ENV) {
            self.chat.channel_id = Some(parse_channel_id(&channel_id)?);
        }
        Ok(())
    }

    /// Validate settings shared by every binary
    pub fn validate(&self) -> Result<()> {
        if self.chat.command_prefix.is_empty() {
            return Err(Error::Config(
                "chat.command_prefix must not be empty".to_string(),
            ));
        }
        for (key, hours) in [
            ("interval_hours", self.collection.interval_hours),
            ("window_hours", self.collection.window_hours),
        ] {
            if !(1..=MAX_HOURS).contains(&hours) {
                return Err(Error::Config(format!(
                    "collection.{key} must be between 1 and {MAX_HOURS}, got {hours}"
                )));
            }
        }
        Ok(())
    }

    /// Validate settings the collector needs, returning the channel to scan
    pub fn validate_collector(&self) -> Result<ChannelId> {
        self.validate()?;
        self.chat.channel_id.ok_or_else(|| {
            Error::Config(format!(
                "chat.channel_id is required (config file, CHANNEL_ID in secrets, or {})",
                CHANNEL_ID_ENV
            ))
        })
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/siteref/config.toml` (~/.config/siteref/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("siteref").join("config.toml")
    }

    /// Returns the default secrets file path
    ///
    /// `$XDG_CONFIG_HOME/siteref/.secrets` (~/.config/siteref/.secrets)
    pub fn secrets_path() -> PathBuf {
        xdg_config_home().join("siteref").join(".secrets")
    }

    /// Returns the data directory path (for SQLite database)
    ///
    /// `$XDG_DATA_HOME/siteref/` (~/.local/share/siteref/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("siteref")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/siteref/` (~/.local/state/siteref/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("siteref")
    }

    /// Returns the database file path
    ///
    /// `$XDG_DATA_HOME/siteref/websites.db` (~/.local/share/siteref/websites.db)
    pub fn database_path() -> PathBuf {
        Self::data_dir().join("websites.db")
    }

    /// Returns the log file path
    ///
    /// `$XDG_STATE_HOME/siteref/siteref.log` (~/.local/state/siteref/siteref.log)
    pub fn log_path() -> PathBuf {
        Self::state_dir().join("siteref.log")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.chat.token.is_none());
        assert!(config.chat.channel_id.is_none());
        assert_eq!(config.chat.command_prefix, "!");
        assert_eq!(config.collection.interval_hours, 24);
        assert_eq!(config.collection.window_hours, 24);
        assert_eq!(config.collection.default_description, DEFAULT_DESCRIPTION);
        assert_eq!(
            config.collection.interval().unwrap(),
            Duration::from_secs(86_400)
        );
        assert_eq!(
            config.collection.window().unwrap(),
            chrono::Duration::hours(24)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_config() {
        let toml = r#"
[chat]
token = "abc"
channel_id = 987654321
bot_identity = "linkbot"

[collection]
interval_hours = 12
export_path = "/tmp/export.json"

[logging]
level = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.chat.token.as_deref(), Some("abc"));
        assert_eq!(config.chat.channel_id, Some(987654321));
        assert_eq!(config.chat.bot_identity, "linkbot");
        assert_eq!(config.chat.command_prefix, "!");
        assert_eq!(config.collection.interval_hours, 12);
        assert_eq!(config.collection.window_hours, 24);
        assert_eq!(
            config.collection.export_path(),
            PathBuf::from("/tmp/export.json")
        );
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.validate_collector().unwrap(), 987654321);
    }

    #[test]
    fn test_parse_secrets() {
        let secrets = Secrets::parse("TOKEN=my-token\nCHANNEL_ID=42\n\nOTHER=x\n").unwrap();
        assert_eq!(secrets.token.as_deref(), Some("my-token"));
        assert_eq!(secrets.channel_id, Some(42));
    }

    #[test]
    fn test_parse_secrets_rejects_bad_channel() {
        assert!(Secrets::parse("CHANNEL_ID=general").is_err());
    }

    #[test]
    fn test_secrets_override_config() {
        let mut config = Config::default();
        config.chat.channel_id = Some(1);
        config.apply_secrets(Secrets {
            token: Some("t".to_string()),
            channel_id: None,
        });
        assert_eq!(config.chat.token.as_deref(), Some("t"));
        assert_eq!(config.chat.channel_id, Some(1));
    }

    #[test]
    fn test_collector_requires_channel() {
        let config = Config::default();
        assert!(matches!(
            config.validate_collector(),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn test_zero_interval_rejected() {
        let mut config = Config::default();
        config.collection.interval_hours = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_oversized_hours_rejected() {
        let mut config = Config::default();
        config.collection.window_hours = u64::MAX / 2;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(matches!(config.collection.window(), Err(Error::Config(_))));

        let mut config = Config::default();
        config.collection.interval_hours = u64::MAX;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
        assert!(matches!(
            config.collection.interval(),
            Err(Error::Config(_))
        ));

        let mut config = Config::default();
        config.collection.window_hours = MAX_HOURS;
        config.collection.interval_hours = MAX_HOURS;
        assert!(config.validate().is_ok());
        assert!(config.collection.window().is_ok());
        assert!(config.collection.interval().is_ok());
    }

    #[test]
    fn test_debug_redacts_token() {
        let mut config = Config::default();
        config.chat.token = Some("super-secret".to_string());
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("super-secret"));
        assert!(rendered.contains("<redacted>"));
    }
}
