use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::AppError;
use crate::types::ChatId;

/// Settings file used when `RELAY_CONFIG` is not set.
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Default Telegram Bot API endpoint.
pub const DEFAULT_API_URL: &str = "https://api.telegram.org";

/// Non-secret `[telegram]` section of the settings file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelegramSettings {
    pub session_name: String,
    pub api_url: String,
    /// Long-poll timeout for `getUpdates`, in seconds
    pub poll_timeout_secs: u64,
}

impl Default for TelegramSettings {
    fn default() -> Self {
        Self {
            session_name: "reaction_relay".to_string(),
            api_url: DEFAULT_API_URL.to_string(),
            poll_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdvancedSettings {
    /// Reactions examined per event; the tail beyond this is dropped
    pub max_reactions_per_message: usize,
    /// When false, no participant survives filtering
    pub fetch_user_data: bool,
}

impl Default for AdvancedSettings {
    fn default() -> Self {
        Self {
            max_reactions_per_message: 10,
            fetch_user_data: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationSettings {
    /// Send attempts per notification (ceiling, >= 1)
    pub retry_attempts: u32,
    /// Constant delay between attempts, in seconds
    pub retry_delay: u64,
}

impl NotificationSettings {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay)
    }
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_delay: 2,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HealthCheckSettings {
    /// Heartbeat period in seconds
    pub interval: u64,
}

impl HealthCheckSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

impl Default for HealthCheckSettings {
    fn default() -> Self {
        Self { interval: 60 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub log_file: String,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: "logs/bot.log".to_string(),
            level: "INFO".to_string(),
        }
    }
}

/// Raw contents of the settings file. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SettingsFile {
    pub telegram: TelegramSettings,
    pub advanced_settings: AdvancedSettings,
    pub notifications: NotificationSettings,
    pub health_check: HealthCheckSettings,
    pub logging: LoggingConfig,
}

impl SettingsFile {
    /// Read and parse the settings file alone, without credentials.
    pub fn read(path: &Path) -> Result<Self, AppError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!(
                "Configuration file not found at {}: {}",
                path.display(),
                e
            ))
        })?;
        parse_settings(&content)
    }
}

/// Telegram credentials, sourced only from the environment.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_id: String,
    pub api_hash: String,
    pub bot_token: String,
    pub owner_id: String,
}

impl Credentials {
    /// Read credentials from environment variables (and `.env`, if present).
    /// Unset variables come back empty and are rejected by `PipelineConfig::new`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let var = |name: &str| std::env::var(name).unwrap_or_default();
        Self {
            api_id: var("TELEGRAM_API_ID"),
            api_hash: var("TELEGRAM_API_HASH"),
            bot_token: var("TELEGRAM_BOT_TOKEN"),
            owner_id: var("OWNER_USER_ID"),
        }
    }
}

/// Resolved `[telegram]` section: credentials plus connection settings.
#[derive(Clone)]
pub struct TelegramConfig {
    pub api_id: String,
    pub api_hash: String,
    pub bot_token: String,
    /// Destination for every notification
    pub owner_id: ChatId,
    pub session_name: String,
    pub api_url: String,
    pub poll_timeout_secs: u64,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("bot_token", &"<redacted>")
            .field("owner_id", &self.owner_id)
            .field("session_name", &self.session_name)
            .field("api_url", &self.api_url)
            .field("poll_timeout_secs", &self.poll_timeout_secs)
            .finish()
    }
}

/// Fully resolved pipeline configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub telegram: TelegramConfig,
    pub advanced_settings: AdvancedSettings,
    pub notifications: NotificationSettings,
    pub health_check: HealthCheckSettings,
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Combine file settings with credentials, rejecting anything incomplete.
    pub fn new(settings: SettingsFile, credentials: Credentials) -> Result<Self, AppError> {
        let missing: Vec<&str> = [
            ("TELEGRAM_API_ID", &credentials.api_id),
            ("TELEGRAM_API_HASH", &credentials.api_hash),
            ("TELEGRAM_BOT_TOKEN", &credentials.bot_token),
            ("OWNER_USER_ID", &credentials.owner_id),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if !missing.is_empty() {
            return Err(AppError::Config(format!(
                "Missing one or more required environment variables for Telegram API credentials: {}",
                missing.join(", ")
            )));
        }

        let owner_id: ChatId = credentials
            .owner_id
            .trim()
            .parse()
            .map_err(|_| AppError::Config("OWNER_USER_ID must be a valid i64".to_string()))?;

        if settings.notifications.retry_attempts == 0 {
            return Err(AppError::Config(
                "notifications.retry_attempts must be at least 1".to_string(),
            ));
        }
        if settings.health_check.interval == 0 {
            return Err(AppError::Config(
                "health_check.interval must be at least 1 second".to_string(),
            ));
        }

        Ok(Self {
            telegram: TelegramConfig {
                api_id: credentials.api_id,
                api_hash: credentials.api_hash,
                bot_token: credentials.bot_token,
                owner_id,
                session_name: settings.telegram.session_name,
                api_url: settings.telegram.api_url.trim_end_matches('/').to_string(),
                poll_timeout_secs: settings.telegram.poll_timeout_secs,
            },
            advanced_settings: settings.advanced_settings,
            notifications: settings.notifications,
            health_check: settings.health_check,
            logging: settings.logging,
        })
    }

    /// Parse settings from TOML text and combine them with `credentials`.
    pub fn from_toml_str(content: &str, credentials: Credentials) -> Result<Self, AppError> {
        Self::new(parse_settings(content)?, credentials)
    }

    /// Load the settings file at `path` and read credentials from the environment.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let mut settings = SettingsFile::read(path)?;
        let credentials = Credentials::from_env();
        if let Ok(api_url) = std::env::var("TELEGRAM_API_URL") {
            settings.telegram.api_url = api_url;
        }
        Self::new(settings, credentials)
    }
}

fn parse_settings(content: &str) -> Result<SettingsFile, AppError> {
    toml::from_str(content)
        .map_err(|e| AppError::Config(format!("Error parsing settings file: {}", e)))
}

/// Anything that can produce a resolved `PipelineConfig` on demand.
///
/// The supervisor resolves configuration on every start, so edits to the
/// settings file or environment take effect on the next run.
pub trait ConfigSource: Send + Sync {
    fn load(&self) -> Result<PipelineConfig, AppError>;
}

/// Settings file on disk plus credentials from the environment.
#[derive(Debug, Clone)]
pub struct FileConfigSource {
    path: PathBuf,
}

impl FileConfigSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use `RELAY_CONFIG` if set, otherwise `config/config.toml`.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        Self::new(
            std::env::var("RELAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
        )
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ConfigSource for FileConfigSource {
    fn load(&self) -> Result<PipelineConfig, AppError> {
        PipelineConfig::load(&self.path)
    }
}

/// An already-resolved configuration is its own source.
impl ConfigSource for PipelineConfig {
    fn load(&self) -> Result<PipelineConfig, AppError> {
        Ok(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn credentials() -> Credentials {
        Credentials {
            api_id: "123456".to_string(),
            api_hash: "fake_api_hash".to_string(),
            bot_token: "fake_bot_token".to_string(),
            owner_id: "123456789".to_string(),
        }
    }

    const SETTINGS: &str = r#"
        [telegram]
        session_name = "my_session"

        [advanced_settings]
        max_reactions_per_message = 5
        fetch_user_data = false

        [notifications]
        retry_attempts = 4
        retry_delay = 1

        [health_check]
        interval = 30

        [logging]
        log_file = "logs/test_bot.log"
        level = "DEBUG"
    "#;

    #[test]
    fn test_parse_full_settings() {
        let config = PipelineConfig::from_toml_str(SETTINGS, credentials()).unwrap();
        assert_eq!(config.telegram.api_id, "123456");
        assert_eq!(config.telegram.owner_id, 123456789);
        assert_eq!(config.telegram.session_name, "my_session");
        assert_eq!(config.advanced_settings.max_reactions_per_message, 5);
        assert!(!config.advanced_settings.fetch_user_data);
        assert_eq!(config.notifications.retry_attempts, 4);
        assert_eq!(config.notifications.retry_delay(), Duration::from_secs(1));
        assert_eq!(config.health_check.interval(), Duration::from_secs(30));
        assert_eq!(config.logging.level, "DEBUG");
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let config = PipelineConfig::from_toml_str("", credentials()).unwrap();
        assert_eq!(config.advanced_settings.max_reactions_per_message, 10);
        assert!(config.advanced_settings.fetch_user_data);
        assert_eq!(config.notifications.retry_attempts, 3);
        assert_eq!(config.notifications.retry_delay, 2);
        assert_eq!(config.health_check.interval, 60);
    }

    #[test]
    fn test_missing_credential_is_rejected() {
        let mut creds = credentials();
        creds.bot_token = String::new();
        creds.owner_id = "  ".to_string();

        let err = PipelineConfig::new(SettingsFile::default(), creds).unwrap_err();
        match err {
            AppError::Config(msg) => {
                assert!(msg.contains("TELEGRAM_BOT_TOKEN"));
                assert!(msg.contains("OWNER_USER_ID"));
                assert!(!msg.contains("TELEGRAM_API_HASH"));
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_non_numeric_owner_is_rejected() {
        let mut creds = credentials();
        creds.owner_id = "owner".to_string();
        let err = PipelineConfig::new(SettingsFile::default(), creds).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_zero_retry_attempts_rejected() {
        let content = "[notifications]\nretry_attempts = 0\n";
        let err = PipelineConfig::from_toml_str(content, credentials()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_malformed_toml_is_config_error() {
        let err = PipelineConfig::from_toml_str("[advanced_settings\n", credentials()).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let source = FileConfigSource::new("/nonexistent/relay/config.toml");
        assert!(matches!(source.load(), Err(AppError::Config(_))));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SETTINGS.as_bytes()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        let config = PipelineConfig::from_toml_str(&content, credentials()).unwrap();
        assert_eq!(config.logging.log_file, "logs/test_bot.log");
    }

    #[test]
    fn test_read_settings_without_credentials() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(SETTINGS.as_bytes()).unwrap();

        let settings = SettingsFile::read(file.path()).unwrap();
        assert_eq!(settings.logging.log_file, "logs/test_bot.log");

        let missing = SettingsFile::read(Path::new("/nonexistent/relay/config.toml"));
        assert!(matches!(missing, Err(AppError::Config(_))));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = PipelineConfig::from_toml_str("", credentials()).unwrap();
        let rendered = format!("{:?}", config);
        assert!(!rendered.contains("fake_bot_token"));
        assert!(!rendered.contains("fake_api_hash"));
    }
}
