//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Which messaging gateway the bot talks through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Telegram,
    Cli,
}

impl std::str::FromStr for ChannelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "telegram" => Ok(Self::Telegram),
            "cli" => Ok(Self::Cli),
            other => Err(ConfigError::InvalidValue {
                key: "SPEAKMATE_CHANNEL".to_string(),
                message: format!("expected 'telegram' or 'cli', got '{other}'"),
            }),
        }
    }
}

/// Telegram Bot API settings.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub bot_token: SecretString,
    /// Usernames or numeric ids allowed to talk to the bot. `*` allows everyone.
    pub allowed_users: Vec<String>,
}

/// Bot configuration.
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub channel: ChannelKind,
    pub telegram: Option<TelegramConfig>,
    /// SQLite file holding the profiles table.
    pub db_path: PathBuf,
    /// Directory for the rolling log file.
    pub log_dir: PathBuf,
    /// Typing delay shown before each reply. Zero disables pacing.
    pub pacing: Duration,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            channel: ChannelKind::Cli,
            telegram: None,
            db_path: PathBuf::from("./data/speakmate.db"),
            log_dir: PathBuf::from("./logs"),
            pacing: Duration::from_millis(1500),
        }
    }
}

impl BotConfig {
    /// Build the configuration from `SPEAKMATE_*` and `TELEGRAM_*` variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let telegram = std::env::var("TELEGRAM_BOT_TOKEN").ok().map(|token| {
            let allowed_users = parse_list(
                &std::env::var("TELEGRAM_ALLOWED_USERS").unwrap_or_else(|_| "*".to_string()),
            );
            TelegramConfig {
                bot_token: SecretString::from(token),
                allowed_users,
            }
        });

        let channel = match std::env::var("SPEAKMATE_CHANNEL") {
            Ok(value) => value.parse()?,
            Err(_) if telegram.is_some() => ChannelKind::Telegram,
            Err(_) => ChannelKind::Cli,
        };

        if channel == ChannelKind::Telegram && telegram.is_none() {
            return Err(ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()));
        }

        let db_path = std::env::var("SPEAKMATE_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let log_dir = std::env::var("SPEAKMATE_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        let pacing = match std::env::var("SPEAKMATE_PACING_MS") {
            Ok(raw) => {
                let ms: u64 = raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                    key: "SPEAKMATE_PACING_MS".to_string(),
                    message: format!("not a number of milliseconds: '{raw}'"),
                })?;
                Duration::from_millis(ms)
            }
            Err(_) => defaults.pacing,
        };

        Ok(Self {
            channel,
            telegram,
            db_path,
            log_dir,
            pacing,
        })
    }
}

/// Split a comma-separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
