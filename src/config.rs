use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use teloxide::types::ChatId;

use crate::assistant::gemini::DEFAULT_MODEL;

/// Errors that can occur when loading configuration.
#[derive(Debug, PartialEq)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    Missing(&'static str),
    /// A variable is set but unusable.
    Invalid { key: &'static str, reason: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing(key) => write!(f, "missing required environment variable {}", key),
            Self::Invalid { key, reason } => write!(f, "invalid value for {}: {}", key, reason),
        }
    }
}

impl std::error::Error for ConfigError {}

pub struct Config {
    pub telegram_bot_token: String,
    pub gemini_api_key: String,
    pub open_weather_api_key: String,
    pub news_api_key: String,
    pub gemini_model: String,
    pub gemini_temperature: f32,
    /// Headlines returned per news lookup (1-20).
    pub news_max_results: usize,
    /// Applied to every outbound HTTP call.
    pub http_timeout: Duration,
    /// Directory for state files (logs, history database).
    pub data_dir: PathBuf,
    /// SQLite history file, relative to `data_dir`. Unset keeps history in memory.
    pub history_db: Option<PathBuf>,
    /// 0 disables the status server.
    pub status_port: u16,
    pub log_chat_id: Option<ChatId>,
}

impl Config {
    /// Load from the process environment (after `.env`, if any, has been read).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Empty values count as unset.
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let require = |key: &'static str| get(key).ok_or(ConfigError::Missing(key));

        let telegram_bot_token = require("TELEGRAM_BOT_TOKEN")?;
        // Telegram tokens are formatted as {bot_id}:{secret} where bot_id is numeric
        let token_parts: Vec<&str> = telegram_bot_token.split(':').collect();
        if token_parts.len() != 2 || token_parts[0].parse::<u64>().is_err() || token_parts[1].is_empty() {
            return Err(ConfigError::Invalid {
                key: "TELEGRAM_BOT_TOKEN",
                reason: "expected format 123456789:ABCdefGHI...".into(),
            });
        }

        let gemini_api_key = require("GEMINI_API_KEY")?;
        let open_weather_api_key = require("OPEN_WEATHER_API_KEY")?;
        let news_api_key = require("NEWS_API_KEY")?;

        let gemini_model = get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let gemini_temperature = parse_or(get("GEMINI_TEMPERATURE"), "GEMINI_TEMPERATURE", 0.1f32)?;
        if !(0.0..=2.0).contains(&gemini_temperature) {
            return Err(ConfigError::Invalid {
                key: "GEMINI_TEMPERATURE",
                reason: "must be between 0 and 2".into(),
            });
        }

        let news_max_results = parse_or(get("NEWS_MAX_RESULTS"), "NEWS_MAX_RESULTS", 5usize)?;
        if !(1..=20).contains(&news_max_results) {
            return Err(ConfigError::Invalid {
                key: "NEWS_MAX_RESULTS",
                reason: "must be between 1 and 20".into(),
            });
        }

        let timeout_secs = parse_or(get("HTTP_TIMEOUT_SECS"), "HTTP_TIMEOUT_SECS", 30u64)?;
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "HTTP_TIMEOUT_SECS",
                reason: "must be positive".into(),
            });
        }

        let status_port = parse_or(get("STATUS_PORT"), "STATUS_PORT", 5001u16)?;
        let log_chat_id = get("LOG_CHAT_ID")
            .map(|v| {
                v.parse::<i64>().map(ChatId).map_err(|e| ConfigError::Invalid {
                    key: "LOG_CHAT_ID",
                    reason: e.to_string(),
                })
            })
            .transpose()?;

        Ok(Self {
            telegram_bot_token,
            gemini_api_key,
            open_weather_api_key,
            news_api_key,
            gemini_model,
            gemini_temperature,
            news_max_results,
            http_timeout: Duration::from_secs(timeout_secs),
            data_dir: get("DATA_DIR").map(PathBuf::from).unwrap_or_else(|| PathBuf::from(".")),
            history_db: get("HISTORY_DB").map(PathBuf::from),
            status_port,
            log_chat_id,
        })
    }

    /// Full path of the history database, if one is configured.
    pub fn history_db_path(&self) -> Option<PathBuf> {
        self.history_db.as_ref().map(|p| self.data_dir.join(p))
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }
}

fn parse_or<T>(value: Option<String>, key: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: fmt::Display,
{
    match value {
        Some(v) => v.parse().map_err(|e: T::Err| ConfigError::Invalid {
            key,
            reason: format!("'{}': {}", v, e),
        }),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("TELEGRAM_BOT_TOKEN", "123456789:ABCdefGHIjkl"),
            ("GEMINI_API_KEY", "gemini"),
            ("OPEN_WEATHER_API_KEY", "owm"),
            ("NEWS_API_KEY", "news"),
        ])
    }

    fn load(vars: &HashMap<&'static str, &'static str>) -> Result<Config, ConfigError> {
        Config::from_lookup(|key| vars.get(key).map(|v| v.to_string()))
    }

    #[test]
    fn test_defaults() {
        let config = load(&required()).unwrap();
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.gemini_temperature, 0.1);
        assert_eq!(config.news_max_results, 5);
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.data_dir, PathBuf::from("."));
        assert_eq!(config.history_db_path(), None);
        assert_eq!(config.status_port, 5001);
        assert!(config.log_chat_id.is_none());
    }

    #[test]
    fn test_each_required_key_is_enforced() {
        for key in ["TELEGRAM_BOT_TOKEN", "GEMINI_API_KEY", "OPEN_WEATHER_API_KEY", "NEWS_API_KEY"] {
            let mut vars = required();
            vars.remove(key);
            assert_eq!(load(&vars).err(), Some(ConfigError::Missing(key)));
        }
    }

    #[test]
    fn test_empty_value_counts_as_missing() {
        let mut vars = required();
        vars.insert("NEWS_API_KEY", "   ");
        assert_eq!(load(&vars).err(), Some(ConfigError::Missing("NEWS_API_KEY")));
    }

    #[test]
    fn test_bad_token_format() {
        let mut vars = required();
        vars.insert("TELEGRAM_BOT_TOKEN", "not-a-token");
        let err = load(&vars).err().unwrap();
        assert!(matches!(err, ConfigError::Invalid { key: "TELEGRAM_BOT_TOKEN", .. }));
    }

    #[test]
    fn test_overrides() {
        let mut vars = required();
        vars.insert("GEMINI_MODEL", "gemini-1.5-pro");
        vars.insert("NEWS_MAX_RESULTS", "10");
        vars.insert("DATA_DIR", "/var/lib/cristobal");
        vars.insert("HISTORY_DB", "history.db");
        vars.insert("STATUS_PORT", "0");
        vars.insert("LOG_CHAT_ID", "-1001234");

        let config = load(&vars).unwrap();
        assert_eq!(config.gemini_model, "gemini-1.5-pro");
        assert_eq!(config.news_max_results, 10);
        assert_eq!(config.history_db_path(), Some(PathBuf::from("/var/lib/cristobal/history.db")));
        assert_eq!(config.log_dir(), PathBuf::from("/var/lib/cristobal/logs"));
        assert_eq!(config.status_port, 0);
        assert_eq!(config.log_chat_id, Some(ChatId(-1001234)));
    }

    #[test]
    fn test_out_of_range_values() {
        let mut vars = required();
        vars.insert("NEWS_MAX_RESULTS", "50");
        assert!(matches!(load(&vars), Err(ConfigError::Invalid { key: "NEWS_MAX_RESULTS", .. })));

        let mut vars = required();
        vars.insert("HTTP_TIMEOUT_SECS", "abc");
        let err = load(&vars).err().unwrap();
        assert!(err.to_string().contains("HTTP_TIMEOUT_SECS"));
    }
}
