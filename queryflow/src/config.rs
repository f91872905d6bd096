//! Application configuration from the environment.

use crate::errors::ConfigError;
use crate::pipeline::{PipelineConfig, DEFAULT_MAX_ATTEMPTS};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// API credential for the generative stages.
pub const ENV_API_KEY: &str = "ANTHROPIC_API_KEY";
/// SQLite file the queries run against.
pub const ENV_DB_PATH: &str = "QUERYFLOW_DB_PATH";
/// Column dictionary CSV.
pub const ENV_DICTIONARY_PATH: &str = "QUERYFLOW_DICTIONARY_PATH";
/// Model identifier.
pub const ENV_MODEL: &str = "QUERYFLOW_MODEL";
/// Token limit for the structured stages.
pub const ENV_MAX_TOKENS: &str = "QUERYFLOW_MAX_TOKENS";
/// Token limit for answer synthesis.
pub const ENV_ANSWER_MAX_TOKENS: &str = "QUERYFLOW_ANSWER_MAX_TOKENS";
/// Bound on execute attempts.
pub const ENV_MAX_ATTEMPTS: &str = "QUERYFLOW_MAX_ATTEMPTS";
/// Whole-question timeout in seconds.
pub const ENV_TIMEOUT_SECS: &str = "QUERYFLOW_TIMEOUT_SECS";
/// Command line of an out-of-process stage server.
pub const ENV_SERVER_COMMAND: &str = "QUERYFLOW_SERVER_COMMAND";

/// Default model identifier.
pub const DEFAULT_MODEL: &str = "claude-3-5-sonnet-20241022";

/// Everything the CLI needs, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// API credential; required only when stages run in this process.
    pub api_key: Option<String>,
    /// SQLite file.
    pub db_path: PathBuf,
    /// Column dictionary CSV.
    pub dictionary_path: PathBuf,
    /// Model identifier.
    pub model: String,
    /// Token limit for the structured stages.
    pub max_tokens: u32,
    /// Token limit for answer synthesis.
    pub answer_max_tokens: u32,
    /// Bound on execute attempts.
    pub max_attempts: usize,
    /// Whole-question timeout.
    pub timeout: Option<Duration>,
    /// Stage server command line; stages run in-process when unset.
    pub server_command: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            db_path: PathBuf::from("data/electric_vehicle_data.db"),
            dictionary_path: PathBuf::from("data/data_dictionary.csv"),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: 1024,
            answer_max_tokens: 2048,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: None,
            server_command: None,
        }
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let timeout = parse_opt::<f64>(ENV_TIMEOUT_SECS, get(ENV_TIMEOUT_SECS))?
            .map(|secs| {
                if secs.is_finite() && secs > 0.0 {
                    Ok(Duration::from_secs_f64(secs))
                } else {
                    Err(invalid(ENV_TIMEOUT_SECS, &secs.to_string(), "must be a positive number"))
                }
            })
            .transpose()?;

        let max_attempts = parse_opt::<usize>(ENV_MAX_ATTEMPTS, get(ENV_MAX_ATTEMPTS))?
            .unwrap_or(defaults.max_attempts);
        if max_attempts == 0 {
            return Err(invalid(ENV_MAX_ATTEMPTS, "0", "must be at least 1"));
        }

        Ok(Self {
            api_key: get(ENV_API_KEY),
            db_path: get(ENV_DB_PATH).map_or(defaults.db_path, PathBuf::from),
            dictionary_path: get(ENV_DICTIONARY_PATH).map_or(defaults.dictionary_path, PathBuf::from),
            model: get(ENV_MODEL).unwrap_or(defaults.model),
            max_tokens: parse_opt(ENV_MAX_TOKENS, get(ENV_MAX_TOKENS))?
                .unwrap_or(defaults.max_tokens),
            answer_max_tokens: parse_opt(ENV_ANSWER_MAX_TOKENS, get(ENV_ANSWER_MAX_TOKENS))?
                .unwrap_or(defaults.answer_max_tokens),
            max_attempts,
            timeout,
            server_command: get(ENV_SERVER_COMMAND),
        })
    }

    /// The orchestrator settings carried by this config.
    #[must_use]
    pub fn pipeline_config(&self) -> PipelineConfig {
        let config = PipelineConfig::new().with_max_attempts(self.max_attempts);
        match self.timeout {
            Some(timeout) => config.with_ask_timeout(timeout),
            None => config,
        }
    }
}

fn invalid(key: &str, value: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn parse_opt<T>(key: &str, raw: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.map(|value| {
        value
            .trim()
            .parse::<T>()
            .map_err(|e| invalid(key, &value, e.to_string()))
    })
    .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.pipeline_config(), PipelineConfig::default());
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            (ENV_API_KEY, "sk-test"),
            (ENV_DB_PATH, "/tmp/ev.db"),
            (ENV_MODEL, "claude-3-haiku"),
            (ENV_MAX_ATTEMPTS, "5"),
            (ENV_TIMEOUT_SECS, "2.5"),
            (ENV_SERVER_COMMAND, "queryflow serve"),
        ]))
        .unwrap();

        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert_eq!(config.db_path, PathBuf::from("/tmp/ev.db"));
        assert_eq!(config.model, "claude-3-haiku");
        assert_eq!(config.server_command.as_deref(), Some("queryflow serve"));

        let pipeline = config.pipeline_config();
        assert_eq!(pipeline.max_attempts, 5);
        assert_eq!(pipeline.ask_timeout, Some(Duration::from_millis(2500)));
    }

    #[test]
    fn test_blank_values_are_unset() {
        let config = AppConfig::from_lookup(lookup(&[(ENV_API_KEY, "  ")])).unwrap();
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_malformed_number() {
        let err = AppConfig::from_lookup(lookup(&[(ENV_MAX_TOKENS, "lots")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == ENV_MAX_TOKENS));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[(ENV_MAX_ATTEMPTS, "0")])).is_err());
    }

    #[test]
    fn test_negative_timeout_rejected() {
        assert!(AppConfig::from_lookup(lookup(&[(ENV_TIMEOUT_SECS, "-1")])).is_err());
    }
}
