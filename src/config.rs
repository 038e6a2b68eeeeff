use std::time::Duration;

use chatgpt::config::ChatGPTEngine;

const DEFAULT_DB_PATH: &str = "db.sqlite";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_TEMPERATURE: f32 = 0.3;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} is not set")]
    Missing(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Runtime settings, read from the environment (and `.env`).
/// The bot token itself is read by teloxide from `TELOXIDE_TOKEN`.
#[derive(Debug, Clone)]
pub struct Config {
    pub chatgpt_api_key: String,
    pub db_path: String,
    pub model: &'static str,
    pub timeout: Duration,
    pub temperature: f32,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let chatgpt_api_key = lookup("CHATGPT_API_KEY")
            .filter(|key| !key.trim().is_empty())
            .ok_or(ConfigError::Missing("CHATGPT_API_KEY"))?;

        let timeout_secs = parse_or(&lookup, "QUIZ_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?;
        let temperature = parse_or(&lookup, "QUIZ_TEMPERATURE", DEFAULT_TEMPERATURE)?;

        Ok(Self {
            chatgpt_api_key,
            db_path: lookup("QUIZ_DB_PATH").unwrap_or_else(|| DEFAULT_DB_PATH.to_string()),
            // Engine names must be 'static, so a custom model name is leaked here, once per load
            model: lookup("QUIZ_MODEL")
                .map(|model| &*Box::leak(model.into_boxed_str()))
                .unwrap_or(DEFAULT_MODEL),
            timeout: Duration::from_secs(timeout_secs),
            temperature,
        })
    }

    pub fn engine(&self) -> ChatGPTEngine {
        match self.model {
            "gpt-3.5-turbo" => ChatGPTEngine::Gpt35Turbo,
            "gpt-4" => ChatGPTEngine::Gpt4,
            other => ChatGPTEngine::Custom(other),
        }
    }
}

fn parse_or<T: std::str::FromStr>(
    lookup: &impl Fn(&'static str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
