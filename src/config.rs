//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (bot token, exchange keys) are referenced by env-var name in the
//! config and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub bot: BotConfig,
    pub store: StoreConfig,
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub lending: LendingConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    /// Name of the env var holding the bot token. Required at startup.
    #[serde(default = "default_token_env")]
    pub token_env: String,
    #[serde(default = "default_bot_api_base")]
    pub api_base: String,
    #[serde(default = "default_poll_timeout")]
    pub poll_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StoreConfig {
    pub path: String,
    /// Wait for durable writes before replying (and report failures).
    #[serde(default)]
    pub await_writes: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub api_key_env: Option<String>,
    pub api_secret_env: Option<String>,
    pub subaccount_env: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LendingConfig {
    pub interval_secs: u64,
    /// Floor for the hourly rate used when re-offering funds.
    pub min_rate: f64,
    /// Number of coins shown by `/top10` and `/top10crypto`.
    pub top_limit: usize,
}

impl Default for LendingConfig {
    fn default() -> Self {
        Self {
            interval_secs: 3600,
            min_rate: 0.000001,
            top_limit: 10,
        }
    }
}

fn default_token_env() -> String {
    "BOT_TOKEN".to_string()
}

fn default_bot_api_base() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> u64 {
    30
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// Resolve an optional secret reference. Unset or empty variables map to `None`.
    pub fn resolve_secret(env_name: Option<&str>) -> Option<SecretString> {
        env_name
            .and_then(|name| std::env::var(name).ok())
            .filter(|value| !value.is_empty())
            .map(SecretString::new)
    }

    /// The bot token. Missing token is a startup failure.
    pub fn bot_token(&self) -> Result<SecretString> {
        let token = Self::resolve_env(&self.bot.token_env)?;
        if token.is_empty() {
            anyhow::bail!("Environment variable is empty: {}", self.bot.token_env);
        }
        Ok(SecretString::new(token))
    }
}
