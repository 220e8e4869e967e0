//! # Configuration Module
//!
//! Runtime settings for the bot: Telegram credentials, storage, the food
//! analysis service and its recovery policy, and session housekeeping.
//! Values come from the environment (a `.env` file is honoured by `main`).

use anyhow::{Context, Result};
use std::env;
use std::str::FromStr;
use std::time::Duration;

// Defaults
pub const DEFAULT_ANALYSIS_URL: &str = "http://localhost:8888/.netlify/functions/analyze";
pub const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_SESSION_IDLE_TTL_SECS: u64 = 24 * 60 * 60;
pub const DEFAULT_SESSION_SWEEP_INTERVAL_SECS: u64 = 10 * 60;
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024; // 10MB limit for uploaded photos

/// Recovery configuration for calls to the analysis service
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Maximum number of retry attempts after the first call
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Timeout for one analysis request in seconds
    pub operation_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            operation_timeout_secs: DEFAULT_ANALYSIS_TIMEOUT_SECS,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60, // 1 minute
        }
    }
}

impl RecoveryConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Settings of the food analysis client
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Endpoint accepting a multipart `image` upload
    pub endpoint: String,
    /// Largest photo forwarded to the service, in bytes
    pub max_image_size: usize,
    pub recovery: RecoveryConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ANALYSIS_URL.to_string(),
            max_image_size: MAX_IMAGE_SIZE,
            recovery: RecoveryConfig::default(),
        }
    }
}

/// Session housekeeping
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Sessions idle for this long are evicted
    pub idle_ttl: Duration,
    /// How often the sweeper runs
    pub sweep_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_ttl: Duration::from_secs(DEFAULT_SESSION_IDLE_TTL_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SESSION_SWEEP_INTERVAL_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow::anyhow!("unknown log format '{other}'")),
        }
    }
}

/// Top-level bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub telegram_bot_token: String,
    /// PostgreSQL connection string; without it records are kept in memory
    pub database_url: Option<String>,
    pub analysis: AnalysisConfig,
    pub session: SessionConfig,
    pub log_format: LogFormat,
}

impl BotConfig {
    /// Read the configuration from process environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read the configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let telegram_bot_token = lookup("TELEGRAM_BOT_TOKEN")
            .filter(|token| !token.trim().is_empty())
            .context("TELEGRAM_BOT_TOKEN must be set")?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let mut analysis = AnalysisConfig::default();
        if let Some(endpoint) = lookup("ANALYSIS_URL") {
            analysis.endpoint = endpoint;
        }
        if let Some(secs) = parse_var(&lookup, "ANALYSIS_TIMEOUT_SECS")? {
            analysis.recovery.operation_timeout_secs = secs;
        }
        if let Some(retries) = parse_var(&lookup, "ANALYSIS_MAX_RETRIES")? {
            analysis.recovery.max_retries = retries;
        }

        let mut session = SessionConfig::default();
        if let Some(secs) = parse_var(&lookup, "SESSION_IDLE_TTL_SECS")? {
            session.idle_ttl = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64, _>(&lookup, "SESSION_SWEEP_INTERVAL_SECS")? {
            session.sweep_interval = Duration::from_secs(secs.max(1));
        }

        let log_format = match lookup("LOG_FORMAT") {
            Some(raw) => raw.parse()?,
            None => LogFormat::default(),
        };

        Ok(Self {
            telegram_bot_token,
            database_url,
            analysis,
            session,
            log_format,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .with_context(|| format!("{key} has an invalid value '{raw}'"))
        })
        .transpose()
}
