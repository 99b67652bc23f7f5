// Process settings, read from DBGUARD_* environment variables

use crate::application::constants::*;
use crate::application::{ExecutorConfig, PoolConfig};
use crate::error::{AppError, Result};
use config::{Config, Environment};
use serde::Deserialize;
use std::time::Duration;

const ENV_PREFIX: &str = "DBGUARD";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Driver connection string (e.g. `sqlite://~/.dbguard/data.db`)
    ///
    /// The default `sqlite::memory:` lives only while at least one pooled
    /// session is open. Lazy replenishment can take the pool to zero (all
    /// sessions destroyed after resets, or reaped with `min_size = 0`), which
    /// discards the data. Use a file URL for anything that must persist.
    pub database_url: String,
    pub pool_max_size: usize,
    pub pool_min_size: usize,
    pub idle_timeout_ms: u64,
    pub connect_timeout_ms: u64,
    pub statement_timeout_ms: u64,
    pub max_retries: u32,
    pub reaper_interval_ms: u64,
    pub drain_timeout_ms: u64,
    /// `development` exposes fatal driver detail to callers
    pub environment: String,
    pub rpc_host: String,
    pub rpc_port: u16,
    /// `pretty` or `json`
    pub log_format: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            database_url: "sqlite::memory:".to_string(),
            pool_max_size: DEFAULT_POOL_MAX_SIZE,
            pool_min_size: DEFAULT_POOL_MIN_SIZE,
            idle_timeout_ms: DEFAULT_IDLE_TIMEOUT.as_millis() as u64,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
            statement_timeout_ms: DEFAULT_STATEMENT_TIMEOUT.as_millis() as u64,
            max_retries: DEFAULT_MAX_RETRIES,
            reaper_interval_ms: DEFAULT_REAPER_INTERVAL.as_millis() as u64,
            drain_timeout_ms: DEFAULT_DRAIN_TIMEOUT.as_millis() as u64,
            environment: "production".to_string(),
            rpc_host: "127.0.0.1".to_string(),
            rpc_port: 9530,
            log_format: "pretty".to_string(),
        }
    }
}

impl Settings {
    /// Load from the process environment
    pub fn from_env() -> Result<Self> {
        Self::load(None)
    }

    /// Load from an explicit variable set instead of the process environment
    pub fn from_vars<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: config::Map<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        Self::load(Some(map))
    }

    fn load(source: Option<config::Map<String, String>>) -> Result<Self> {
        let settings: Settings = Config::builder()
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .try_parsing(true)
                    .source(source),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.database_url.trim().is_empty() {
            return Err(AppError::Config("database_url must not be empty".to_string()));
        }
        if self.statement_timeout_ms == 0 {
            return Err(AppError::Config(
                "statement_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if Duration::from_millis(self.statement_timeout_ms) > MAX_CONFIGURED_TIMEOUT {
            return Err(AppError::Config(format!(
                "statement_timeout_ms must not exceed {}",
                MAX_CONFIGURED_TIMEOUT.as_millis()
            )));
        }
        self.pool_config()
            .validate()
            .map_err(|e| AppError::Config(e.to_string()))
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case("development")
    }

    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            min_size: self.pool_min_size,
            max_size: self.pool_max_size,
            idle_timeout: Duration::from_millis(self.idle_timeout_ms),
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            reaper_interval: Duration::from_millis(self.reaper_interval_ms),
            drain_timeout: Duration::from_millis(self.drain_timeout_ms),
        }
    }

    pub fn executor_config(&self) -> ExecutorConfig {
        ExecutorConfig {
            statement_timeout: Duration::from_millis(self.statement_timeout_ms),
            max_retries: self.max_retries,
            redact_fatal: !self.is_development(),
        }
    }

    pub fn rpc_addr(&self) -> String {
        format!("{}:{}", self.rpc_host, self.rpc_port)
    }
}
