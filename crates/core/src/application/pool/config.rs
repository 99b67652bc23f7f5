// Pool configuration

use crate::application::constants::*;
use crate::domain::DomainError;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    pub min_size: usize,
    pub max_size: usize,
    pub idle_timeout: Duration,
    /// Bound on both waiting for a free slot and opening a new session
    pub connect_timeout: Duration,
    /// Reaper scan interval (keep-alive interval)
    pub reaper_interval: Duration,
    pub drain_timeout: Duration,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            min_size: DEFAULT_POOL_MIN_SIZE,
            max_size: DEFAULT_POOL_MAX_SIZE,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            reaper_interval: DEFAULT_REAPER_INTERVAL,
            drain_timeout: DEFAULT_DRAIN_TIMEOUT,
        }
    }
}

impl PoolConfig {
    pub fn validate(&self) -> Result<(), DomainError> {
        if self.max_size == 0 {
            return Err(DomainError::ValidationError(
                "pool max size must be at least 1".to_string(),
            ));
        }
        if self.min_size > self.max_size {
            return Err(DomainError::ValidationError(format!(
                "pool min size ({}) exceeds max size ({})",
                self.min_size, self.max_size
            )));
        }
        for (name, value) in [
            ("idle timeout", self.idle_timeout),
            ("connect timeout", self.connect_timeout),
            ("reaper interval", self.reaper_interval),
        ] {
            if value.is_zero() {
                return Err(DomainError::ValidationError(format!(
                    "{} must be greater than zero",
                    name
                )));
            }
        }
        for (name, value) in [
            ("idle timeout", self.idle_timeout),
            ("connect timeout", self.connect_timeout),
            ("reaper interval", self.reaper_interval),
            ("drain timeout", self.drain_timeout),
        ] {
            if value > MAX_CONFIGURED_TIMEOUT {
                return Err(DomainError::ValidationError(format!(
                    "{} must not exceed {}s",
                    name,
                    MAX_CONFIGURED_TIMEOUT.as_secs()
                )));
            }
        }
        Ok(())
    }
}
