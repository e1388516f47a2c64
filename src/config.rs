//! Walkthrough timings and inputs, loaded from an optional TOML file.

use crate::error::ConfigError;
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming an optional TOML config file.
pub const CONFIG_ENV: &str = "FUTURES_WALKTHROUGH_CONFIG";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalkthroughConfig {
    /// Input handed to every worker.
    pub input: i64,
    /// How long an ordinary worker "calculates".
    pub compute_delay_ms: u64,
    /// How long the worker in the timeout block calculates.
    pub slow_compute_delay_ms: u64,
    /// How long the timeout block is willing to wait.
    pub read_timeout_ms: u64,
    /// Number of concurrent readers in the memo and broadcast blocks.
    pub readers: usize,
    /// When the cancel block cancels its worker.
    pub cancel_after_ms: u64,
    /// Deadline given to the worker in the deadline block.
    pub worker_deadline_ms: u64,
}

impl Default for WalkthroughConfig {
    fn default() -> Self {
        Self {
            input: 1,
            compute_delay_ms: 1000,
            slow_compute_delay_ms: 2000,
            read_timeout_ms: 1000,
            readers: 3,
            cancel_after_ms: 300,
            worker_deadline_ms: 500,
        }
    }
}

impl WalkthroughConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    /// Reads the file named by [`CONFIG_ENV`], or falls back to the defaults.
    pub fn load() -> Result<Self, ConfigError> {
        match env::var_os(CONFIG_ENV) {
            Some(path) => {
                log::info!("loading walkthrough config from {:?}", path);
                Self::from_file(Path::new(&path))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.readers == 0 {
            return Err(ConfigError::invalid("readers", "must be at least 1"));
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::invalid("read_timeout_ms", "must be positive"));
        }
        if self.worker_deadline_ms == 0 {
            return Err(ConfigError::invalid("worker_deadline_ms", "must be positive"));
        }
        if self.input.checked_mul(32).is_none() {
            return Err(ConfigError::invalid("input", "too large to scale by 32"));
        }
        Ok(())
    }

    pub fn compute_delay(&self) -> Duration {
        Duration::from_millis(self.compute_delay_ms)
    }

    pub fn slow_compute_delay(&self) -> Duration {
        Duration::from_millis(self.slow_compute_delay_ms)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn cancel_after(&self) -> Duration {
        Duration::from_millis(self.cancel_after_ms)
    }

    pub fn worker_deadline(&self) -> Duration {
        Duration::from_millis(self.worker_deadline_ms)
    }
}
