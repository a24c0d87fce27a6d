// Fri Oct 16 2026 - Alex

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 0 picks one worker per logical CPU.
    pub num_worker_threads: usize,
    /// Limit on queued plus running tasks.
    pub max_queue_size: usize,
    pub enable_result_cache: bool,
    pub max_cache_size: usize,
    #[serde(with = "duration_secs")]
    pub cache_expiration_time: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            num_worker_threads: 0,
            max_queue_size: 1000,
            enable_result_cache: true,
            max_cache_size: 100,
            cache_expiration_time: Duration::from_secs(30 * 60),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.num_worker_threads = threads;
        self
    }

    pub fn with_max_queue_size(mut self, size: usize) -> Self {
        self.max_queue_size = size;
        self
    }

    pub fn with_result_cache(mut self, enabled: bool) -> Self {
        self.enable_result_cache = enabled;
        self
    }

    pub fn with_max_cache_size(mut self, size: usize) -> Self {
        self.max_cache_size = size;
        self
    }

    pub fn with_cache_expiration(mut self, expiration: Duration) -> Self {
        self.cache_expiration_time = expiration;
        self
    }

    pub fn resolved_worker_threads(&self) -> usize {
        if self.num_worker_threads == 0 {
            num_cpus::get().max(1)
        } else {
            self.num_worker_threads
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queue_size == 0 {
            return Err(ConfigError::ValidationError("max_queue_size must be > 0".to_string()));
        }
        if self.max_cache_size == 0 {
            return Err(ConfigError::ValidationError("max_cache_size must be > 0".to_string()));
        }
        if self.cache_expiration_time.is_zero() {
            return Err(ConfigError::ValidationError(
                "cache_expiration_time must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }

        let contents = fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let contents = serde_json::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        fs::write(path, contents)?;
        Ok(())
    }

    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        Self::load(path).unwrap_or_default()
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Config file not found: {0:?}")]
    NotFound(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Validation error: {0}")]
    ValidationError(String),
}

// Seconds, fractional part kept.
mod duration_secs {
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(value.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|e| D::Error::custom(format!("invalid duration {}: {}", secs, e)))
    }
}
