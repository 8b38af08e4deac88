//! Engine Configuration
//!
//! Settings can come from a YAML file, CLI flags, or defaults. Default
//! paths live under `$CONTINUATOR_HOME`, falling back to `.continuator` in
//! the current directory.
//!
//! # Example YAML Format
//!
//! ```yaml
//! executor_timeout_ms: 30000
//! state_path: /var/lib/continuator/state.json
//! templates_path: /etc/continuator/templates.yaml
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default executor time limit.
pub const DEFAULT_EXECUTOR_TIMEOUT_MS: u64 = 30_000;

/// Lazily-resolved application directory.
pub static CONTINUATOR_HOME: Lazy<PathBuf> = Lazy::new(|| {
    let home = std::env::var_os("CONTINUATOR_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(".continuator"));
    debug!("Using continuator home: {}", home.display());
    home
});

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config '{path}': {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Runtime settings for the continuation engine and CLI.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Executor time limit in milliseconds; `0` disables the limit
    pub executor_timeout_ms: u64,

    /// Instance state file used by the CLI
    pub state_path: PathBuf,

    /// Template catalog used by the CLI
    pub templates_path: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            executor_timeout_ms: DEFAULT_EXECUTOR_TIMEOUT_MS,
            state_path: CONTINUATOR_HOME.join("state.json"),
            templates_path: CONTINUATOR_HOME.join("templates.yaml"),
        }
    }
}

impl EngineConfig {
    /// Loads configuration from a YAML file; missing keys take defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml_str(&content)?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// Executor time limit, or `None` when disabled.
    pub fn executor_timeout(&self) -> Option<Duration> {
        (self.executor_timeout_ms > 0).then(|| Duration::from_millis(self.executor_timeout_ms))
    }

    pub fn with_executor_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.executor_timeout_ms = timeout.map_or(0, |t| t.as_millis() as u64);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.executor_timeout_ms, DEFAULT_EXECUTOR_TIMEOUT_MS);
        assert_eq!(config.executor_timeout(), Some(Duration::from_secs(30)));
        assert!(config.state_path.ends_with("state.json"));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = EngineConfig::from_yaml_str("executor_timeout_ms: 500\n").unwrap();
        assert_eq!(config.executor_timeout(), Some(Duration::from_millis(500)));
        assert!(config.templates_path.ends_with("templates.yaml"));
    }

    #[test]
    fn test_zero_timeout_disables_limit() {
        let config = EngineConfig::from_yaml_str("executor_timeout_ms: 0").unwrap();
        assert_eq!(config.executor_timeout(), None);
    }

    #[test]
    fn test_with_executor_timeout() {
        let config = EngineConfig::default().with_executor_timeout(None);
        assert_eq!(config.executor_timeout_ms, 0);

        let config = config.with_executor_timeout(Some(Duration::from_millis(1500)));
        assert_eq!(config.executor_timeout_ms, 1500);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(EngineConfig::from_yaml_str("  ").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("continuator.yaml");
        fs::write(&path, "state_path: /tmp/custom.json\n").unwrap();

        let config = EngineConfig::load(&path).unwrap();
        assert_eq!(config.state_path, PathBuf::from("/tmp/custom.json"));
    }

    #[test]
    fn test_load_missing_file() {
        let result = EngineConfig::load("/nonexistent/continuator.yaml");
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_invalid_yaml() {
        let result = EngineConfig::from_yaml_str("executor_timeout_ms: soon");
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }
}
