//! Configuration management for quota-gate.
//!
//! Settings are layered: built-in defaults, then an optional YAML file, then
//! environment variables prefixed with `QUOTA_GATE` using `__` between path
//! segments (for example `QUOTA_GATE__LOGGING__LEVEL=debug`).

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::ratelimit::{with_fixed_window, with_token_bucket, RateLimit, StrategyOption};

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "QUOTA_GATE";

/// Main configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    /// Rate limiter configuration
    #[serde(default)]
    pub limiter: LimiterConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Rate limiter configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimiterConfig {
    /// Strategy options, applied in order
    #[serde(default = "default_strategies")]
    pub strategies: Vec<StrategyConfig>,

    /// Seconds between eviction sweeps; 0 disables the sweeper
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for LimiterConfig {
    fn default() -> Self {
        Self {
            strategies: default_strategies(),
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

/// One strategy option as written in a settings file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Fixed window counter
    FixedWindow {
        /// Requests admitted per client per window
        limit: u64,
        /// Window length in milliseconds
        window_ms: u64,
    },
    /// Token bucket placeholder
    TokenBucket,
}

impl From<&StrategyConfig> for StrategyOption {
    fn from(config: &StrategyConfig) -> Self {
        match *config {
            StrategyConfig::FixedWindow { limit, window_ms } => {
                with_fixed_window(limit, Duration::from_millis(window_ms))
            }
            StrategyConfig::TokenBucket => with_token_bucket(),
        }
    }
}

fn default_strategies() -> Vec<StrategyConfig> {
    vec![StrategyConfig::FixedWindow {
        limit: 5,
        window_ms: 10_000,
    }]
}

fn default_sweep_interval() -> u64 {
    60
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LimiterConfig {
    /// The facade options these settings describe, in order.
    pub fn options(&self) -> Vec<StrategyOption> {
        self.strategies.iter().map(StrategyOption::from).collect()
    }

    /// Build the rate limiter these settings describe.
    pub fn build(&self) -> Result<RateLimit> {
        RateLimit::new(self.options())
    }

    /// Sweep period, or `None` when sweeping is disabled.
    pub fn sweep_interval(&self) -> Option<Duration> {
        match self.sweep_interval_secs {
            0 => None,
            secs => Some(Duration::from_secs(secs)),
        }
    }
}

impl GateConfig {
    /// Load defaults, then `path` if given, then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, Environment::with_prefix(ENV_PREFIX))
    }

    fn load_with_env(path: Option<&Path>, env: Environment) -> Result<Self> {
        // Anything left unset falls back to the serde defaults.
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Yaml).required(true));
        }

        builder = builder.add_source(env.separator("__").try_parsing(true));

        Ok(builder.build()?.try_deserialize()?)
    }

    /// Load configuration from a YAML string, filling in defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()?;
        Ok(config.try_deserialize()?)
    }

    /// Render the effective configuration as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GateError;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn env(vars: &[(&str, &str)]) -> Environment {
        let map: config::Map<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Environment::with_prefix(ENV_PREFIX).source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = GateConfig::default();
        assert_eq!(
            config.limiter.strategies,
            vec![StrategyConfig::FixedWindow {
                limit: 5,
                window_ms: 10_000
            }]
        );
        assert_eq!(config.limiter.sweep_interval(), Some(Duration::from_secs(60)));
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json);
    }

    #[test]
    fn test_parse_yaml() {
        let yaml = r#"
limiter:
  strategies:
    - type: fixed_window
      limit: 3
      window_ms: 2000
    - type: token_bucket
  sweep_interval_secs: 0
logging:
  level: debug
  json: true
"#;
        let config = GateConfig::from_yaml(yaml).unwrap();
        assert_eq!(
            config.limiter.strategies,
            vec![
                StrategyConfig::FixedWindow {
                    limit: 3,
                    window_ms: 2000
                },
                StrategyConfig::TokenBucket,
            ]
        );
        assert_eq!(config.limiter.sweep_interval(), None);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let config = GateConfig::from_yaml("logging:\n  json: true\n").unwrap();
        assert_eq!(config.limiter, LimiterConfig::default());
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.json);
    }

    #[test]
    fn test_options_preserve_order() {
        let limiter = LimiterConfig {
            strategies: vec![
                StrategyConfig::TokenBucket,
                StrategyConfig::FixedWindow {
                    limit: 7,
                    window_ms: 1500,
                },
            ],
            sweep_interval_secs: 1,
        };
        assert_eq!(
            limiter.options(),
            vec![
                with_token_bucket(),
                with_fixed_window(7, Duration::from_millis(1500)),
            ]
        );
    }

    #[test]
    fn test_build_surfaces_configuration_errors() {
        let limiter = LimiterConfig {
            strategies: vec![StrategyConfig::FixedWindow {
                limit: 1,
                window_ms: 0,
            }],
            sweep_interval_secs: 0,
        };
        assert!(matches!(
            limiter.build(),
            Err(GateError::Configuration { .. })
        ));

        let built = LimiterConfig::default().build().unwrap();
        assert_eq!(built.kind(), "FixedWindow");
    }

    #[test]
    fn test_load_file_and_env_layers() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "limiter:\n  sweep_interval_secs: 5\nlogging:\n  level: warn\n"
        )
        .unwrap();

        let config = GateConfig::load_with_env(
            Some(file.path()),
            env(&[("QUOTA_GATE__LOGGING__LEVEL", "trace")]),
        )
        .unwrap();

        assert_eq!(config.limiter.sweep_interval_secs, 5);
        assert_eq!(config.limiter.strategies, default_strategies());
        assert_eq!(config.logging.level, "trace");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = GateConfig::load_with_env(None, env(&[])).unwrap();
        assert_eq!(config, GateConfig::default());
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let missing = Path::new("/nonexistent/quota-gate.yaml");
        let err = GateConfig::load_with_env(Some(missing), env(&[])).unwrap_err();
        assert!(matches!(err, GateError::Settings(_)));
    }

    #[test]
    fn test_to_yaml_names_strategy_type() {
        let yaml = GateConfig::default().to_yaml().unwrap();
        assert!(yaml.contains("type: fixed_window"));
        assert!(yaml.contains("window_ms: 10000"));
    }
}
