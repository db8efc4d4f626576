//! Error types for admission decisions and limiter construction.

use thiserror::Error;

/// Main error type for quota-gate operations.
#[derive(Error, Debug)]
pub enum GateError {
    /// The caller passed an empty client identifier.
    #[error("invalid client ID")]
    InvalidIdentifier,

    /// The client has used up its allowance for the current window, or the
    /// request was refused because the clock moved backward.
    #[error("rate limit exceeded")]
    QuotaExceeded,

    /// One or more construction options were rejected.
    #[error("configuration error: {}", .problems.join("; "))]
    Configuration {
        /// Every problem reported while applying the options, in order.
        problems: Vec<String>,
    },

    /// Settings could not be loaded or deserialized.
    #[error("settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Settings could not be rendered as YAML.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl GateError {
    /// Build a configuration error from a single problem.
    pub fn configuration(problem: impl Into<String>) -> Self {
        GateError::Configuration {
            problems: vec![problem.into()],
        }
    }

    /// Whether the same request may succeed later without the caller
    /// changing anything.
    pub fn is_retryable(&self) -> bool {
        matches!(self, GateError::QuotaExceeded)
    }

    /// Whether this error is a denial produced by an admission decision.
    pub fn is_denial(&self) -> bool {
        matches!(self, GateError::InvalidIdentifier | GateError::QuotaExceeded)
    }
}

/// Result type alias for quota-gate operations.
pub type Result<T> = std::result::Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_message_joins_problems() {
        let err = GateError::Configuration {
            problems: vec![
                "window must be positive".into(),
                "no rate limiting strategy configured".into(),
            ],
        };
        assert_eq!(
            err.to_string(),
            "configuration error: window must be positive; no rate limiting strategy configured"
        );
    }

    #[test]
    fn test_denials_are_distinguishable() {
        assert!(GateError::QuotaExceeded.is_retryable());
        assert!(!GateError::InvalidIdentifier.is_retryable());
        assert!(GateError::InvalidIdentifier.is_denial());
        assert!(!GateError::configuration("bad").is_denial());
    }

    #[test]
    fn test_source_errors_convert() {
        let yaml = serde_yaml::from_str::<u64>("not a number").unwrap_err();
        let err = GateError::from(yaml);
        assert!(matches!(err, GateError::Yaml(_)));
        assert!(err.to_string().starts_with("YAML error: "));
        assert!(!err.is_denial());

        let settings = config::ConfigError::NotFound("limiter".into());
        assert!(matches!(GateError::from(settings), GateError::Settings(_)));
    }
}
