//! Configuration structures.
//!
//! Configuration is loaded from JSON (string or file); every section has
//! defaults matching a local, impersonating client.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use super::errors::{Error, Result};
use crate::runtime::security::{CallAuthorization, SecurityProfile};

/// Global access-layer configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Process-wide security profile applied by `ProcessContext`.
    #[serde(default)]
    pub security: SecurityProfile,

    /// Per-connection call authorization applied right after connecting.
    #[serde(default)]
    pub authorization: CallAuthorization,

    /// Instance enumeration behaviour.
    #[serde(default)]
    pub enumeration: EnumerationConfig,

    /// Asynchronous method invocation behaviour.
    #[serde(default)]
    pub invocation: InvocationConfig,

    /// Recursive property traversal limits.
    #[serde(default)]
    pub reflection: ReflectionConfig,

    /// Observability configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<()> {
        if self.invocation.cancel_poll_interval.is_zero() {
            return Err(Error::config("invocation.cancel_poll_interval must be non-zero"));
        }
        if self.reflection.max_depth == 0 {
            return Err(Error::config("reflection.max_depth must be at least 1"));
        }
        Ok(())
    }
}

/// Instance enumeration configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnumerationConfig {
    /// Wait per fetch. `None` waits without bound.
    #[serde(with = "humantime_serde")]
    pub fetch_timeout: Option<Duration>,

    /// Ask for a forward-only cursor (no server-side retention).
    pub forward_only: bool,

    /// Ask the service to return the cursor before results are ready.
    pub return_immediately: bool,

    /// Include localized (amended) qualifiers in returned objects.
    pub use_amended_qualifiers: bool,
}

impl Default for EnumerationConfig {
    fn default() -> Self {
        Self {
            fetch_timeout: None,
            forward_only: true,
            return_immediately: false,
            use_amended_qualifiers: true,
        }
    }
}

/// Asynchronous invocation configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InvocationConfig {
    /// Upper bound on the completion wait. `None` waits without bound.
    #[serde(with = "humantime_serde")]
    pub timeout: Option<Duration>,

    /// How often a blocked caller re-checks its cancellation token.
    #[serde(with = "humantime_serde")]
    pub cancel_poll_interval: Duration,
}

impl Default for InvocationConfig {
    fn default() -> Self {
        Self {
            timeout: None,
            cancel_poll_interval: Duration::from_millis(50),
        }
    }
}

/// Property traversal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    /// Deepest sub-object nesting a walk will descend into.
    pub max_depth: usize,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self { max_depth: 8 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable JSON log formatting.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::security::{AuthenticationLevel, ImpersonationLevel};
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = Config::from_json_str("{}").unwrap();
        assert_eq!(config.enumeration.fetch_timeout, None);
        assert!(config.enumeration.forward_only);
        assert_eq!(config.invocation.cancel_poll_interval, Duration::from_millis(50));
        assert_eq!(config.reflection.max_depth, 8);
        assert_eq!(config.security.impersonation_level, ImpersonationLevel::Impersonate);
        assert_eq!(config.authorization.authentication_level, AuthenticationLevel::Call);
    }

    #[test]
    fn test_humantime_durations() {
        let config = Config::from_json_str(
            r#"{"invocation": {"timeout": "2s 500ms"}, "enumeration": {"fetch_timeout": "100ms"}}"#,
        )
        .unwrap();
        assert_eq!(config.invocation.timeout, Some(Duration::from_millis(2500)));
        assert_eq!(config.enumeration.fetch_timeout, Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_zero_depth_is_rejected() {
        let err = Config::from_json_str(r#"{"reflection": {"max_depth": 0}}"#).unwrap_err();
        assert!(err.to_string().contains("max_depth"));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"security": {{"authentication_level": "packet_privacy"}}}}"#).unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(
            config.security.authentication_level,
            AuthenticationLevel::PacketPrivacy
        );
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Config::from_file("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }
}
