//! Evaluator configuration.
//!
//! ```yaml
//! diagnostics: true
//! diagnostics_header: x-no-304-reason
//! log_level: Info
//! ```
//!
//! Every field is optional; missing ones take their [`Default`] value.

use http::HeaderName;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default name of the header explaining why no 304 was produced.
pub const DEFAULT_DIAGNOSTICS_HEADER: HeaderName = HeaderName::from_static("x-no-304-reason");

/// Severity evaluator decisions are logged at.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
pub enum LogLevel {
    /// `TRACE`
    Trace,
    /// `DEBUG` (default)
    #[default]
    Debug,
    /// `INFO`
    Info,
    /// `WARN`
    Warn,
    /// `ERROR`
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => tracing::Level::TRACE,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

/// Observability settings of an [`Evaluator`](crate::Evaluator).
///
/// None of these settings changes a cache decision.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct EvaluatorConfig {
    /// Write the pass-through reason onto the response.
    pub diagnostics: bool,
    /// Header the pass-through reason is written to.
    #[serde(with = "header_name")]
    pub diagnostics_header: HeaderName,
    /// Severity of decision logs.
    pub log_level: LogLevel,
}

impl Default for EvaluatorConfig {
    fn default() -> Self {
        Self {
            diagnostics: true,
            diagnostics_header: DEFAULT_DIAGNOSTICS_HEADER,
            log_level: LogLevel::default(),
        }
    }
}

/// Error loading an [`EvaluatorConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The document is not valid YAML or does not match the schema.
    #[error("invalid evaluator configuration: {0}")]
    Yaml(#[from] serde_saphyr::Error),
}

impl EvaluatorConfig {
    /// Parses a YAML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] for malformed documents, unknown log
    /// levels and invalid header names.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        Ok(serde_saphyr::from_str(yaml)?)
    }

    /// Disables the diagnostics header.
    pub fn without_diagnostics(self) -> Self {
        Self {
            diagnostics: false,
            ..self
        }
    }

    /// Sets the decision log severity.
    pub fn log_level(self, log_level: LogLevel) -> Self {
        Self { log_level, ..self }
    }
}

/// Serde adapter for [`HeaderName`] as its string form.
mod header_name {
    use http::HeaderName;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(name: &HeaderName, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(name.as_str())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<HeaderName, D::Error> {
        let s = String::deserialize(deserializer)?;
        HeaderName::try_from(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn empty_document_gives_defaults() {
        let config = EvaluatorConfig::from_yaml("{}").unwrap();
        assert_eq!(config, EvaluatorConfig::default());
        assert!(config.diagnostics);
        assert_eq!(config.diagnostics_header, "x-no-304-reason");
        assert_eq!(config.log_level, LogLevel::Debug);
    }

    #[test]
    fn full_document() {
        let yaml = r#"
diagnostics: false
diagnostics_header: x-revalid-reason
log_level: Warn
"#;
        let config = EvaluatorConfig::from_yaml(yaml).unwrap();
        assert!(!config.diagnostics);
        assert_eq!(config.diagnostics_header, "x-revalid-reason");
        assert_eq!(config.log_level, LogLevel::Warn);
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(EvaluatorConfig::from_yaml("log_level: Verbose").is_err());
        assert!(EvaluatorConfig::from_yaml("diagnostics_header: \"bad header\"").is_err());
    }

    #[test]
    fn levels_map_to_tracing() {
        assert_eq!(tracing::Level::from(LogLevel::Trace), tracing::Level::TRACE);
        assert_eq!(tracing::Level::from(LogLevel::Error), tracing::Level::ERROR);
    }
}
