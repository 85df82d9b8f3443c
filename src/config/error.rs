//! Error types for schema construction, source loading and resolution.

use std::path::PathBuf;

use thiserror::Error;

use crate::config::layer::LayerOrigin;

/// Errors raised while building an [`OptionSchema`](crate::config::OptionSchema).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// The same option name was declared twice at one level.
    #[error("option `{0}` is declared more than once")]
    DuplicateOption(String),

    /// Option names must be non-empty and must not contain `.`.
    #[error("invalid option name `{0}`")]
    InvalidName(String),

    /// Top-level options must carry a default value.
    #[error("top-level option `{0}` has no default value")]
    MissingDefault(String),

    /// An enumerated option was declared without any legal value.
    #[error("option `{0}` declares an empty set of legal values")]
    EmptyEnum(String),

    /// A declared default does not satisfy the option's own shape or rule.
    #[error("default value of option `{key}` is invalid: {reason}")]
    InvalidDefault { key: String, reason: String },
}

/// Errors raised by the resolver. Resolution fails atomically on the first one.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ResolveError {
    /// A layer defines a key the schema does not know.
    #[error("unknown option `{key}` in {origin}")]
    UnknownOption { key: String, origin: LayerOrigin },

    /// A layer defines a value that fails its option's shape or rule.
    #[error("invalid value for option `{key}` in {origin}: expected {expected}, got {received}")]
    InvalidValue {
        key: String,
        origin: LayerOrigin,
        expected: String,
        received: String,
        /// Legal values for enumerated options, empty otherwise.
        legal: Vec<String>,
    },

    /// Two peer layers disagree on a key.
    #[error("conflicting values for option `{key}`: {first} and {second} are peers and neither takes precedence")]
    Conflict {
        key: String,
        first: LayerOrigin,
        second: LayerOrigin,
    },
}

impl ResolveError {
    /// Dotted path of the offending option.
    pub fn key(&self) -> &str {
        match self {
            ResolveError::UnknownOption { key, .. }
            | ResolveError::InvalidValue { key, .. }
            | ResolveError::Conflict { key, .. } => key,
        }
    }
}

/// Errors raised while reading partial configurations from their sources.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("JSON parse error in {}: {source}", .path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// TOML `nan`/`inf` have no JSON representation.
    #[error("non-finite float for `{key}` in {}", .path.display())]
    NonFiniteFloat { path: PathBuf, key: String },

    /// Two environment variables set the same option to different values.
    #[error("environment variables {first} and {second} disagree on option `{key}`")]
    EnvConflict {
        key: String,
        first: String,
        second: String,
    },

    #[error("unsupported config file format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// The document root of a source must be a table/object.
    #[error("configuration from {0} is not a table")]
    NotATable(LayerOrigin),

    /// A `key=value` assignment could not be parsed.
    #[error("invalid assignment `{0}`, expected key=value")]
    InvalidAssignment(String),
}

/// Umbrella error for loading and resolving in one step.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_value_message_lists_legal_values() {
        let err = ResolveError::InvalidValue {
            key: "outputMode".into(),
            origin: LayerOrigin::Cli,
            expected: "one of \"default\", \"standalone\", \"export\"".into(),
            received: "\"weird\"".into(),
            legal: vec!["default".into(), "standalone".into(), "export".into()],
        };
        let msg = err.to_string();
        assert!(msg.contains("outputMode"));
        assert!(msg.contains("\"standalone\""));
        assert!(msg.contains("\"weird\""));
        assert_eq!(err.key(), "outputMode");
    }

    #[test]
    fn test_conflict_names_both_origins() {
        let err = ResolveError::Conflict {
            key: "distDir".into(),
            first: LayerOrigin::File("a.toml".into()),
            second: LayerOrigin::File("b.json".into()),
        };
        let msg = err.to_string();
        assert!(msg.contains("a.toml"));
        assert!(msg.contains("b.json"));
    }
}
