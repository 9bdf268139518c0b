//! Error types for the lt-core crate.
//!
//! This module provides the [`ConfigError`] type for configuration values
//! that cannot be used to start a tailer.

use camino::Utf8PathBuf;

/// Errors that can occur while building or validating configuration.
///
/// # Examples
///
/// ```
/// use lt_core::ConfigError;
///
/// let error = ConfigError::invalid_option("channel_capacity", "must be greater than zero");
/// assert!(error.to_string().contains("channel_capacity"));
/// ```
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The provided path cannot be tailed.
    #[error("invalid path '{path}': {reason}")]
    InvalidPath {
        /// The invalid path.
        path: Utf8PathBuf,
        /// Explanation of why the path is invalid.
        reason: String,
    },

    /// A configuration option has an invalid value.
    #[error("invalid configuration option '{option}': {reason}")]
    InvalidOption {
        /// The name of the invalid option.
        option: String,
        /// Explanation of why the option is invalid.
        reason: String,
    },

    /// Failed to parse a serialized configuration.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

impl ConfigError {
    /// Creates a new [`ConfigError::InvalidOption`] error.
    #[must_use]
    pub fn invalid_option(option: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            option: option.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new [`ConfigError::InvalidPath`] error.
    #[must_use]
    pub fn invalid_path(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_path_display() {
        let error = ConfigError::invalid_path("/var/log/app.log", "path has no file name");
        insta::assert_snapshot!(
            error.to_string(),
            @"invalid path '/var/log/app.log': path has no file name"
        );
    }

    #[test]
    fn test_invalid_option_display() {
        let error = ConfigError::invalid_option("read_chunk_bytes", "must be greater than zero");
        insta::assert_snapshot!(
            error.to_string(),
            @"invalid configuration option 'read_chunk_bytes': must be greater than zero"
        );
    }

    #[test]
    fn test_parse_error_from_serde() {
        let err: ConfigError = serde_json::from_str::<u32>("not json").unwrap_err().into();
        assert!(err.to_string().starts_with("failed to parse configuration"));
    }
}
