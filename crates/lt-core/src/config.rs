//! Configuration structures for logtail.
//!
//! - [`WatchMode`] - Which filesystem notification backend to use
//! - [`WatchConfig`] - Watcher backend settings (mode, poll interval)
//! - [`TailConfig`] - Root configuration for one file tailer
//!
//! All configuration types implement [`Default`] and deserialize with
//! missing fields filled in from those defaults.

use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Filesystem notification backend selection.
///
/// # Examples
///
/// ```
/// use lt_core::WatchMode;
///
/// assert_eq!("poll".parse::<WatchMode>().ok(), Some(WatchMode::Poll));
/// assert_eq!("NATIVE".parse::<WatchMode>().ok(), Some(WatchMode::Native));
/// assert!("kqueue".parse::<WatchMode>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchMode {
    /// Try the native backend first and fall back to polling if it cannot
    /// be initialized.
    #[default]
    Auto,
    /// Use OS notifications only (inotify, kqueue, FSEvents,
    /// `ReadDirectoryChangesW`).
    Native,
    /// Periodically stat the watched directory and diff the results.
    #[serde(alias = "polling")]
    Poll,
}

impl WatchMode {
    /// Returns the lowercase name used on the command line and in config.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Native => "native",
            Self::Poll => "poll",
        }
    }
}

impl std::fmt::Display for WatchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WatchMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "native" => Ok(Self::Native),
            "poll" | "polling" => Ok(Self::Poll),
            _ => Err(ConfigError::InvalidOption {
                option: "watch.mode".to_owned(),
                reason: format!("unknown watch mode '{s}', expected auto, native or poll"),
            }),
        }
    }
}

/// Configuration for the filesystem watcher backend.
///
/// # Examples
///
/// ```
/// use lt_core::{WatchConfig, WatchMode};
///
/// let config = WatchConfig::default();
/// assert_eq!(config.mode, WatchMode::Auto);
/// assert_eq!(config.poll_interval_ms, 250);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Backend selection.
    pub mode: WatchMode,

    /// Interval between directory scans when the polling backend is active.
    pub poll_interval_ms: u64,
}

impl WatchConfig {
    /// Returns the poll interval as a [`Duration`].
    #[inline]
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            mode: WatchMode::Auto,
            poll_interval_ms: 250,
        }
    }
}

/// Configuration for a single file tailer.
///
/// # Examples
///
/// ```
/// use lt_core::TailConfig;
///
/// let config = TailConfig::default().with_read_from_start(true);
/// assert!(config.read_from_start);
/// assert!(!config.flush_partial_on_close);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TailConfig {
    /// Deliver the file's existing content before tailing new appends.
    ///
    /// When `false`, tailing starts at the current end of file.
    pub read_from_start: bool,

    /// Capacity of the bounded line and error channels.
    ///
    /// A full channel suspends reading, so a slow consumer slows delivery
    /// instead of losing lines.
    pub channel_capacity: usize,

    /// Emit a final line without a trailing newline when the tailer closes.
    ///
    /// When `false` the partial line is discarded.
    pub flush_partial_on_close: bool,

    /// Upper bound for a single read from the log file.
    pub read_chunk_bytes: usize,

    /// Watcher backend settings.
    pub watch: WatchConfig,
}

impl TailConfig {
    /// Sets [`TailConfig::read_from_start`].
    #[must_use]
    pub const fn with_read_from_start(mut self, read_from_start: bool) -> Self {
        self.read_from_start = read_from_start;
        self
    }

    /// Sets [`TailConfig::flush_partial_on_close`].
    #[must_use]
    pub const fn with_flush_partial_on_close(mut self, flush: bool) -> Self {
        self.flush_partial_on_close = flush;
        self
    }

    /// Sets the watcher backend.
    #[must_use]
    pub const fn with_watch_mode(mut self, mode: WatchMode) -> Self {
        self.watch.mode = mode;
        self
    }

    /// Parses a JSON object into a validated configuration. Missing fields
    /// take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed JSON, or the
    /// [`validate`](Self::validate) error.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that every numeric option is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidOption`] naming the first zero-valued
    /// capacity, chunk size, or poll interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_capacity == 0 {
            return Err(ConfigError::invalid_option(
                "channel_capacity",
                "must be greater than zero",
            ));
        }
        if self.read_chunk_bytes == 0 {
            return Err(ConfigError::invalid_option(
                "read_chunk_bytes",
                "must be greater than zero",
            ));
        }
        if self.watch.poll_interval_ms == 0 {
            return Err(ConfigError::invalid_option(
                "watch.poll_interval_ms",
                "must be greater than zero",
            ));
        }
        Ok(())
    }
}

impl Default for TailConfig {
    fn default() -> Self {
        Self {
            read_from_start: false,
            channel_capacity: 100,
            flush_partial_on_close: false,
            read_chunk_bytes: 64 * 1024,
            watch: WatchConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_watch_config_defaults() {
        let config = WatchConfig::default();
        assert_eq!(config.mode, WatchMode::Auto);
        assert_eq!(config.poll_interval(), Duration::from_millis(250));
    }

    #[test]
    fn test_tail_config_defaults() {
        let config = TailConfig::default();
        assert!(!config.read_from_start);
        assert_eq!(config.channel_capacity, 100);
        assert!(!config.flush_partial_on_close);
        assert_eq!(config.read_chunk_bytes, 65536);
    }

    #[test]
    fn test_watch_mode_from_str() {
        assert_eq!("auto".parse::<WatchMode>().unwrap(), WatchMode::Auto);
        assert_eq!("native".parse::<WatchMode>().unwrap(), WatchMode::Native);
        assert_eq!("poll".parse::<WatchMode>().unwrap(), WatchMode::Poll);
        assert_eq!("Polling".parse::<WatchMode>().unwrap(), WatchMode::Poll);
        assert!("inotify".parse::<WatchMode>().is_err());
    }

    #[test]
    fn test_watch_mode_display_roundtrips_through_from_str() {
        for mode in [WatchMode::Auto, WatchMode::Native, WatchMode::Poll] {
            assert_eq!(mode.to_string().parse::<WatchMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = TailConfig {
            channel_capacity: 0,
            ..TailConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("channel_capacity"));
    }

    #[test]
    fn test_validate_rejects_zero_poll_interval() {
        let mut config = TailConfig::default();
        config.watch.poll_interval_ms = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("poll_interval_ms"));
    }

    #[test]
    fn test_config_deserialize_with_missing_fields() {
        let json = r#"{"read_from_start": true, "watch": {"mode": "polling"}}"#;
        let config: TailConfig = serde_json::from_str(json).unwrap();
        assert!(config.read_from_start);
        assert_eq!(config.watch.mode, WatchMode::Poll);
        assert_eq!(config.watch.poll_interval_ms, 250);
        assert_eq!(config.channel_capacity, 100);
    }

    #[test]
    fn test_from_json_validates() {
        let config = TailConfig::from_json(r#"{"flush_partial_on_close": true}"#).unwrap();
        assert!(config.flush_partial_on_close);

        let err = TailConfig::from_json(r#"{"channel_capacity": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { .. }));

        let err = TailConfig::from_json("{").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_watch_mode_serialization() {
        assert_eq!(serde_json::to_string(&WatchMode::Auto).unwrap(), r#""auto""#);
        assert_eq!(serde_json::to_string(&WatchMode::Poll).unwrap(), r#""poll""#);
    }
}
