//! Error types for the lt-tailer crate.

use std::io;

use camino::Utf8PathBuf;
use lt_core::ConfigError;
use lt_watcher::WatchError;

/// Errors returned by [`FileTailer::run`](crate::FileTailer::run) or
/// delivered on [`FileTailer::errors`](crate::FileTailer::errors).
///
/// # Error Recovery Strategy
///
/// - **Setup errors** ([`TailError::Config`], [`TailError::Open`],
///   [`TailError::Watch`]): returned from `run`, no tailer is started
/// - **Transient I/O** ([`TailError::TransientIo`]): a read or re-open
///   during rotation failed; it is retried on the next file event and
///   lines keep flowing
/// - **Watcher errors** ([`TailError::Watcher`]): a single notification
///   problem, the subscription is still alive
/// - **Watch lost** ([`TailError::WatchLost`]): the directory watch is
///   gone; the tailer shuts itself down after delivering this error
#[derive(Debug, thiserror::Error)]
pub enum TailError {
    /// The configuration or path cannot be used.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The log file could not be opened when the tailer started.
    #[error("failed to open {path}: {source}")]
    Open {
        /// The log file path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The log file's directory could not be watched.
    #[error("failed to watch {path}: {source}")]
    Watch {
        /// The directory that was to be watched.
        path: Utf8PathBuf,
        /// The watcher error.
        #[source]
        source: WatchError,
    },

    /// Reading or re-opening the log file failed.
    #[error("I/O error on {path}: {source}")]
    TransientIo {
        /// The log file path.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The watcher reported a problem but is still running.
    #[error("watcher error: {0}")]
    Watcher(#[source] WatchError),

    /// The directory watch was torn down.
    #[error("lost watch on {path}: {reason}")]
    WatchLost {
        /// The directory whose watch was lost.
        path: Utf8PathBuf,
        /// What tore the watch down.
        reason: String,
    },
}

impl TailError {
    /// Creates a new [`TailError::TransientIo`] error.
    #[inline]
    pub fn transient(path: impl Into<Utf8PathBuf>, source: io::Error) -> Self {
        Self::TransientIo {
            path: path.into(),
            source,
        }
    }

    /// Returns `true` if the tailer stops because of this error.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        match self {
            Self::TransientIo { .. } => false,
            Self::Watcher(error) => error.is_fatal(),
            Self::Config(_) | Self::Open { .. } | Self::Watch { .. } | Self::WatchLost { .. } => {
                true
            }
        }
    }

    /// Returns `true` if the error only affects a single read or event.
    #[inline]
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        !self.is_fatal()
    }
}

impl From<WatchError> for TailError {
    fn from(error: WatchError) -> Self {
        match error {
            WatchError::WatchLost { path, reason } => Self::WatchLost { path, reason },
            other => Self::Watcher(other),
        }
    }
}
