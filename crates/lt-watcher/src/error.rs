//! Error types for the lt-watcher crate.
//!
//! This module provides the [`WatchError`] type for errors that can occur
//! while subscribing to or waiting on filesystem notifications.

use camino::Utf8PathBuf;

/// Errors that can occur during directory watching.
///
/// # Error Recovery Strategy
///
/// - **Notify errors** ([`WatchError::Notify`]): Recoverable - a single
///   notification was lost or malformed, the subscription is still alive
/// - **Non-UTF-8 path** ([`WatchError::NonUtf8Path`]): Recoverable - skip the event
/// - **I/O errors** ([`WatchError::Io`]): Recoverable - a poll scan failed once
/// - **Path not found** ([`WatchError::PathNotFound`]): Fatal - nothing to watch
/// - **Watch lost** ([`WatchError::WatchLost`]): Fatal - no further events can arrive
/// - **Closed** ([`WatchError::Closed`]): Shutdown was requested, not a fault
///
/// # Examples
///
/// ```
/// use lt_watcher::WatchError;
///
/// fn handle_error(err: &WatchError) {
///     if err.is_shutdown() {
///         return;
///     }
///     if err.is_fatal() {
///         eprintln!("watch lost: {err}");
///     } else {
///         eprintln!("warning: {err}");
///     }
/// }
/// ```
#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    /// The notify backend reported an error.
    #[error("notify watcher error: {0}")]
    Notify(#[from] notify::Error),

    /// The specified directory does not exist.
    #[error("path does not exist: {0}")]
    PathNotFound(Utf8PathBuf),

    /// A path in a notification is not valid UTF-8.
    #[error("path is not valid UTF-8: {}", _0.display())]
    NonUtf8Path(std::path::PathBuf),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The subscription itself is gone.
    #[error("watch on {path} lost: {reason}")]
    WatchLost {
        /// The directory whose subscription was lost.
        path: Utf8PathBuf,
        /// What tore the subscription down.
        reason: String,
    },

    /// The blocking wait was woken because the watcher is shutting down.
    #[error("watcher closed")]
    Closed,
}

impl WatchError {
    /// Creates a new [`WatchError::PathNotFound`] error.
    #[inline]
    pub fn path_not_found(path: impl Into<Utf8PathBuf>) -> Self {
        Self::PathNotFound(path.into())
    }

    /// Creates a new [`WatchError::WatchLost`] error.
    #[inline]
    pub fn watch_lost(path: impl Into<Utf8PathBuf>, reason: impl Into<String>) -> Self {
        Self::WatchLost {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Returns `true` if watching can continue after this error.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::Notify(_) | Self::NonUtf8Path(_) | Self::Io(_))
    }

    /// Returns `true` if this error ends the subscription.
    #[inline]
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        !self.is_recoverable()
    }

    /// Returns `true` if this error only signals a requested shutdown.
    #[inline]
    #[must_use]
    pub const fn is_shutdown(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::PathBuf;

    #[test]
    fn test_watch_error_path_not_found() {
        let err = WatchError::path_not_found("/var/log/missing");
        assert!(err.is_fatal());
        assert!(!err.is_shutdown());
        insta::assert_snapshot!(err.to_string(), @"path does not exist: /var/log/missing");
    }

    #[test]
    fn test_watch_error_watch_lost() {
        let err = WatchError::watch_lost("/var/log", "watched directory was removed");
        assert!(err.is_fatal());
        insta::assert_snapshot!(
            err.to_string(),
            @"watch on /var/log lost: watched directory was removed"
        );
    }

    #[test]
    fn test_watch_error_closed_is_shutdown() {
        let err = WatchError::Closed;
        assert!(err.is_shutdown());
        assert!(err.is_fatal());
    }

    #[test]
    fn test_watch_error_io_is_recoverable() {
        let err = WatchError::Io(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "access denied",
        ));
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_watch_error_non_utf8() {
        let err = WatchError::NonUtf8Path(PathBuf::from("log"));
        assert!(err.is_recoverable());
        assert!(err.to_string().contains("not valid UTF-8"));
    }
}
