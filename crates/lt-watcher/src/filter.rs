//! Event filtering at the source.
//!
//! A watched log directory usually holds many files (rotated backups, other
//! services' logs). Filtering in the event loop keeps unrelated events out
//! of the channel entirely.
//!
//! # Examples
//!
//! ```
//! use lt_watcher::{EventFilter, FileNameFilter, NormalizedEvent};
//! use camino::Utf8PathBuf;
//!
//! let filter = FileNameFilter::new("app.log");
//!
//! assert!(filter.should_process(&NormalizedEvent::written(Utf8PathBuf::from("/var/log/app.log"))));
//! assert!(!filter.should_process(&NormalizedEvent::created(Utf8PathBuf::from("/var/log/app.log.1"))));
//! ```

use crate::events::NormalizedEvent;

/// A predicate deciding which events the event loop forwards.
///
/// Filters run on the event loop's blocking thread, so they must be
/// [`Send`] and `'static`.
pub trait EventFilter: Send + 'static {
    /// Returns `true` if the event should be forwarded.
    fn should_process(&self, event: &NormalizedEvent) -> bool;
}

/// Forwards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAllFilter;

impl EventFilter for AcceptAllFilter {
    #[inline]
    fn should_process(&self, _event: &NormalizedEvent) -> bool {
        true
    }
}

/// Forwards only events whose path ends in one exact file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNameFilter {
    file_name: String,
}

impl FileNameFilter {
    /// Creates a filter for `file_name`.
    #[must_use]
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
        }
    }

    /// Returns the file name this filter accepts.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl EventFilter for FileNameFilter {
    fn should_process(&self, event: &NormalizedEvent) -> bool {
        event.file_name() == Some(self.file_name.as_str())
    }
}
