//! Normalized filesystem events.
//!
//! Every backend translates its raw notifications into [`NormalizedEvent`]
//! values, so the rotation logic downstream never sees platform-specific
//! event shapes.
//!
//! # Event Flow
//!
//! ```text
//! inotify / kqueue / FSEvents / ReadDirectoryChangesW / stat+diff
//!        │
//!        ▼
//!   Watcher backend (normalize, coalesce)
//!        │
//!        ▼
//!   EventBatch ──► EventLoop ──► events channel
//! ```

use camino::Utf8PathBuf;
use smallvec::SmallVec;

/// The kind of change observed for a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// A file appeared at the path (created, or renamed onto it).
    Created,
    /// The file's content or size changed.
    Written,
    /// The file at the path was renamed away.
    Renamed,
    /// The file at the path was deleted.
    Removed,
}

impl EventKind {
    /// Returns `true` for events after which the path no longer names the
    /// file it named before.
    #[inline]
    #[must_use]
    pub const fn is_departure(self) -> bool {
        matches!(self, Self::Renamed | Self::Removed)
    }

    /// Returns a short lowercase label for logging.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Written => "written",
            Self::Renamed => "renamed",
            Self::Removed => "removed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// A single normalized filesystem event.
///
/// # Examples
///
/// ```
/// use lt_watcher::{EventKind, NormalizedEvent};
/// use camino::Utf8PathBuf;
///
/// let event = NormalizedEvent::written(Utf8PathBuf::from("/var/log/app.log"));
/// assert_eq!(event.kind, EventKind::Written);
/// assert_eq!(event.file_name(), Some("app.log"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NormalizedEvent {
    /// What happened.
    pub kind: EventKind,

    /// The path it happened to.
    pub path: Utf8PathBuf,
}

impl NormalizedEvent {
    /// Creates a new event.
    #[inline]
    #[must_use]
    pub const fn new(kind: EventKind, path: Utf8PathBuf) -> Self {
        Self { kind, path }
    }

    /// Creates a [`EventKind::Created`] event.
    #[inline]
    #[must_use]
    pub const fn created(path: Utf8PathBuf) -> Self {
        Self::new(EventKind::Created, path)
    }

    /// Creates a [`EventKind::Written`] event.
    #[inline]
    #[must_use]
    pub const fn written(path: Utf8PathBuf) -> Self {
        Self::new(EventKind::Written, path)
    }

    /// Creates a [`EventKind::Renamed`] event.
    #[inline]
    #[must_use]
    pub const fn renamed(path: Utf8PathBuf) -> Self {
        Self::new(EventKind::Renamed, path)
    }

    /// Creates a [`EventKind::Removed`] event.
    #[inline]
    #[must_use]
    pub const fn removed(path: Utf8PathBuf) -> Self {
        Self::new(EventKind::Removed, path)
    }

    /// Returns the file name without the directory path.
    #[inline]
    #[must_use]
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name()
    }
}

impl std::fmt::Display for NormalizedEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.kind, self.path)
    }
}

/// Events produced by one wake-up of a watcher backend, in arrival order.
///
/// Uses [`SmallVec`] since a wake-up usually carries one or two events.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventBatch {
    events: SmallVec<[NormalizedEvent; 4]>,
}

impl EventBatch {
    /// Creates a new empty batch.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    #[inline]
    pub fn push(&mut self, event: NormalizedEvent) {
        self.events.push(event);
    }

    /// Returns the number of events in this batch.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the batch contains no events.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns an iterator over the events.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &NormalizedEvent> {
        self.events.iter()
    }

    /// Collapses runs of identical `Written` events into one.
    ///
    /// Only adjacent duplicates are merged; structural events and their
    /// relative order are never touched.
    pub fn coalesce(&mut self) {
        self.events
            .dedup_by(|next, prev| next.kind == EventKind::Written && next == prev);
    }
}

impl IntoIterator for EventBatch {
    type Item = NormalizedEvent;
    type IntoIter = smallvec::IntoIter<[NormalizedEvent; 4]>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.into_iter()
    }
}

impl<'a> IntoIterator for &'a EventBatch {
    type Item = &'a NormalizedEvent;
    type IntoIter = std::slice::Iter<'a, NormalizedEvent>;

    fn into_iter(self) -> Self::IntoIter {
        self.events.iter()
    }
}

impl FromIterator<NormalizedEvent> for EventBatch {
    fn from_iter<T: IntoIterator<Item = NormalizedEvent>>(iter: T) -> Self {
        Self {
            events: iter.into_iter().collect(),
        }
    }
}
