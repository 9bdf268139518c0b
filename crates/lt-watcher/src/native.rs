//! Native watcher backed by the `notify` crate.
//!
//! Uses OS-level notifications:
//! - Linux: inotify
//! - macOS: FSEvents (kqueue on the BSDs)
//! - Windows: `ReadDirectoryChangesW`
//!
//! The notify callback forwards raw events into a channel that the
//! [`Waker`] shares, so [`Watcher::recv`] blocks on exactly one primitive.

use std::sync::mpsc::{self, Receiver, Sender};

use camino::{Utf8Path, Utf8PathBuf};
use notify::event::{ModifyKind, RenameMode};
use notify::{RecommendedWatcher, RecursiveMode, Watcher as _};

use crate::error::WatchError;
use crate::events::{EventBatch, NormalizedEvent};
use crate::watcher::{Waker, Watcher};

/// Messages arriving on the backend channel.
enum Signal {
    Event(notify::Result<notify::Event>),
    Wake,
}

/// Directory watcher using OS notifications.
pub struct NativeWatcher {
    inner: RecommendedWatcher,
    signals: Receiver<Signal>,
    wake_tx: Sender<Signal>,
    dirs: Vec<Utf8PathBuf>,
    pending_error: Option<WatchError>,
    closed: bool,
}

impl std::fmt::Debug for NativeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NativeWatcher")
            .field("dirs", &self.dirs)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl NativeWatcher {
    /// Creates a native watcher with no subscriptions.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Notify`] if the OS notification facility
    /// cannot be initialized (e.g. the inotify instance limit is reached).
    pub fn new() -> Result<Self, WatchError> {
        let (tx, signals) = mpsc::channel();
        let event_tx = tx.clone();

        let inner = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
            // The receiver is gone once the watcher is dropped.
            let _ = event_tx.send(Signal::Event(res));
        })?;

        Ok(Self {
            inner,
            signals,
            wake_tx: tx,
            dirs: Vec::new(),
            pending_error: None,
            closed: false,
        })
    }

    /// Folds one signal into `batch`.
    fn absorb(&mut self, signal: Signal, batch: &mut EventBatch) -> Result<(), WatchError> {
        match signal {
            Signal::Wake => {
                self.closed = true;
                Err(WatchError::Closed)
            }
            Signal::Event(Err(error)) => Err(WatchError::Notify(error)),
            Signal::Event(Ok(event)) => {
                let Some(error) = normalize(event, batch) else {
                    return Ok(());
                };
                if batch.is_empty() {
                    return Err(error);
                }
                // Reported by the next recv, after the batch.
                if self.pending_error.is_none() {
                    self.pending_error = Some(error);
                }
                Ok(())
            }
        }
    }
}

impl Watcher for NativeWatcher {
    fn watch(&mut self, dir: &Utf8Path) -> Result<(), WatchError> {
        self.inner
            .watch(dir.as_std_path(), RecursiveMode::NonRecursive)?;
        if !self.dirs.iter().any(|d| d == dir) {
            self.dirs.push(dir.to_owned());
        }
        tracing::debug!(dir = %dir, backend = self.backend_name(), "Watching directory");
        Ok(())
    }

    fn unwatch(&mut self, dir: &Utf8Path) -> Result<(), WatchError> {
        self.dirs.retain(|d| d != dir);
        self.inner.unwatch(dir.as_std_path())?;
        Ok(())
    }

    fn recv(&mut self) -> Result<EventBatch, WatchError> {
        loop {
            if self.closed {
                return Err(WatchError::Closed);
            }
            if let Some(error) = self.pending_error.take() {
                return Err(error);
            }

            // The struct holds a sender itself, so this only fails if the
            // channel is torn down underneath us.
            let first = self.signals.recv().map_err(|_| {
                WatchError::watch_lost(
                    self.dirs.first().cloned().unwrap_or_default(),
                    "notification channel disconnected",
                )
            })?;

            let mut batch = EventBatch::new();
            self.absorb(first, &mut batch)?;

            while let Ok(signal) = self.signals.try_recv() {
                if let Err(error) = self.absorb(signal, &mut batch) {
                    if error.is_shutdown() || batch.is_empty() {
                        return Err(error);
                    }
                    self.pending_error = Some(error);
                    break;
                }
            }

            batch.coalesce();
            if !batch.is_empty() {
                return Ok(batch);
            }
        }
    }

    fn waker(&self) -> Waker {
        let tx = self.wake_tx.clone();
        Waker::new(move || {
            let _ = tx.send(Signal::Wake);
        })
    }

    fn watched_dirs(&self) -> &[Utf8PathBuf] {
        &self.dirs
    }

    fn is_native(&self) -> bool {
        true
    }

    fn backend_name(&self) -> &'static str {
        #[cfg(any(target_os = "linux", target_os = "android"))]
        {
            "inotify"
        }
        #[cfg(target_os = "macos")]
        {
            "fsevents"
        }
        #[cfg(target_os = "windows")]
        {
            "read_directory_changes"
        }
        #[cfg(not(any(
            target_os = "linux",
            target_os = "android",
            target_os = "macos",
            target_os = "windows"
        )))]
        {
            "kqueue"
        }
    }
}

/// Translates one notify event into normalized events.
///
/// Rename halves are split: the old name is reported as
/// [`Renamed`](crate::EventKind::Renamed) and the new name as
/// [`Created`](crate::EventKind::Created), since for a tailer a file
/// renamed onto the tracked name is a new file appearing there.
///
/// Paths that are not valid UTF-8 are left out of the batch; the first
/// one is returned as [`WatchError::NonUtf8Path`].
fn normalize(event: notify::Event, batch: &mut EventBatch) -> Option<WatchError> {
    use notify::EventKind as Raw;

    if matches!(event.kind, Raw::Access(_)) {
        return None;
    }

    let mut rejected = None;
    let mut paths = Vec::with_capacity(event.paths.len());
    for path in event.paths {
        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) => paths.push(path),
            Err(path) => {
                tracing::debug!(path = %path.display(), "Non-UTF-8 path in file event");
                if rejected.is_none() {
                    rejected = Some(WatchError::NonUtf8Path(path));
                }
            }
        }
    }

    match event.kind {
        Raw::Access(_) => {}
        Raw::Create(_) => paths
            .into_iter()
            .for_each(|p| batch.push(NormalizedEvent::created(p))),
        Raw::Remove(_) => paths
            .into_iter()
            .for_each(|p| batch.push(NormalizedEvent::removed(p))),
        Raw::Modify(ModifyKind::Name(RenameMode::From)) => paths
            .into_iter()
            .for_each(|p| batch.push(NormalizedEvent::renamed(p))),
        Raw::Modify(ModifyKind::Name(RenameMode::To)) => paths
            .into_iter()
            .for_each(|p| batch.push(NormalizedEvent::created(p))),
        Raw::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut paths = paths.into_iter();
            if let Some(from) = paths.next() {
                batch.push(NormalizedEvent::renamed(from));
            }
            paths.for_each(|to| batch.push(NormalizedEvent::created(to)));
        }
        // FSEvents and kqueue cannot tell which side of a rename a path was on.
        Raw::Modify(ModifyKind::Name(_)) => {
            for path in paths {
                if path.exists() {
                    batch.push(NormalizedEvent::created(path));
                } else {
                    batch.push(NormalizedEvent::renamed(path));
                }
            }
        }
        Raw::Modify(_) | Raw::Any | Raw::Other => paths
            .into_iter()
            .for_each(|p| batch.push(NormalizedEvent::written(p))),
    }
    rejected
}
