//! Polling watcher for filesystems without usable native notifications
//! (NFS, some container overlay mounts).
//!
//! Each interval the watched directories are listed and every regular
//! file's size, modification time and identity are diffed against the
//! previous scan. The inter-scan sleep is a timed receive on the waker's
//! channel, so a close interrupts it immediately.

use std::fs;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use rustc_hash::FxHashMap;

use crate::error::WatchError;
use crate::events::{EventBatch, NormalizedEvent};
use crate::file_id::FileId;
use crate::watcher::{Waker, Watcher};

/// What a scan remembers about one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FileState {
    len: u64,
    modified: Option<SystemTime>,
    id: Option<FileId>,
}

impl FileState {
    fn from_metadata(metadata: &fs::Metadata) -> Self {
        Self {
            len: metadata.len(),
            modified: metadata.modified().ok(),
            id: FileId::from_metadata(metadata),
        }
    }
}

/// Directory watcher that periodically stats and diffs.
#[derive(Debug)]
pub struct PollWatcher {
    dirs: Vec<Utf8PathBuf>,
    files: FxHashMap<Utf8PathBuf, FileState>,
    interval: Duration,
    wake_rx: Receiver<()>,
    wake_tx: Sender<()>,
    closed: bool,
}

impl PollWatcher {
    /// Creates a poll watcher that scans every `interval`.
    #[must_use]
    pub fn new(interval: Duration) -> Self {
        let (wake_tx, wake_rx) = mpsc::channel();
        Self {
            dirs: Vec::new(),
            files: FxHashMap::default(),
            interval,
            wake_rx,
            wake_tx,
            closed: false,
        }
    }

    /// Lists `dir` and returns the state of each regular file in it.
    fn list(dir: &Utf8Path) -> Result<Vec<(Utf8PathBuf, FileState)>, WatchError> {
        let entries = match dir.read_dir_utf8() {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(WatchError::watch_lost(dir, "watched directory was removed"));
            }
            Err(e) => return Err(WatchError::Io(e)),
        };

        let mut files = Vec::new();
        for entry in entries.flatten() {
            // Follows symlinks so a linked log file is tracked by its target.
            let Ok(metadata) = fs::metadata(entry.path()) else {
                continue;
            };
            if metadata.is_file() {
                files.push((entry.path().to_owned(), FileState::from_metadata(&metadata)));
            }
        }
        Ok(files)
    }

    /// Rescans every directory and diffs against the previous scan.
    ///
    /// Departures are reported before arrivals, and a path whose file
    /// identity changed is reported as removed and then created.
    fn scan(&mut self) -> Result<EventBatch, WatchError> {
        let mut current: FxHashMap<Utf8PathBuf, FileState> = FxHashMap::default();
        for dir in &self.dirs {
            current.extend(Self::list(dir)?);
        }

        let mut departures: Vec<NormalizedEvent> = Vec::new();
        let mut arrivals: Vec<NormalizedEvent> = Vec::new();

        for (path, old) in &self.files {
            match current.get(path) {
                None => departures.push(NormalizedEvent::removed(path.clone())),
                Some(new) if new.id != old.id => {
                    departures.push(NormalizedEvent::removed(path.clone()));
                    arrivals.push(NormalizedEvent::created(path.clone()));
                }
                Some(new) if new != old => arrivals.push(NormalizedEvent::written(path.clone())),
                Some(_) => {}
            }
        }
        for path in current.keys() {
            if !self.files.contains_key(path) {
                arrivals.push(NormalizedEvent::created(path.clone()));
            }
        }

        // Created must precede Written for the same path within one scan.
        arrivals.sort_by_key(|e| e.kind != crate::events::EventKind::Created);

        self.files = current;
        Ok(departures.into_iter().chain(arrivals).collect())
    }
}

impl Watcher for PollWatcher {
    fn watch(&mut self, dir: &Utf8Path) -> Result<(), WatchError> {
        if !dir.is_dir() {
            return Err(WatchError::path_not_found(dir));
        }
        if !self.dirs.iter().any(|d| d == dir) {
            self.dirs.push(dir.to_owned());
        }
        // Baseline without events for files that already exist.
        self.files.extend(Self::list(dir)?);
        tracing::debug!(dir = %dir, interval_ms = self.interval.as_millis(), "Polling directory");
        Ok(())
    }

    fn unwatch(&mut self, dir: &Utf8Path) -> Result<(), WatchError> {
        self.dirs.retain(|d| d != dir);
        self.files.retain(|path, _| path.parent() != Some(dir));
        Ok(())
    }

    fn recv(&mut self) -> Result<EventBatch, WatchError> {
        loop {
            if self.closed {
                return Err(WatchError::Closed);
            }
            match self.wake_rx.recv_timeout(self.interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                    self.closed = true;
                    return Err(WatchError::Closed);
                }
                Err(RecvTimeoutError::Timeout) => {}
            }

            let batch = self.scan()?;
            if !batch.is_empty() {
                return Ok(batch);
            }
        }
    }

    fn waker(&self) -> Waker {
        let tx = self.wake_tx.clone();
        Waker::new(move || {
            let _ = tx.send(());
        })
    }

    fn watched_dirs(&self) -> &[Utf8PathBuf] {
        &self.dirs
    }

    fn is_native(&self) -> bool {
        false
    }

    fn backend_name(&self) -> &'static str {
        "poll"
    }
}
