//! Rotation handling: decides, per file event, whether to keep reading,
//! drain and replace the handle, rewind, or wait for the file to return.
//!
//! | Rotation | Events seen | Action |
//! |---|---|---|
//! | `create` (mv, cp+rm, rm) | Renamed/Removed, then Created | drain the old handle, open the new file at 0 |
//! | `nocreate` | Renamed/Removed, later Created or Written | drain, close, wait quietly, open at 0 |
//! | `copytruncate` | Written with size below the offset | keep the handle, rewind to 0 |
//! | `copy` | nothing on the tracked name | keep reading |
//!
//! Events are handled in arrival order. A Created for the tracked name
//! opens the file fresh at offset 0 unless it is the very file already
//! open. The state machine performs blocking file I/O only; it is driven
//! directly by unit tests with hand-made events.

use camino::Utf8Path;
use lt_watcher::{EventKind, FileId, NormalizedEvent};

use crate::error::TailError;
use crate::handle::{OpenHandle, StartPosition};
use crate::line_buffer::LineBuffer;
use crate::path::WatchedPath;

/// Whether a file is currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RotationState {
    /// A handle is open and being read.
    Reading,
    /// The file was rotated away; waiting for it to reappear.
    AwaitingCreate,
}

/// The outcome of handling one event or one read.
#[derive(Debug, Default)]
pub struct Step {
    /// Complete lines, in file order.
    pub lines: Vec<String>,
    /// Non-fatal problems met along the way.
    pub errors: Vec<TailError>,
    /// `true` if the last read filled the buffer and more data may follow.
    pub more: bool,
}

impl Step {
    /// Returns `true` if there is nothing to deliver.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() && self.errors.is_empty()
    }
}

/// Tracks one log file across rotations.
#[derive(Debug)]
pub struct LogrotateStateMachine {
    path: WatchedPath,
    handle: Option<OpenHandle>,
    buffer: LineBuffer,
    scratch: Vec<u8>,
}

impl LogrotateStateMachine {
    /// Opens the log file at the beginning or at its current end.
    ///
    /// # Errors
    ///
    /// Returns [`TailError::Open`] if the file cannot be opened.
    pub fn open(
        path: WatchedPath,
        read_from_start: bool,
        chunk_bytes: usize,
    ) -> Result<Self, TailError> {
        let start = if read_from_start {
            StartPosition::Beginning
        } else {
            StartPosition::End
        };
        let handle = OpenHandle::open(path.path(), start).map_err(|source| TailError::Open {
            path: path.path().to_owned(),
            source,
        })?;
        tracing::debug!(
            path = %path,
            offset = handle.offset(),
            file_id = handle.id().map(tracing::field::display),
            "Opened log file"
        );

        Ok(Self {
            path,
            handle: Some(handle),
            buffer: LineBuffer::new(),
            scratch: vec![0; chunk_bytes.max(1)],
        })
    }

    /// Returns whether a file is open.
    #[must_use]
    pub const fn state(&self) -> RotationState {
        if self.handle.is_some() {
            RotationState::Reading
        } else {
            RotationState::AwaitingCreate
        }
    }

    /// Returns the tracked path.
    #[must_use]
    pub const fn watched_path(&self) -> &WatchedPath {
        &self.path
    }

    /// Returns the read offset of the open file.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        self.handle.as_ref().map(OpenHandle::offset)
    }

    /// Applies one event and reads what it made available.
    pub fn handle_event(&mut self, event: &NormalizedEvent) -> Step {
        let mut step = Step::default();
        if !self.path.matches(&event.path) {
            return step;
        }
        tracing::trace!(event = %event, state = ?self.state(), "Handling file event");

        match event.kind {
            EventKind::Created => self.on_created(&mut step),
            EventKind::Written => self.on_written(&mut step),
            EventKind::Renamed | EventKind::Removed => self.on_departed(event.kind, &mut step),
        }
        step
    }

    /// Reads the next chunk from the open file, if any.
    ///
    /// Call again while [`Step::more`] is set.
    pub fn read_available(&mut self) -> Step {
        let mut step = Step::default();
        step.more = self.read_chunk(&mut step);
        step
    }

    /// Removes and returns the unterminated last line.
    pub fn take_partial(&mut self) -> Option<String> {
        self.buffer.take_partial()
    }

    /// Closes the open file and discards any partial line.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            tracing::debug!(path = %handle.path(), offset = handle.offset(), "Closed log file");
        }
        self.buffer.clear();
    }

    fn on_created(&mut self, step: &mut Step) {
        if self.is_open_file_at_path() {
            step.more = self.read_chunk(step);
            return;
        }
        if self.handle.is_some() {
            tracing::info!(path = %self.path, "Log file was replaced, switching to the new file");
            self.release(step);
        }
        if self.reopen(step) {
            step.more = self.read_chunk(step);
        }
    }

    fn on_written(&mut self, step: &mut Step) {
        if self.handle.is_none() {
            if !self.reopen(step) {
                return;
            }
        } else if self.is_replaced() {
            tracing::info!(path = %self.path, "Log file was replaced without a rename event");
            self.release(step);
            if !self.reopen(step) {
                return;
            }
        }
        step.more = self.read_chunk(step);
    }

    fn on_departed(&mut self, kind: EventKind, step: &mut Step) {
        if self.handle.is_none() {
            return;
        }
        // The path may already name our file again by the time a late
        // event is processed, e.g. after a replace detected on Written.
        if self.is_open_file_at_path() {
            tracing::debug!(path = %self.path, kind = %kind, "Ignoring stale event for the open file");
            return;
        }
        tracing::info!(path = %self.path, kind = %kind, "Log file rotated away, waiting for it to reappear");
        self.release(step);
    }

    /// Drains the old handle to end of file and closes it.
    fn release(&mut self, step: &mut Step) {
        while self.read_chunk(step) {}
        if let Some(partial) = self.buffer.take_partial() {
            tracing::debug!(
                path = %self.path,
                bytes = partial.len(),
                "Discarding unterminated line from the rotated file"
            );
        }
        self.close();
    }

    /// Opens the tracked path at offset 0.
    ///
    /// A missing file is not an error: the next Created or Written retries.
    fn reopen(&mut self, step: &mut Step) -> bool {
        match OpenHandle::open(self.path.path(), StartPosition::Beginning) {
            Ok(handle) => {
                tracing::debug!(
                    path = %self.path,
                    file_id = handle.id().map(tracing::field::display),
                    "Opened rotated log file from the start"
                );
                self.handle = Some(handle);
                self.buffer.clear();
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path, "Log file does not exist yet");
                false
            }
            Err(e) => {
                tracing::debug!(path = %self.path, error = %e, "Failed to reopen log file");
                step.errors.push(TailError::transient(self.path.path(), e));
                false
            }
        }
    }

    /// Reads one chunk into the line buffer. Returns `true` if the chunk
    /// was full.
    fn read_chunk(&mut self, step: &mut Step) -> bool {
        let Some(handle) = self.handle.as_mut() else {
            return false;
        };

        match handle.rewind_if_truncated() {
            Ok(true) => {
                tracing::info!(path = %self.path, "Log file was truncated, reading from the start");
                self.buffer.clear();
            }
            Ok(false) => {}
            Err(e) => {
                step.errors.push(TailError::transient(handle.path(), e));
                return false;
            }
        }

        match handle.read_chunk(&mut self.scratch) {
            Ok(0) => false,
            Ok(n) => {
                self.buffer.push(&self.scratch[..n], &mut step.lines);
                n == self.scratch.len()
            }
            Err(e) => {
                tracing::debug!(path = %handle.path(), error = %e, "Read failed");
                step.errors.push(TailError::transient(handle.path(), e));
                false
            }
        }
    }

    /// `true` if the path currently names the file that is open.
    fn is_open_file_at_path(&self) -> bool {
        match (self.open_id(), path_id(self.path.path())) {
            (Some(open), Some(current)) => open == current,
            _ => false,
        }
    }

    /// `true` if the path now names a different file than the open one.
    fn is_replaced(&self) -> bool {
        match (self.open_id(), path_id(self.path.path())) {
            (Some(open), Some(current)) => open != current,
            _ => false,
        }
    }

    fn open_id(&self) -> Option<FileId> {
        self.handle.as_ref().and_then(OpenHandle::id)
    }
}

fn path_id(path: &Utf8Path) -> Option<FileId> {
    FileId::from_path(path).ok().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        path: Utf8PathBuf,
        backup: Utf8PathBuf,
    }

    impl Fixture {
        fn new(contents: &str) -> Self {
            let dir = TempDir::new().expect("temp dir");
            let root = Utf8Path::from_path(dir.path())
                .expect("utf8")
                .canonicalize_utf8()
                .expect("canonical");
            let path = root.join("app.log");
            fs::write(&path, contents).expect("write");
            Self {
                _dir: dir,
                backup: root.join("app.log.1"),
                path,
            }
        }

        fn machine(&self, read_from_start: bool) -> LogrotateStateMachine {
            let watched = WatchedPath::new(&self.path).expect("watched path");
            LogrotateStateMachine::open(watched, read_from_start, 64 * 1024).expect("open")
        }

        fn append(&self, text: &str) {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)
                .expect("open for append");
            file.write_all(text.as_bytes()).expect("append");
        }

        fn event(&self, kind: EventKind) -> NormalizedEvent {
            NormalizedEvent::new(kind, self.path.clone())
        }
    }

    fn lines(step: &Step) -> Vec<&str> {
        step.lines.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_read_from_start_delivers_existing_lines() {
        let fx = Fixture::new("a\nb\n");
        let mut machine = fx.machine(true);
        assert_eq!(lines(&machine.read_available()), vec!["a", "b"]);
        assert!(machine.read_available().is_empty());
    }

    #[test]
    fn test_read_from_end_skips_existing_lines() {
        let fx = Fixture::new("old\n");
        let mut machine = fx.machine(false);
        assert!(machine.read_available().is_empty());

        fx.append("new\n");
        let step = machine.handle_event(&fx.event(EventKind::Written));
        assert_eq!(lines(&step), vec!["new"]);
    }

    #[test]
    fn test_missing_file_fails_open() {
        let fx = Fixture::new("");
        fs::remove_file(&fx.path).expect("remove");
        let watched = WatchedPath::new(&fx.path).expect("watched path");
        let err = LogrotateStateMachine::open(watched, true, 1024).expect_err("missing file");
        assert!(matches!(err, TailError::Open { .. }));
    }

    #[test]
    fn test_events_for_other_files_are_ignored() {
        let fx = Fixture::new("");
        let mut machine = fx.machine(true);
        fx.append("x\n");
        let step = machine.handle_event(&NormalizedEvent::written(fx.backup.clone()));
        assert!(step.is_empty());
    }

    #[test]
    fn test_partial_line_waits_for_newline() {
        let fx = Fixture::new("");
        let mut machine = fx.machine(true);
        fx.append("par");
        assert!(machine.handle_event(&fx.event(EventKind::Written)).is_empty());
        fx.append("tial\n");
        let step = machine.handle_event(&fx.event(EventKind::Written));
        assert_eq!(lines(&step), vec!["partial"]);
    }

    #[test]
    fn test_create_rotation_with_move() {
        let fx = Fixture::new("a\n");
        let mut machine = fx.machine(true);
        assert_eq!(lines(&machine.read_available()), vec!["a"]);

        // Written before the rotation but not yet read.
        fx.append("b\n");
        fs::rename(&fx.path, &fx.backup).expect("rename");
        let step = machine.handle_event(&fx.event(EventKind::Renamed));
        assert_eq!(lines(&step), vec!["b"]);
        assert_eq!(machine.state(), RotationState::AwaitingCreate);

        fs::write(&fx.path, "").expect("create");
        assert!(machine.handle_event(&fx.event(EventKind::Created)).is_empty());
        assert_eq!(machine.state(), RotationState::Reading);

        fx.append("c\n");
        let step = machine.handle_event(&fx.event(EventKind::Written));
        assert_eq!(lines(&step), vec!["c"]);
    }

    #[test]
    fn test_nocreate_rotation_waits_without_error() {
        let fx = Fixture::new("a\n");
        let mut machine = fx.machine(true);
        machine.read_available();

        fs::remove_file(&fx.path).expect("remove");
        let step = machine.handle_event(&fx.event(EventKind::Removed));
        assert!(step.is_empty());
        assert_eq!(machine.state(), RotationState::AwaitingCreate);

        // Nothing exists yet: stays waiting, no error.
        assert!(machine.handle_event(&fx.event(EventKind::Written)).is_empty());
        assert_eq!(machine.state(), RotationState::AwaitingCreate);

        fx.append("b\n");
        let step = machine.handle_event(&fx.event(EventKind::Created));
        assert_eq!(lines(&step), vec!["b"]);
    }

    #[test]
    fn test_written_reopens_when_created_was_missed() {
        let fx = Fixture::new("a\n");
        let mut machine = fx.machine(true);
        machine.read_available();

        fs::rename(&fx.path, &fx.backup).expect("rename");
        machine.handle_event(&fx.event(EventKind::Renamed));
        fx.append("b\n");

        let step = machine.handle_event(&fx.event(EventKind::Written));
        assert_eq!(lines(&step), vec!["b"]);
    }

    #[test]
    fn test_copytruncate_rewinds_without_duplicates() {
        let fx = Fixture::new("");
        let mut machine = fx.machine(true);
        fx.append("x\ny\n");
        assert_eq!(
            lines(&machine.handle_event(&fx.event(EventKind::Written))),
            vec!["x", "y"]
        );

        fs::copy(&fx.path, &fx.backup).expect("copy");
        fs::write(&fx.path, "").expect("truncate");
        assert!(machine.handle_event(&fx.event(EventKind::Written)).is_empty());
        assert_eq!(machine.offset(), Some(0));

        fx.append("z\n");
        assert_eq!(
            lines(&machine.handle_event(&fx.event(EventKind::Written))),
            vec!["z"]
        );
    }

    #[test]
    fn test_copy_rotation_keeps_reading() {
        let fx = Fixture::new("a\n");
        let mut machine = fx.machine(true);
        machine.read_available();

        fs::copy(&fx.path, &fx.backup).expect("copy");
        assert!(machine
            .handle_event(&NormalizedEvent::created(fx.backup.clone()))
            .is_empty());

        fx.append("b\n");
        assert_eq!(
            lines(&machine.handle_event(&fx.event(EventKind::Written))),
            vec!["b"]
        );
    }

    #[cfg(unix)]
    #[test]
    fn test_created_for_open_file_does_not_reread() {
        let fx = Fixture::new("a\n");
        let mut machine = fx.machine(true);
        assert_eq!(lines(&machine.read_available()), vec!["a"]);

        let step = machine.handle_event(&fx.event(EventKind::Created));
        assert!(step.is_empty());
        assert_eq!(machine.offset(), Some(2));
    }

    #[cfg(unix)]
    #[test]
    fn test_written_detects_replaced_file_and_stale_departure_is_ignored() {
        let fx = Fixture::new("a\n");
        let mut machine = fx.machine(true);
        machine.read_available();

        fx.append("b\n");
        fs::rename(&fx.path, &fx.backup).expect("rename");
        fs::write(&fx.path, "c\n").expect("create");

        // Written arrives before the rename is seen.
        let step = machine.handle_event(&fx.event(EventKind::Written));
        assert_eq!(lines(&step), vec!["b", "c"]);

        // The late rename and create must not cause a re-read.
        assert!(machine.handle_event(&fx.event(EventKind::Renamed)).is_empty());
        assert_eq!(machine.state(), RotationState::Reading);
        assert!(machine.handle_event(&fx.event(EventKind::Created)).is_empty());
    }

    #[test]
    fn test_chunked_reads_report_more() {
        let fx = Fixture::new("0123456789\n");
        let watched = WatchedPath::new(&fx.path).expect("watched path");
        let mut machine = LogrotateStateMachine::open(watched, true, 4).expect("open");

        let mut all = Vec::new();
        loop {
            let step = machine.read_available();
            all.extend(step.lines);
            if !step.more {
                break;
            }
        }
        assert_eq!(all, vec!["0123456789"]);
    }

    #[test]
    fn test_take_partial_and_close() {
        let fx = Fixture::new("done\nhalf");
        let mut machine = fx.machine(true);
        assert_eq!(lines(&machine.read_available()), vec!["done"]);
        assert_eq!(machine.take_partial().as_deref(), Some("half"));

        machine.close();
        assert_eq!(machine.state(), RotationState::AwaitingCreate);
        assert!(machine.read_available().is_empty());
    }
}
