//! The [`FileTailer`]: watches one log file and delivers its lines.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────┐
//! │ EventLoop (blocking thread)  │ Watcher::recv, filter, guarded send
//! └──────────────┬───────────────┘
//!                │ NormalizedEvent / WatchError
//!                ▼
//! ┌──────────────────────────────┐
//! │ tailer task (tokio)          │ LogrotateStateMachine, LineBuffer
//! └──────────────┬───────────────┘
//!                │ String / TailError
//!                ▼
//!             consumer
//! ```
//!
//! Every send to the consumer races the tailer's cancellation token, so
//! [`FileTailer::close`] never waits for a consumer that stopped reading.

use camino::Utf8Path;
use lt_core::TailConfig;
use lt_watcher::{EventLoop, FileNameFilter, NormalizedEvent, WatchError, create_watcher};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::error::TailError;
use crate::logrotate::{LogrotateStateMachine, Step};
use crate::path::WatchedPath;

/// Lifecycle of a [`FileTailer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TailerState {
    /// Lines are being delivered.
    Running,
    /// Shutdown has begun; the watcher is being stopped.
    Closing,
    /// Everything is released and both channels are closed.
    Closed,
}

impl std::fmt::Display for TailerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Running => "running",
            Self::Closing => "closing",
            Self::Closed => "closed",
        })
    }
}

/// Tails one log file across rotations.
///
/// # Examples
///
/// ```no_run
/// use lt_core::TailConfig;
/// use lt_tailer::FileTailer;
///
/// # async fn example() -> Result<(), lt_tailer::TailError> {
/// let config = TailConfig::default().with_read_from_start(true);
/// let mut tailer = FileTailer::run("/var/log/app.log", &config)?;
///
/// while let Some(line) = tailer.lines().recv().await {
///     println!("{line}");
/// }
///
/// tailer.close().await;
/// # Ok(())
/// # }
/// ```
pub struct FileTailer {
    lines_rx: mpsc::Receiver<String>,
    errors_rx: mpsc::Receiver<TailError>,
    cancel: CancellationToken,
    state_rx: watch::Receiver<TailerState>,
    task: Option<JoinHandle<()>>,
    path: WatchedPath,
    backend: &'static str,
}

impl std::fmt::Debug for FileTailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileTailer")
            .field("path", &self.path)
            .field("backend", &self.backend)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl FileTailer {
    /// Starts tailing `path`.
    ///
    /// The directory is watched before the file is opened. With
    /// [`read_from_start`](TailConfig::read_from_start) the existing
    /// content is delivered first, so nothing appended during startup is
    /// missed. Without it, tailing begins at the end of file as of the
    /// open, and anything appended before that point is skipped.
    ///
    /// # Errors
    ///
    /// Returns a setup error if the configuration is invalid, the
    /// directory cannot be watched, or the file cannot be opened.
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn run(path: impl AsRef<Utf8Path>, config: &TailConfig) -> Result<Self, TailError> {
        config.validate()?;
        let path = WatchedPath::new(path.as_ref())?;

        let watcher = create_watcher(&config.watch, path.dir()).map_err(|source| {
            TailError::Watch {
                path: path.dir().to_owned(),
                source,
            }
        })?;
        let backend = watcher.backend_name();
        let machine =
            LogrotateStateMachine::open(path.clone(), config.read_from_start, config.read_chunk_bytes)?;
        let event_loop = EventLoop::start(
            watcher,
            FileNameFilter::new(path.file_name()),
            config.channel_capacity,
        );

        let (lines_tx, lines_rx) = mpsc::channel(config.channel_capacity);
        let (errors_tx, errors_rx) = mpsc::channel(config.channel_capacity);
        let (state_tx, state_rx) = watch::channel(TailerState::Running);
        let cancel = CancellationToken::new();

        let task = TailTask {
            machine: Some(machine),
            event_loop,
            lines_tx,
            errors_tx,
            state_tx,
            cancel: cancel.clone(),
            flush_partial_on_close: config.flush_partial_on_close,
        };
        let span = tracing::info_span!("tailer", path = %path, backend);
        let task = tokio::spawn(task.run().instrument(span));

        tracing::debug!(path = %path, backend, "Tailer started");
        Ok(Self {
            lines_rx,
            errors_rx,
            cancel,
            state_rx,
            task: Some(task),
            path,
            backend,
        })
    }

    /// Returns the receiver of complete lines, without line terminators.
    pub fn lines(&mut self) -> &mut mpsc::Receiver<String> {
        &mut self.lines_rx
    }

    /// Returns the receiver of errors.
    ///
    /// Transient errors do not stop the tailer; after a fatal one it shuts
    /// itself down.
    pub fn errors(&mut self) -> &mut mpsc::Receiver<TailError> {
        &mut self.errors_rx
    }

    /// Returns both receivers at once, for use in a single `tokio::select!`.
    pub fn receivers(
        &mut self,
    ) -> (
        &mut mpsc::Receiver<String>,
        &mut mpsc::Receiver<TailError>,
    ) {
        (&mut self.lines_rx, &mut self.errors_rx)
    }

    /// Returns the tracked path.
    #[must_use]
    pub const fn watched_path(&self) -> &WatchedPath {
        &self.path
    }

    /// Returns the name of the watcher backend in use.
    #[must_use]
    pub const fn backend_name(&self) -> &'static str {
        self.backend
    }

    /// Returns the current lifecycle state.
    ///
    /// Reports [`TailerState::Closing`] from the moment
    /// [`close`](Self::close) is called until shutdown completes.
    #[must_use]
    pub fn state(&self) -> TailerState {
        match *self.state_rx.borrow() {
            TailerState::Running if self.cancel.is_cancelled() => TailerState::Closing,
            state => state,
        }
    }

    /// Waits until the tailer has shut down, by [`close`](Self::close) or
    /// after a fatal error.
    pub async fn closed(&self) {
        let mut state = self.state_rx.clone();
        // An error means the task is gone, which also counts as closed.
        let _ = state.wait_for(|s| *s == TailerState::Closed).await;
    }

    /// Stops tailing and releases the watch, the event loop and the file.
    ///
    /// Both channels are closed when this returns. Lines and errors that
    /// were already delivered stay receivable. Safe to call more than once.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(path = %self.path, error = %error, "Tailer task failed");
            }
        }
        self.lines_rx.close();
        self.errors_rx.close();
    }
}

impl Drop for FileTailer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// What woke the tailer task.
enum Wake {
    Cancelled,
    Event(Option<NormalizedEvent>),
    WatchError(Option<WatchError>),
}

/// State owned by the background task.
struct TailTask {
    /// Lent to the blocking pool for each file operation.
    machine: Option<LogrotateStateMachine>,
    event_loop: EventLoop,
    lines_tx: mpsc::Sender<String>,
    errors_tx: mpsc::Sender<TailError>,
    state_tx: watch::Sender<TailerState>,
    cancel: CancellationToken,
    flush_partial_on_close: bool,
}

impl TailTask {
    async fn run(mut self) {
        let mut running = match self.blocking(LogrotateStateMachine::read_available).await {
            Some(step) => self.deliver(step).await,
            None => false,
        };
        while running {
            running = self.next().await;
        }
        self.shutdown().await;
    }

    /// Waits for one event or error and handles it. Returns `false` once
    /// the tailer should stop.
    async fn next(&mut self) -> bool {
        let wake = {
            let (events, errors) = self.event_loop.receivers();
            tokio::select! {
                biased;
                () = self.cancel.cancelled() => Wake::Cancelled,
                error = errors.recv() => Wake::WatchError(error),
                event = events.recv() => Wake::Event(event),
            }
        };

        match wake {
            Wake::Cancelled => false,
            Wake::Event(Some(event)) => {
                match self.blocking(move |machine| machine.handle_event(&event)).await {
                    Some(step) => self.deliver(step).await,
                    None => false,
                }
            }
            Wake::WatchError(Some(error)) => self.forward_watch_error(error).await,
            Wake::Event(None) | Wake::WatchError(None) => {
                // The event loop ended; anything it reported is already queued.
                while let Ok(error) = self.event_loop.errors().try_recv() {
                    if !self.forward_watch_error(error).await {
                        break;
                    }
                }
                false
            }
        }
    }

    /// Sends a step's output, then keeps reading while more data is ready.
    async fn deliver(&mut self, mut step: Step) -> bool {
        loop {
            for error in step.errors.drain(..) {
                tracing::warn!(error = %error, "Transient tailer error");
                if !send(&self.errors_tx, &self.cancel, error).await {
                    return false;
                }
            }
            for line in step.lines.drain(..) {
                if !send(&self.lines_tx, &self.cancel, line).await {
                    return false;
                }
            }
            if !step.more || self.cancel.is_cancelled() {
                return !self.cancel.is_cancelled();
            }
            step = match self.blocking(LogrotateStateMachine::read_available).await {
                Some(step) => step,
                None => return false,
            };
        }
    }

    /// Runs one file operation of the state machine on the blocking pool.
    ///
    /// Returns `None` if the operation panicked; the file state is lost and
    /// the tailer stops.
    async fn blocking<F>(&mut self, op: F) -> Option<Step>
    where
        F: FnOnce(&mut LogrotateStateMachine) -> Step + Send + 'static,
    {
        let mut machine = self.machine.take()?;
        let joined = tokio::task::spawn_blocking(move || {
            let step = op(&mut machine);
            (machine, step)
        })
        .await;

        match joined {
            Ok((machine, step)) => {
                self.machine = Some(machine);
                Some(step)
            }
            Err(error) => {
                tracing::error!(error = %error, "File read task failed, stopping tailer");
                None
            }
        }
    }

    async fn forward_watch_error(&mut self, error: WatchError) -> bool {
        let error = TailError::from(error);
        let fatal = error.is_fatal();
        if fatal {
            tracing::warn!(error = %error, "Directory watch failed, stopping tailer");
        } else {
            tracing::debug!(error = %error, "Watcher reported a recoverable error");
        }
        send(&self.errors_tx, &self.cancel, error).await && !fatal
    }

    async fn shutdown(self) {
        let Self {
            machine,
            mut event_loop,
            lines_tx,
            errors_tx,
            state_tx,
            flush_partial_on_close,
            ..
        } = self;

        state_tx.send_replace(TailerState::Closing);
        event_loop.close().await;

        if let Some(mut machine) = machine {
            if flush_partial_on_close {
                if let Some(line) = machine.take_partial() {
                    // Best effort: a full channel or a gone consumer drops it.
                    if lines_tx.try_send(line).is_err() {
                        tracing::debug!("Dropped unterminated last line on close");
                    }
                }
            }
            machine.close();
        }
        drop(lines_tx);
        drop(errors_tx);

        state_tx.send_replace(TailerState::Closed);
        tracing::debug!("Tailer stopped");
    }
}

/// Sends `value` unless the tailer is cancelled first.
async fn send<T>(tx: &mpsc::Sender<T>, cancel: &CancellationToken, value: T) -> bool {
    tokio::select! {
        biased;
        () = cancel.cancelled() => false,
        sent = tx.send(value) => sent.is_ok(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use camino::Utf8PathBuf;
    use lt_core::WatchMode;
    use std::fs::{self, OpenOptions};
    use std::io::Write;
    use std::time::Duration;
    use tempfile::TempDir;
    use tokio::time::timeout;

    const WAIT: Duration = Duration::from_secs(10);

    fn log_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(dir.path().join("app.log")).expect("utf8");
        (dir, path)
    }

    fn append(path: &Utf8Path, text: &str) {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .expect("open for append");
        file.write_all(text.as_bytes()).expect("append");
    }

    async fn next_line(tailer: &mut FileTailer) -> String {
        timeout(WAIT, tailer.lines().recv())
            .await
            .expect("line in time")
            .expect("line")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_fails_for_missing_file() {
        let (_dir, path) = log_dir();
        let err = FileTailer::run(&path, &TailConfig::default()).expect_err("missing file");
        assert!(matches!(err, TailError::Open { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_fails_for_missing_directory() {
        let err = FileTailer::run("/nonexistent/logtail/app.log", &TailConfig::default())
            .expect_err("missing directory");
        assert!(matches!(err, TailError::Watch { .. }));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_run_rejects_invalid_config() {
        let (_dir, path) = log_dir();
        fs::write(&path, "").expect("create");
        let config = TailConfig {
            channel_capacity: 0,
            ..TailConfig::default()
        };
        let err = FileTailer::run(&path, &config).expect_err("invalid config");
        assert!(matches!(err, TailError::Config(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_state_transitions_and_closed_signal() {
        let (_dir, path) = log_dir();
        fs::write(&path, "").expect("create");
        let mut tailer = FileTailer::run(&path, &TailConfig::default()).expect("tailer");
        assert_eq!(tailer.state(), TailerState::Running);

        tailer.close().await;
        assert_eq!(tailer.state(), TailerState::Closed);
        timeout(WAIT, tailer.closed()).await.expect("closed signal");
        assert!(tailer.lines().recv().await.is_none());
        assert!(tailer.errors().recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_state_is_closing_once_close_begins() {
        let (_dir, path) = log_dir();
        fs::write(&path, "").expect("create");
        let mut tailer = FileTailer::run(&path, &TailConfig::default()).expect("tailer");

        // What close() does first, before it awaits the task.
        tailer.cancel.cancel();
        assert_ne!(tailer.state(), TailerState::Running);

        tailer.close().await;
        assert_eq!(tailer.state(), TailerState::Closed);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_flush_partial_on_close() {
        let (_dir, path) = log_dir();
        fs::write(&path, "full\nhalf").expect("create");
        let config = TailConfig::default()
            .with_read_from_start(true)
            .with_flush_partial_on_close(true)
            .with_watch_mode(WatchMode::Poll);
        let mut tailer = FileTailer::run(&path, &config).expect("tailer");

        assert_eq!(next_line(&mut tailer).await, "full");
        tailer.close().await;
        assert_eq!(tailer.lines().recv().await.as_deref(), Some("half"));
        assert!(tailer.lines().recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_partial_discarded_on_close_by_default() {
        let (_dir, path) = log_dir();
        fs::write(&path, "full\nhalf").expect("create");
        let config = TailConfig::default().with_read_from_start(true);
        let mut tailer = FileTailer::run(&path, &config).expect("tailer");

        assert_eq!(next_line(&mut tailer).await, "full");
        tailer.close().await;
        assert!(tailer.lines().recv().await.is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_removed_directory_shuts_tailer_down() {
        let dir = TempDir::new().expect("temp dir");
        let log_dir = dir.path().join("logs");
        fs::create_dir(&log_dir).expect("mkdir");
        let path = Utf8PathBuf::from_path_buf(log_dir.join("app.log")).expect("utf8");
        fs::write(&path, "").expect("create");

        let config = TailConfig::default().with_watch_mode(WatchMode::Poll);
        let mut tailer = FileTailer::run(&path, &config).expect("tailer");
        fs::remove_dir_all(&log_dir).expect("remove dir");

        let error = timeout(WAIT, tailer.errors().recv())
            .await
            .expect("error in time")
            .expect("error");
        assert!(error.is_fatal(), "unexpected error: {error}");
        timeout(WAIT, tailer.closed()).await.expect("self shutdown");
        assert_eq!(tailer.state(), TailerState::Closed);
    }

    #[tokio::test]
    async fn test_runs_on_a_current_thread_runtime() {
        let (_dir, path) = log_dir();
        fs::write(&path, "first\nsecond\n").expect("create");
        let config = TailConfig::default().with_read_from_start(true);
        let mut tailer = FileTailer::run(&path, &config).expect("tailer");

        assert_eq!(next_line(&mut tailer).await, "first");
        assert_eq!(next_line(&mut tailer).await, "second");
        append(&path, "third\n");
        assert_eq!(next_line(&mut tailer).await, "third");
        tailer.close().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_appends_are_delivered_in_order() {
        let (_dir, path) = log_dir();
        fs::write(&path, "skipped\n").expect("create");
        let mut tailer = FileTailer::run(&path, &TailConfig::default()).expect("tailer");

        for i in 0..20 {
            append(&path, &format!("line {i}\n"));
        }
        for i in 0..20 {
            assert_eq!(next_line(&mut tailer).await, format!("line {i}"));
        }
        tailer.close().await;
    }
}
