//! The cancellable event loop.
//!
//! [`EventLoop`] owns a [`Watcher`] and runs its blocking wait on a
//! dedicated blocking thread. Events and errors are handed to the consumer
//! through two bounded channels.
//!
//! # Shutdown
//!
//! [`EventLoop::close`] must terminate the loop no matter where it is:
//!
//! - **Blocked in the OS wait**: the watcher's [`Waker`] injects a wake-up,
//!   the wait returns [`WatchError::Closed`] and the loop exits.
//! - **Blocked in a send** because the consumer is not receiving: every
//!   send races a [`CancellationToken`], so the value is dropped and the
//!   loop exits.
//!
//! Once `close` returns, the blocking thread has finished, the watcher has
//! been dropped, and both channels report closed with nothing buffered.

use camino::Utf8PathBuf;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::WatchError;
use crate::events::NormalizedEvent;
use crate::filter::EventFilter;
use crate::watcher::{Waker, Watcher};

/// Default capacity for the event and error channels.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// A running watcher with consumer-facing event and error channels.
///
/// # Examples
///
/// ```no_run
/// use lt_core::WatchConfig;
/// use lt_watcher::{create_watcher, EventLoop, FileNameFilter};
/// use camino::Utf8Path;
///
/// # async fn example() -> Result<(), lt_watcher::WatchError> {
/// let watcher = create_watcher(&WatchConfig::default(), Utf8Path::new("/var/log"))?;
/// let mut event_loop = EventLoop::start(watcher, FileNameFilter::new("app.log"), 16);
///
/// if let Some(event) = event_loop.events().recv().await {
///     println!("{event}");
/// }
///
/// event_loop.close().await;
/// # Ok(())
/// # }
/// ```
pub struct EventLoop {
    events_rx: mpsc::Receiver<NormalizedEvent>,
    errors_rx: mpsc::Receiver<WatchError>,
    cancel: CancellationToken,
    waker: Waker,
    task: Option<JoinHandle<()>>,
    dirs: Vec<Utf8PathBuf>,
    backend: &'static str,
}

impl std::fmt::Debug for EventLoop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLoop")
            .field("dirs", &self.dirs)
            .field("backend", &self.backend)
            .field("is_running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl EventLoop {
    /// Starts processing `watcher`'s events immediately.
    ///
    /// The watcher must already be watching its directories. Events that
    /// `filter` rejects are dropped on the blocking thread. A `Renamed` or
    /// `Removed` event for a watched directory itself ends the loop with
    /// [`WatchError::WatchLost`].
    ///
    /// # Panics
    ///
    /// Panics if called outside a Tokio runtime.
    pub fn start<W: Watcher, F: EventFilter>(watcher: W, filter: F, capacity: usize) -> Self {
        let (events_tx, events_rx) = mpsc::channel(capacity.max(1));
        let (errors_tx, errors_rx) = mpsc::channel(capacity.max(1));
        let cancel = CancellationToken::new();
        let waker = watcher.waker();
        let dirs = watcher.watched_dirs().to_vec();
        let backend = watcher.backend_name();

        let runtime = Handle::current();
        let task_cancel = cancel.clone();
        let task = tokio::task::spawn_blocking(move || {
            run_event_loop(watcher, &filter, &events_tx, &errors_tx, &task_cancel, &runtime);
        });

        Self {
            events_rx,
            errors_rx,
            cancel,
            waker,
            task: Some(task),
            dirs,
            backend,
        }
    }

    /// Returns the receiver of normalized events.
    pub fn events(&mut self) -> &mut mpsc::Receiver<NormalizedEvent> {
        &mut self.events_rx
    }

    /// Returns the receiver of watcher errors.
    pub fn errors(&mut self) -> &mut mpsc::Receiver<WatchError> {
        &mut self.errors_rx
    }

    /// Returns both receivers at once, for use in a single `tokio::select!`.
    pub fn receivers(
        &mut self,
    ) -> (
        &mut mpsc::Receiver<NormalizedEvent>,
        &mut mpsc::Receiver<WatchError>,
    ) {
        (&mut self.events_rx, &mut self.errors_rx)
    }

    /// Returns the watched directories.
    #[must_use]
    pub fn watched_dirs(&self) -> &[Utf8PathBuf] {
        &self.dirs
    }

    /// Returns the name of the backend in use.
    #[must_use]
    pub fn backend_name(&self) -> &'static str {
        self.backend
    }

    /// Returns `true` while the blocking thread is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Stops the loop and closes both channels.
    ///
    /// Safe to call more than once. Values not yet received are discarded.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        self.waker.wake();

        if let Some(task) = self.task.take() {
            if let Err(error) = task.await {
                tracing::warn!(error = %error, "Event loop thread failed");
            }
        }

        self.events_rx.close();
        self.errors_rx.close();
        while self.events_rx.try_recv().is_ok() {}
        while self.errors_rx.try_recv().is_ok() {}
    }
}

impl Drop for EventLoop {
    fn drop(&mut self) {
        // Drop is sync, so the thread is signalled but not awaited.
        self.cancel.cancel();
        self.waker.wake();
    }
}

/// Body of the blocking thread.
fn run_event_loop<W: Watcher, F: EventFilter>(
    mut watcher: W,
    filter: &F,
    events_tx: &mpsc::Sender<NormalizedEvent>,
    errors_tx: &mpsc::Sender<WatchError>,
    cancel: &CancellationToken,
    runtime: &Handle,
) {
    let dirs = watcher.watched_dirs().to_vec();
    tracing::debug!(backend = watcher.backend_name(), dirs = ?dirs, "Event loop started");

    'outer: while !cancel.is_cancelled() {
        let batch = match watcher.recv() {
            Ok(batch) => batch,
            Err(WatchError::Closed) => break,
            Err(error) => {
                let fatal = error.is_fatal();
                tracing::debug!(error = %error, fatal, "Watcher reported an error");
                if !deliver(runtime, cancel, errors_tx, error) || fatal {
                    break;
                }
                continue;
            }
        };

        for event in batch {
            if event.kind.is_departure() && dirs.contains(&event.path) {
                let lost = WatchError::watch_lost(event.path, "watched directory was removed");
                deliver(runtime, cancel, errors_tx, lost);
                break 'outer;
            }
            if !filter.should_process(&event) {
                tracing::trace!(event = %event, "Filtered out file event");
                continue;
            }
            tracing::trace!(event = %event, "Forwarding file event");
            if !deliver(runtime, cancel, events_tx, event) {
                break 'outer;
            }
        }
    }

    for dir in &dirs {
        if let Err(error) = watcher.unwatch(dir) {
            tracing::debug!(dir = %dir, error = %error, "Unwatch failed during shutdown");
        }
    }
    tracing::debug!(backend = watcher.backend_name(), "Event loop stopped");
}

/// Sends `value` unless shutdown is requested first.
///
/// Returns `false` if the value was abandoned or the receiver is gone.
fn deliver<T>(
    runtime: &Handle,
    cancel: &CancellationToken,
    tx: &mpsc::Sender<T>,
    value: T,
) -> bool {
    runtime.block_on(async {
        tokio::select! {
            biased;
            () = cancel.cancelled() => false,
            sent = tx.send(value) => sent.is_ok(),
        }
    })
}
