//! The [`Watcher`] abstraction over filesystem notification backends.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │              Blocking Thread (spawn_blocking)                 │
//! │  ┌──────────────────┐   recv()    ┌────────────────────────┐  │
//! │  │ NativeWatcher    │ ──────────► │ EventLoop              │  │
//! │  │ or PollWatcher   │  EventBatch │ (filter, guarded send) │  │
//! │  └────────▲─────────┘             └───────────┬────────────┘  │
//! └───────────│───────────────────────────────────│───────────────┘
//!             │ Waker::wake()                      │ events / errors
//!             │                                    ▼
//! ┌───────────┴───────────────────────────────────────────────────┐
//! │                    Async Runtime (tokio)                      │
//! │       EventLoop::close()            mpsc::Receiver            │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every backend's blocking wait listens on a channel that its [`Waker`]
//! can also write to, so a close can always force the wait to return with
//! [`WatchError::Closed`] instead of waiting for the next real event.

use std::sync::Arc;

use camino::{Utf8Path, Utf8PathBuf};

use lt_core::{WatchConfig, WatchMode};

use crate::error::WatchError;
use crate::events::EventBatch;
use crate::native::NativeWatcher;
use crate::poll::PollWatcher;

/// A filesystem notification backend.
///
/// Implementations watch directories non-recursively and report changes to
/// the files directly inside them.
pub trait Watcher: Send + 'static {
    /// Subscribes to changes inside `dir`.
    ///
    /// # Errors
    ///
    /// Fails if the directory does not exist or cannot be watched.
    fn watch(&mut self, dir: &Utf8Path) -> Result<(), WatchError>;

    /// Cancels the subscription for `dir`.
    ///
    /// # Errors
    ///
    /// Fails if the backend rejects the request, e.g. because the
    /// directory is already gone.
    fn unwatch(&mut self, dir: &Utf8Path) -> Result<(), WatchError>;

    /// Blocks until at least one event is available.
    ///
    /// # Errors
    ///
    /// Returns [`WatchError::Closed`] once the backend's [`Waker`] has
    /// fired, and keeps returning it on every later call. Other errors
    /// describe a failed notification or a lost subscription.
    fn recv(&mut self) -> Result<EventBatch, WatchError>;

    /// Returns a handle that forces a blocked [`Watcher::recv`] to return.
    fn waker(&self) -> Waker;

    /// Returns the directories currently watched.
    fn watched_dirs(&self) -> &[Utf8PathBuf];

    /// Returns `true` for OS notification backends, `false` for polling.
    fn is_native(&self) -> bool;

    /// Returns the backend name for logging.
    fn backend_name(&self) -> &'static str;
}

impl<W: Watcher + ?Sized> Watcher for Box<W> {
    fn watch(&mut self, dir: &Utf8Path) -> Result<(), WatchError> {
        (**self).watch(dir)
    }

    fn unwatch(&mut self, dir: &Utf8Path) -> Result<(), WatchError> {
        (**self).unwatch(dir)
    }

    fn recv(&mut self) -> Result<EventBatch, WatchError> {
        (**self).recv()
    }

    fn waker(&self) -> Waker {
        (**self).waker()
    }

    fn watched_dirs(&self) -> &[Utf8PathBuf] {
        (**self).watched_dirs()
    }

    fn is_native(&self) -> bool {
        (**self).is_native()
    }

    fn backend_name(&self) -> &'static str {
        (**self).backend_name()
    }
}

/// Wakes a watcher blocked in [`Watcher::recv`].
///
/// Waking is sticky: once woken, the watcher reports
/// [`WatchError::Closed`] from then on.
#[derive(Clone)]
pub struct Waker {
    wake: Arc<dyn Fn() + Send + Sync>,
}

impl Waker {
    /// Creates a waker from the backend's wake action.
    pub fn new(wake: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            wake: Arc::new(wake),
        }
    }

    /// Forces the blocked wait to return. Safe to call repeatedly and after
    /// the watcher has been dropped.
    pub fn wake(&self) {
        (self.wake)();
    }
}

impl std::fmt::Debug for Waker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Waker").finish_non_exhaustive()
    }
}

/// Creates a watcher for `dir` according to `config`.
///
/// In [`WatchMode::Auto`] the native backend is tried first; if it cannot
/// be created or cannot watch `dir`, the polling backend takes over.
///
/// # Errors
///
/// Returns [`WatchError::PathNotFound`] if `dir` does not exist, or the
/// backend's error if `dir` cannot be watched.
pub fn create_watcher(
    config: &WatchConfig,
    dir: &Utf8Path,
) -> Result<Box<dyn Watcher>, WatchError> {
    if !dir.is_dir() {
        return Err(WatchError::path_not_found(dir));
    }

    match config.mode {
        WatchMode::Native => {
            let mut watcher = NativeWatcher::new()?;
            watcher.watch(dir)?;
            Ok(Box::new(watcher))
        }
        WatchMode::Poll => {
            let mut watcher = PollWatcher::new(config.poll_interval());
            watcher.watch(dir)?;
            Ok(Box::new(watcher))
        }
        WatchMode::Auto => {
            match NativeWatcher::new().and_then(|mut watcher| {
                watcher.watch(dir)?;
                Ok(watcher)
            }) {
                Ok(watcher) => {
                    tracing::debug!(backend = watcher.backend_name(), dir = %dir, "Using native watcher");
                    Ok(Box::new(watcher))
                }
                Err(error) => {
                    tracing::warn!(
                        error = %error,
                        dir = %dir,
                        "Native file watching unavailable, falling back to polling"
                    );
                    let mut watcher = PollWatcher::new(config.poll_interval());
                    watcher.watch(dir)?;
                    Ok(Box::new(watcher))
                }
            }
        }
    }
}
