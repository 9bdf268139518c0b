//! Directory watching for the logtail file tailer.
//!
//! This crate turns OS file notifications (or periodic directory scans) into
//! a small, platform-neutral event vocabulary and delivers those events to
//! async code through a cancellable event loop.
//!
//! # Overview
//!
//! - [`Watcher`] is the backend seam. [`create_watcher`] picks a native
//!   (`notify`) or polling backend from a [`WatchConfig`](lt_core::WatchConfig).
//! - [`NormalizedEvent`] carries one of four [`EventKind`]s: created,
//!   written, renamed, removed.
//! - [`EventLoop`] runs the backend's blocking wait on a blocking thread and
//!   forwards filtered events and errors over bounded channels. Its
//!   [`close`](EventLoop::close) stops the loop even while the thread is
//!   blocked in the OS wait or in a send to a consumer that stopped reading.
//! - [`FileId`] identifies a file independently of its name, so a rotated
//!   file can be told apart from its replacement.
//!
//! # Crate Dependencies
//!
//! ```text
//! lt-cli ──► lt-tailer ──► lt-watcher ──► lt-core
//!        └─► lt-mutate ──────────────────►
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use camino::Utf8Path;
//! use lt_core::WatchConfig;
//! use lt_watcher::{create_watcher, EventLoop, FileNameFilter};
//!
//! # async fn example() -> Result<(), lt_watcher::WatchError> {
//! let dir = Utf8Path::new("/var/log/myapp");
//! let watcher = create_watcher(&WatchConfig::default(), dir)?;
//! let mut event_loop = EventLoop::start(watcher, FileNameFilter::new("app.log"), 100);
//!
//! loop {
//!     let (events, errors) = event_loop.receivers();
//!     tokio::select! {
//!         Some(event) = events.recv() => println!("{event}"),
//!         Some(error) = errors.recv() => {
//!             eprintln!("watcher error: {error}");
//!             if error.is_fatal() {
//!                 break;
//!             }
//!         }
//!         else => break,
//!     }
//! }
//!
//! event_loop.close().await;
//! # Ok(())
//! # }
//! ```
//!
//! # Error Handling
//!
//! ```
//! use lt_watcher::WatchError;
//!
//! fn handle_watch_error(err: &WatchError) {
//!     if err.is_fatal() {
//!         eprintln!("Fatal watcher error: {err}");
//!     } else {
//!         eprintln!("Warning: {err}");
//!     }
//! }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod event_loop;
pub mod events;
pub mod file_id;
pub mod filter;
mod native;
mod poll;
pub mod watcher;

// Re-export error types
pub use error::WatchError;

// Re-export the event loop
pub use event_loop::{DEFAULT_CHANNEL_CAPACITY, EventLoop};

// Re-export event types
pub use events::{EventBatch, EventKind, NormalizedEvent};

// Re-export identity and filters
pub use file_id::FileId;
pub use filter::{AcceptAllFilter, EventFilter, FileNameFilter};

// Re-export watcher types
pub use native::NativeWatcher;
pub use poll::PollWatcher;
pub use watcher::{Waker, Watcher, create_watcher};
