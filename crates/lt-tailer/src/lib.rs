//! Rotation-aware log file tailing.
//!
//! [`FileTailer`] watches the directory of one log file and delivers every
//! line appended to it, in order and exactly once, across the common
//! logrotate strategies: `create` (after move, copy or remove), `nocreate`,
//! `copytruncate` and `copy`. It works whether the writing process keeps
//! the file open or reopens it for every line.
//!
//! # Components
//!
//! - [`LineBuffer`] splits bytes into lines and holds the partial tail.
//! - [`OpenHandle`] owns the file descriptor and the read offset and
//!   detects truncation.
//! - [`LogrotateStateMachine`] applies file events to the handle.
//! - [`FileTailer`] runs the state machine on a task fed by an
//!   [`EventLoop`](lt_watcher::EventLoop).
//!
//! # Usage
//!
//! ```no_run
//! use lt_core::TailConfig;
//! use lt_tailer::FileTailer;
//!
//! # async fn example() -> Result<(), lt_tailer::TailError> {
//! let mut tailer = FileTailer::run("/var/log/app.log", &TailConfig::default())?;
//!
//! loop {
//!     let (lines, errors) = tailer.receivers();
//!     tokio::select! {
//!         Some(line) = lines.recv() => println!("{line}"),
//!         Some(error) = errors.recv() => {
//!             eprintln!("{error}");
//!             if error.is_fatal() {
//!                 break;
//!             }
//!         }
//!         else => break,
//!     }
//! }
//!
//! tailer.close().await;
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod error;
pub mod handle;
pub mod line_buffer;
pub mod logrotate;
pub mod path;
pub mod tailer;

pub use error::TailError;
pub use handle::{OpenHandle, StartPosition};
pub use line_buffer::LineBuffer;
pub use logrotate::{LogrotateStateMachine, RotationState, Step};
pub use path::WatchedPath;
pub use tailer::{FileTailer, TailerState};
