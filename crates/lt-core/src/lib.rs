//! Core configuration, errors, and shared types for logtail.
//!
//! This crate provides the foundational types used across the workspace:
//!
//! - Configuration structures for the tailer and its watcher backend
//! - [`ConfigError`] for invalid configuration values
//! - Type aliases for `FxHashMap` used by label maps downstream of the tailer

#![deny(clippy::all)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod hash;

pub use config::{TailConfig, WatchConfig, WatchMode};
pub use error::ConfigError;
pub use hash::{FxHashMap, Labels, fx_hash_map};
