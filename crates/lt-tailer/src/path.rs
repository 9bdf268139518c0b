//! The tracked log file path, split into the directory that gets watched
//! and the file name events are matched against.

use camino::{Utf8Path, Utf8PathBuf};
use lt_core::ConfigError;
use lt_watcher::WatchError;

use crate::error::TailError;

/// A log file path as a canonical directory plus a base file name.
///
/// The directory is canonicalized so it matches the paths the watcher
/// backends report. The file itself does not have to exist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchedPath {
    dir: Utf8PathBuf,
    file_name: String,
    path: Utf8PathBuf,
}

impl WatchedPath {
    /// Splits `path` into its directory and file name.
    ///
    /// A relative path is resolved against the current directory.
    ///
    /// # Errors
    ///
    /// Returns [`TailError::Config`] if `path` has no file name, or
    /// [`TailError::Watch`] if the directory does not exist.
    pub fn new(path: &Utf8Path) -> Result<Self, TailError> {
        let file_name = path
            .file_name()
            .ok_or_else(|| ConfigError::invalid_path(path, "path does not name a file"))?
            .to_owned();

        let parent = match path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        };
        let dir = parent.canonicalize_utf8().map_err(|e| {
            let source = if e.kind() == std::io::ErrorKind::NotFound {
                WatchError::path_not_found(parent)
            } else {
                WatchError::Io(e)
            };
            TailError::Watch {
                path: parent.to_owned(),
                source,
            }
        })?;

        let path = dir.join(&file_name);
        Ok(Self {
            dir,
            file_name,
            path,
        })
    }

    /// Returns the watched directory.
    #[must_use]
    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Returns the base file name.
    #[must_use]
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Returns the full path of the log file.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns `true` if `path` names the tracked file.
    ///
    /// Only the file name is compared; events come from the watched
    /// directory alone.
    #[must_use]
    pub fn matches(&self, path: &Utf8Path) -> bool {
        path.file_name() == Some(self.file_name.as_str())
    }
}

impl std::fmt::Display for WatchedPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.path, f)
    }
}
