//! File identity that survives renames.
//!
//! On Unix the identity is the device and inode number. Other platforms
//! have no stable identity exposed through the standard library, so every
//! constructor returns `None` there and callers fall back to event-driven
//! detection only.

use std::fs::{File, Metadata};
use std::io;

use camino::Utf8Path;

/// The identity of a file on disk, independent of its current name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileId {
    dev: u64,
    ino: u64,
}

impl FileId {
    /// Creates a `FileId` from raw device and inode values.
    #[must_use]
    pub const fn new(dev: u64, ino: u64) -> Self {
        Self { dev, ino }
    }

    /// Reads the identity from already fetched metadata.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;

        Some(Self::new(metadata.dev(), metadata.ino()))
    }

    /// Reads the identity from already fetched metadata.
    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }

    /// Reads the identity of an open file handle.
    ///
    /// # Errors
    ///
    /// Returns the error from `fstat` on the handle.
    pub fn from_file(file: &File) -> io::Result<Option<Self>> {
        Ok(Self::from_metadata(&file.metadata()?))
    }

    /// Reads the identity of whatever file `path` currently names.
    ///
    /// # Errors
    ///
    /// Returns the error from `stat`, including `NotFound` when nothing
    /// exists at `path`.
    pub fn from_path(path: &Utf8Path) -> io::Result<Option<Self>> {
        Ok(Self::from_metadata(&std::fs::metadata(path)?))
    }
}

impl std::fmt::Display for FileId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.dev, self.ino)
    }
}
