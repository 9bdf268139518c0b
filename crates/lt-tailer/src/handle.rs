//! The open log file and its read cursor.

use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};

use camino::{Utf8Path, Utf8PathBuf};
use lt_watcher::FileId;

/// Where a freshly opened handle starts reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPosition {
    /// Deliver the existing content.
    Beginning,
    /// Skip the existing content and wait for appends.
    End,
}

/// Exclusive owner of one OS file handle plus the offset read so far.
///
/// The handle stays attached to the file it opened, even after that file
/// is renamed or unlinked, so content written before a rotation can still
/// be drained.
#[derive(Debug)]
pub struct OpenHandle {
    file: File,
    path: Utf8PathBuf,
    offset: u64,
    id: Option<FileId>,
}

impl OpenHandle {
    /// Opens `path` for reading.
    ///
    /// # Errors
    ///
    /// Returns the error from opening, stating or seeking the file.
    pub fn open(path: &Utf8Path, start: StartPosition) -> io::Result<Self> {
        let mut file = File::open(path)?;
        let id = FileId::from_file(&file)?;
        let offset = match start {
            StartPosition::Beginning => 0,
            StartPosition::End => file.seek(SeekFrom::End(0))?,
        };
        Ok(Self {
            file,
            path: path.to_owned(),
            offset,
            id,
        })
    }

    /// Rewinds to the start if the file is now shorter than the offset.
    ///
    /// Returns `true` if a truncation was detected.
    ///
    /// # Errors
    ///
    /// Returns the error from `fstat` or `seek`.
    pub fn rewind_if_truncated(&mut self) -> io::Result<bool> {
        let size = self.file.metadata()?.len();
        if size >= self.offset {
            return Ok(false);
        }
        tracing::debug!(
            path = %self.path,
            offset = self.offset,
            size,
            "File shrank below read offset, rewinding"
        );
        self.file.seek(SeekFrom::Start(0))?;
        self.offset = 0;
        Ok(true)
    }

    /// Reads at most `buf.len()` bytes at the current offset.
    ///
    /// Returns `0` at end of file.
    ///
    /// # Errors
    ///
    /// Returns any read error other than `Interrupted`.
    pub fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match self.file.read(buf) {
                Ok(n) => {
                    self.offset += n as u64;
                    return Ok(n);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Returns the path this handle was opened from.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Returns the number of bytes consumed so far.
    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    /// Returns the identity of the open file, where the platform has one.
    #[must_use]
    pub const fn id(&self) -> Option<FileId> {
        self.id
    }
}
