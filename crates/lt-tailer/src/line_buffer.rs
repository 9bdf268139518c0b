//! Splitting a byte stream into lines.

/// Bytes read since the last newline.
///
/// Complete lines are emitted without their `\n` (or `\r\n`) terminator.
/// Invalid UTF-8 is replaced with U+FFFD rather than dropping the line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `bytes` and pushes every completed line onto `out`.
    pub fn push(&mut self, bytes: &[u8], out: &mut Vec<String>) {
        // Only the new bytes can contain a newline.
        let mut search_from = self.pending.len();
        self.pending.extend_from_slice(bytes);

        let mut start = 0;
        while let Some(pos) = self.pending[search_from..].iter().position(|&b| b == b'\n') {
            let end = search_from + pos;
            out.push(decode(&self.pending[start..end]));
            start = end + 1;
            search_from = start;
        }
        self.pending.drain(..start);
    }

    /// Removes and returns the unterminated tail, if any.
    pub fn take_partial(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let line = decode(&self.pending);
        self.pending.clear();
        Some(line)
    }

    /// Discards the unterminated tail.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Returns the number of buffered bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Returns `true` if no partial line is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

fn decode(line: &[u8]) -> String {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    String::from_utf8_lossy(line).into_owned()
}
