//! Groups line-protocol lines into write payloads.

use bytes::Bytes;

/// One payload ready to be forwarded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    pub payload: Bytes,
    pub lines: usize,
}

/// Accumulates lines until `max_lines` is reached
#[derive(Debug)]
pub struct LineBatcher {
    buf: String,
    lines: usize,
    max_lines: usize,
}

impl LineBatcher {
    pub fn new(max_lines: usize) -> Self {
        Self {
            buf: String::new(),
            lines: 0,
            max_lines: max_lines.max(1),
        }
    }

    /// Add a line; returns a full batch when one is ready
    ///
    /// Blank lines and `#` comments are skipped.
    pub fn push(&mut self, line: &str) -> Option<Batch> {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            return None;
        }

        self.buf.push_str(line);
        self.buf.push('\n');
        self.lines += 1;

        if self.lines >= self.max_lines {
            self.flush()
        } else {
            None
        }
    }

    /// Take whatever is buffered
    pub fn flush(&mut self) -> Option<Batch> {
        if self.lines == 0 {
            return None;
        }
        let batch = Batch {
            payload: Bytes::from(std::mem::take(&mut self.buf)),
            lines: self.lines,
        };
        self.lines = 0;
        Some(batch)
    }
}
