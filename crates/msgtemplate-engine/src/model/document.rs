//! Immutable document snapshots and a minimal editable document
//!
//! The engine never mutates text. Hosts hand it `DocumentSnapshot`s, which
//! share their text through an `Arc` so they are cheap to clone across
//! threads. `Document` is the small editable wrapper used by the CLI and
//! tests to produce successive snapshots together with their changes.

use super::edit::TextChange;
use msgtemplate_core::SnapshotVersion;
use std::ops::Range;
use std::sync::Arc;

/// An immutable view of a document at one version
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    version: SnapshotVersion,
    text: Arc<str>,
    /// Byte offset of the first character of each line
    line_starts: Arc<[usize]>,
}

impl DocumentSnapshot {
    pub fn new(version: SnapshotVersion, text: impl Into<Arc<str>>) -> Self {
        let text: Arc<str> = text.into();
        let line_starts = compute_line_starts(&text);
        Self {
            version,
            text,
            line_starts,
        }
    }

    /// Create an initial snapshot from text (mainly for tests)
    pub fn from_text(text: &str) -> Self {
        Self::new(SnapshotVersion::INITIAL, text)
    }

    pub fn version(&self) -> SnapshotVersion {
        self.version
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Number of lines (an empty document has one empty line)
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Line containing a byte offset (offsets past the end map to the last line)
    pub fn line_of_offset(&self, offset: usize) -> usize {
        let offset = offset.min(self.text.len());
        match self.line_starts.binary_search(&offset) {
            Ok(line) => line,
            Err(next) => next.saturating_sub(1),
        }
    }

    /// Byte offset of the start of a line
    pub fn line_start(&self, line: usize) -> usize {
        self.line_starts
            .get(line)
            .copied()
            .unwrap_or(self.text.len())
    }

    /// Byte range of a line including its line break
    pub fn line_extent(&self, line: usize) -> Range<usize> {
        let start = self.line_start(line);
        let end = self
            .line_starts
            .get(line.saturating_add(1))
            .copied()
            .unwrap_or(self.text.len());
        start..end
    }

    /// Byte range of a line excluding its line break
    pub fn line_range(&self, line: usize) -> Range<usize> {
        let extent = self.line_extent(line);
        let bytes = self.text.as_bytes();
        let mut end = extent.end;
        if end > extent.start && bytes[end - 1] == b'\n' {
            end -= 1;
        }
        if end > extent.start && bytes[end - 1] == b'\r' {
            end -= 1;
        }
        extent.start..end
    }

    /// Text of a line without its line break ("" past the end)
    pub fn line_text(&self, line: usize) -> &str {
        if line >= self.line_count() {
            return "";
        }
        self.text.get(self.line_range(line)).unwrap_or("")
    }

    /// Range covering whole lines `first..=last`, excluding the final line break
    pub fn lines_range(&self, first: usize, last: usize) -> Range<usize> {
        let last = last.min(self.line_count().saturating_sub(1));
        self.line_start(first).min(self.text.len())..self.line_range(last).end
    }

    /// Extend a byte range to full line boundaries
    pub fn extend_to_lines(&self, range: &Range<usize>) -> Range<usize> {
        let first = self.line_of_offset(range.start);
        let last = self.line_of_offset(range.end);
        self.lines_range(first, last)
    }

    /// Text of a byte range, or `None` if the range is out of bounds or splits a character
    pub fn slice(&self, range: Range<usize>) -> Option<&str> {
        self.text.get(range)
    }
}

fn compute_line_starts(text: &str) -> Arc<[usize]> {
    std::iter::once(0)
        .chain(
            text.bytes()
                .enumerate()
                .filter(|(_, b)| *b == b'\n')
                .map(|(i, _)| i + 1),
        )
        .collect()
}

/// An editable document producing versioned snapshots
#[derive(Debug, Clone)]
pub struct Document {
    snapshot: DocumentSnapshot,
}

impl Document {
    pub fn new(text: &str) -> Self {
        Self {
            snapshot: DocumentSnapshot::from_text(text),
        }
    }

    /// Current snapshot
    pub fn snapshot(&self) -> &DocumentSnapshot {
        &self.snapshot
    }

    /// Replace a byte range with new text, returning the new snapshot and the change
    ///
    /// The range is clamped to the document and to character boundaries.
    pub fn replace(&mut self, range: Range<usize>, text: &str) -> (DocumentSnapshot, TextChange) {
        let current = self.snapshot.text();
        let mut start = range.start.min(current.len());
        let mut end = range.end.clamp(start, current.len());
        while !current.is_char_boundary(start) {
            start -= 1;
        }
        while !current.is_char_boundary(end) {
            end += 1;
        }

        let mut new_text = String::with_capacity(current.len() + text.len());
        new_text.push_str(&current[..start]);
        new_text.push_str(text);
        new_text.push_str(&current[end..]);

        let version = self.snapshot.version().next();
        self.snapshot = DocumentSnapshot::new(version, new_text);
        (
            self.snapshot.clone(),
            TextChange::replace(start..end, text.len()),
        )
    }

    pub fn insert(&mut self, offset: usize, text: &str) -> (DocumentSnapshot, TextChange) {
        self.replace(offset..offset, text)
    }

    pub fn delete(&mut self, range: Range<usize>) -> (DocumentSnapshot, TextChange) {
        self.replace(range, "")
    }
}
