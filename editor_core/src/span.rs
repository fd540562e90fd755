//! Style spans overlaid on document text.
//!
//! A span is a `(range, flags, style)` annotation. The core never interprets
//! `flags` or `style`; it only keeps them attached to the right characters
//! while text is edited, snapshotted and restored.

use serde::{Deserialize, Serialize};

/// Span grows when text is inserted at its start boundary.
pub const SPAN_INCLUSIVE_START: u32 = 0x01;
/// Span grows when text is inserted at its end boundary.
pub const SPAN_INCLUSIVE_END: u32 = 0x02;
/// Span was produced by a highlight pass and is replaced by the next one.
pub const SPAN_HIGHLIGHT: u32 = 0x100;

/// A styled range of characters.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StyleSpan {
    /// Start char offset (inclusive).
    pub start: usize,
    /// End char offset (exclusive).
    pub end: usize,
    /// Opaque behaviour bits (see the `SPAN_*` constants).
    #[serde(default)]
    pub flags: u32,
    /// Opaque style payload, e.g. a token class name.
    pub style: String,
}

impl StyleSpan {
    /// Creates a new span.
    pub fn new(start: usize, end: usize, flags: u32, style: impl Into<String>) -> Self {
        Self {
            start,
            end,
            flags,
            style: style.into(),
        }
    }

    /// Creates a span tagged as highlighter output.
    pub fn highlight(start: usize, end: usize, style: impl Into<String>) -> Self {
        Self::new(start, end, SPAN_HIGHLIGHT, style)
    }

    /// Returns true if the span covers no characters.
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Returns true if this span came from a highlight pass.
    pub fn is_highlight(&self) -> bool {
        self.flags & SPAN_HIGHLIGHT != 0
    }

    /// Returns true if the span is well formed for a text of `len_chars` characters.
    pub fn fits(&self, len_chars: usize) -> bool {
        self.start <= self.end && self.end <= len_chars
    }

    /// Remaps the span across a replacement of `start..removed_end` by
    /// `inserted` characters. Returns `None` if the span collapsed away.
    pub(crate) fn remap(
        mut self,
        start: usize,
        removed_end: usize,
        inserted: usize,
    ) -> Option<StyleSpan> {
        let inclusive_start = self.flags & SPAN_INCLUSIVE_START != 0;
        let inclusive_end = self.flags & SPAN_INCLUSIVE_END != 0;

        self.start = remap_offset(self.start, start, removed_end, inserted, !inclusive_start);
        self.end = remap_offset(self.end, start, removed_end, inserted, inclusive_end);
        if self.start > self.end {
            self.start = self.end;
        }

        if self.is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// Maps an offset across a replacement of `start..removed_end` with
/// `inserted` characters.
///
/// An offset sitting exactly on an insertion point stays before the
/// inserted text unless `after_insert` is set.
pub(crate) fn remap_offset(
    pos: usize,
    start: usize,
    removed_end: usize,
    inserted: usize,
    after_insert: bool,
) -> usize {
    let removed = removed_end - start;
    if pos < start || (pos == start && !after_insert && removed == 0) {
        pos
    } else if pos >= removed_end && !(pos == start && removed == 0) {
        pos - removed + inserted
    } else if after_insert {
        start + inserted
    } else {
        start
    }
}
