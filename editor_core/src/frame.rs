//! Immutable content snapshots used as undo/redo units.

use crate::content::Selection;
use crate::span::StyleSpan;
use serde::{Deserialize, Serialize};

/// A full copy of the document at one point in time: text, spans and selection.
///
/// Frames are never diffed or patched; equality is exact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentFrame {
    text: String,
    #[serde(default)]
    spans: Vec<StyleSpan>,
    selection_start: usize,
    selection_end: usize,
}

impl ContentFrame {
    /// Creates a frame. The selection is clamped to the text length.
    pub fn new(text: String, spans: Vec<StyleSpan>, selection: Selection) -> Self {
        let selection = selection.clamp(text.chars().count());
        Self {
            text,
            spans,
            selection_start: selection.start,
            selection_end: selection.end,
        }
    }

    /// Creates a frame with no spans.
    pub fn plain(text: impl Into<String>, start: usize, end: usize) -> Self {
        Self::new(text.into(), Vec::new(), Selection::new(start, end))
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn spans(&self) -> &[StyleSpan] {
        &self.spans
    }

    pub fn selection(&self) -> Selection {
        Selection::new(self.selection_start, self.selection_end)
    }
}
