//! The content store: document text, selection and style spans.
//!
//! This is the single source of truth the undo and highlight machinery
//! observe. It knows nothing about debouncing; the [`crate::editor::Editor`]
//! facade is responsible for bumping the coalescers after user edits.
//!
//! Mutators return a [`ContentChange`] instead of calling listeners, since
//! they run under the store's lock. Whoever took the lock delivers the
//! change through [`ChangeListeners`] once every lock is released.

use crate::frame::ContentFrame;
use crate::span::{remap_offset, StyleSpan};
use parking_lot::Mutex;
use ropey::Rope;
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::sync::Arc;

/// A normalized selection range in char offsets. `start <= end` always holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Selection {
    pub start: usize,
    pub end: usize,
}

impl Selection {
    /// Creates a selection, swapping the bounds if they are out of order.
    pub fn new(a: usize, b: usize) -> Self {
        Self {
            start: a.min(b),
            end: a.max(b),
        }
    }

    /// Creates an empty selection (a caret) at `pos`.
    pub fn caret(pos: usize) -> Self {
        Self::new(pos, pos)
    }

    /// Returns true if nothing is selected.
    pub fn is_caret(&self) -> bool {
        self.start == self.end
    }

    /// Returns the selection as a range.
    pub fn range(&self) -> Range<usize> {
        self.start..self.end
    }

    /// Clamps both bounds to `len`.
    pub fn clamp(self, len: usize) -> Self {
        Self::new(self.start.min(len), self.end.min(len))
    }
}

/// Where a change to the store came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOrigin {
    /// A user edit coming from the UI shell.
    User,
    /// Restoring a snapshot or applying highlighter output.
    Internal,
}

/// Description of one change to the store, delivered to listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentChange {
    pub origin: ChangeOrigin,
    /// False for selection-only or style-only changes.
    pub text_changed: bool,
    /// Store revision after the change.
    pub revision: u64,
}

impl ContentChange {
    /// Returns true if this change should bump the undo/highlight coalescers.
    pub fn is_user_edit(&self) -> bool {
        self.origin == ChangeOrigin::User && self.text_changed
    }
}

type Listener = Arc<dyn Fn(&ContentChange) + Send + Sync>;

/// Shared registry of change listeners.
///
/// Listeners may read the editor freely: [`ChangeListeners::notify`] is only
/// called with no content, stack or settle lock held.
#[derive(Clone, Default)]
pub struct ChangeListeners {
    inner: Arc<Mutex<Vec<Listener>>>,
}

impl ChangeListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener called after every change.
    pub fn subscribe(&self, listener: impl Fn(&ContentChange) + Send + Sync + 'static) {
        self.inner.lock().push(Arc::new(listener));
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Calls every listener with `change`. The registry lock is not held
    /// while listeners run, so a listener may subscribe another.
    pub fn notify(&self, change: &ContentChange) {
        let listeners = self.inner.lock().clone();
        for listener in &listeners {
            listener(change);
        }
    }

    /// Delivers `changes` in order.
    pub fn notify_all(&self, changes: &[ContentChange]) {
        for change in changes {
            self.notify(change);
        }
    }
}

impl std::fmt::Debug for ChangeListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeListeners")
            .field("len", &self.len())
            .finish()
    }
}

/// Document text, selection and spans.
pub struct ContentStore {
    text: Rope,
    selection: Selection,
    spans: Vec<StyleSpan>,
    revision: u64,
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("len_chars", &self.text.len_chars())
            .field("selection", &self.selection)
            .field("spans", &self.spans.len())
            .field("revision", &self.revision)
            .finish()
    }
}

impl Default for ContentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentStore {
    /// Creates an empty store with the caret at 0.
    pub fn new() -> Self {
        Self {
            text: Rope::new(),
            selection: Selection::default(),
            spans: Vec::new(),
            revision: 0,
        }
    }

    /// Creates a store holding `text` with the caret at the start.
    pub fn from_str(text: &str) -> Self {
        Self {
            text: Rope::from_str(text),
            ..Self::new()
        }
    }

    /// Returns the full text as a string.
    pub fn text(&self) -> String {
        self.text.to_string()
    }

    /// Returns the underlying rope.
    pub fn rope(&self) -> &Rope {
        &self.text
    }

    pub fn len_chars(&self) -> usize {
        self.text.len_chars()
    }

    pub fn is_empty(&self) -> bool {
        self.text.len_chars() == 0
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn spans(&self) -> &[StyleSpan] {
        &self.spans
    }

    /// Monotonic counter bumped on every text change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Replaces `range` with `text` as a user edit. The selection and spans are
    /// remapped across the edit; out-of-range bounds are clamped.
    pub fn replace(&mut self, range: Range<usize>, text: &str) -> ContentChange {
        let text_changed = self.splice(range, text).is_some();
        self.change(ChangeOrigin::User, text_changed)
    }

    /// Inserts `text` at char offset `at`.
    pub fn insert(&mut self, at: usize, text: &str) -> ContentChange {
        self.replace(at..at, text)
    }

    /// Removes the chars in `range`.
    pub fn delete(&mut self, range: Range<usize>) -> ContentChange {
        self.replace(range, "")
    }

    /// Replaces the selection with `text` and leaves the caret after it,
    /// the way a keystroke or paste does.
    pub fn type_text(&mut self, text: &str) -> ContentChange {
        let range = self.selection.range();
        let text_changed = match self.splice(range, text) {
            Some(caret) => {
                self.selection = Selection::caret(caret);
                true
            }
            None => false,
        };
        self.change(ChangeOrigin::User, text_changed)
    }

    /// Deletes the selection, or the `count` chars before the caret.
    pub fn backspace(&mut self, count: usize) -> ContentChange {
        let Selection { start, end } = self.selection;
        let range = if start < end {
            start..end
        } else {
            start.saturating_sub(count)..start
        };
        self.delete(range)
    }

    /// Replaces the whole document, placing the caret at the end.
    pub fn set_text(&mut self, text: &str) -> ContentChange {
        self.text = Rope::from_str(text);
        self.spans.clear();
        self.selection = Selection::caret(self.len_chars());
        self.revision += 1;
        self.change(ChangeOrigin::User, true)
    }

    /// Moves the selection. Bounds are normalized and clamped to the text.
    pub fn set_selection(&mut self, start: usize, end: usize) -> ContentChange {
        self.selection = Selection::new(start, end).clamp(self.len_chars());
        self.change(ChangeOrigin::User, false)
    }

    /// Captures the current state as an immutable frame.
    pub fn snapshot(&self) -> ContentFrame {
        ContentFrame::new(self.text(), self.spans.clone(), self.selection)
    }

    /// Restores a frame as an internal change.
    pub fn apply_frame(&mut self, frame: &ContentFrame) -> ContentChange {
        self.text = Rope::from_str(frame.text());
        let len = self.len_chars();
        self.spans = frame
            .spans()
            .iter()
            .filter(|span| span.fits(len))
            .cloned()
            .collect();
        self.selection = frame.selection().clamp(len);
        self.revision += 1;
        self.change(ChangeOrigin::Internal, true)
    }

    /// Replaces highlight spans with `spans` if the text is still at
    /// `revision`. Non-highlight spans are kept. Returns `None` for stale
    /// results.
    pub fn apply_highlight(
        &mut self,
        revision: u64,
        spans: Vec<StyleSpan>,
    ) -> Option<ContentChange> {
        if revision != self.revision {
            return None;
        }
        let len = self.len_chars();
        self.spans.retain(|span| !span.is_highlight());
        self.spans
            .extend(spans.into_iter().filter(|span| span.fits(len) && !span.is_empty()));
        Some(self.change(ChangeOrigin::Internal, false))
    }

    fn change(&self, origin: ChangeOrigin, text_changed: bool) -> ContentChange {
        ContentChange {
            origin,
            text_changed,
            revision: self.revision,
        }
    }

    /// Applies a replacement without notifying. Returns the char offset just
    /// past the inserted text, or `None` if nothing changed.
    fn splice(&mut self, range: Range<usize>, text: &str) -> Option<usize> {
        let len = self.len_chars();
        let start = range.start.min(len);
        let end = range.end.min(len).max(start);
        let inserted = text.chars().count();
        if start == end && inserted == 0 {
            return None;
        }

        if start < end {
            self.text.remove(start..end);
        }
        if inserted > 0 {
            self.text.insert(start, text);
        }

        self.selection = Selection::new(
            remap_offset(self.selection.start, start, end, inserted, false),
            remap_offset(self.selection.end, start, end, inserted, true),
        );
        self.spans = std::mem::take(&mut self.spans)
            .into_iter()
            .filter_map(|span| span.remap(start, end, inserted))
            .collect();
        self.revision += 1;
        Some(start + inserted)
    }
}
