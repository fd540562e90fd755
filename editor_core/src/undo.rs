//! Snapshot-based undo/redo with time-coalesced checkpoints.
//!
//! Edits are not recorded one by one. Every edit bumps a [`Debouncer`]; once
//! the document has been quiet for the store threshold, a full
//! [`ContentFrame`] is pushed onto the undo stack. A burst of keystrokes
//! therefore becomes a single checkpoint.
//!
//! The bottom of the undo stack is the baseline frame and is never popped.
//! Any bump clears the redo stack immediately, even before the burst's
//! checkpoint exists.

use crate::config::EditorConfig;
use crate::content::{ChangeListeners, ContentChange, ContentStore};
use crate::debounce::Debouncer;
use crate::frame::ContentFrame;
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::time::Instant;

/// The twin stacks. The top of each stack is the last element.
#[derive(Debug)]
struct UndoStacks {
    undo: Vec<ContentFrame>,
    redo: Vec<ContentFrame>,
    max_frames: usize,
}

impl UndoStacks {
    fn push_checkpoint(&mut self, frame: ContentFrame) {
        self.undo.push(frame);
        self.enforce_limit();
    }

    /// Drops the oldest frames past the cap; the oldest survivor becomes
    /// the baseline.
    fn enforce_limit(&mut self) {
        if self.undo.len() > self.max_frames {
            let excess = self.undo.len() - self.max_frames;
            self.undo.drain(..excess);
        }
    }
}

/// Undo/redo provider for one editor instance.
pub struct UndoProvider {
    content: Arc<Mutex<ContentStore>>,
    stacks: Arc<Mutex<UndoStacks>>,
    listeners: ChangeListeners,
    debouncer: Debouncer<()>,
}

impl UndoProvider {
    /// Creates a provider observing `content`. The stacks stay empty until
    /// [`UndoProvider::reset`] captures the baseline. Frames applied by undo
    /// and redo are reported to `listeners`.
    pub fn new(
        config: &EditorConfig,
        content: Arc<Mutex<ContentStore>>,
        listeners: ChangeListeners,
    ) -> Self {
        let stacks = Arc::new(Mutex::new(UndoStacks {
            undo: Vec::new(),
            redo: Vec::new(),
            max_frames: config.max_undo_frames.max(1),
        }));

        let debouncer = {
            let content = content.clone();
            let stacks = stacks.clone();
            Debouncer::new(
                "undo",
                config.undo,
                move || {
                    let frame = content.lock().snapshot();
                    let mut stacks = stacks.lock();
                    stacks.push_checkpoint(frame);
                    log::debug!("undo: checkpoint stored (depth {})", stacks.undo.len());
                    Some(())
                },
                |()| {},
            )
        };

        Self {
            content,
            stacks,
            listeners,
            debouncer,
        }
    }

    /// Starts the background checkpoint loop.
    pub fn start(&mut self) -> io::Result<()> {
        self.debouncer.start()
    }

    /// Stops the background checkpoint loop.
    pub fn stop(&mut self) {
        self.debouncer.stop();
    }

    /// Clears both stacks and stores the current content as the baseline.
    pub fn reset(&self) {
        self.debouncer.with_settled(|| {
            let baseline = self.content.lock().snapshot();
            let mut stacks = self.stacks.lock();
            stacks.undo.clear();
            stacks.redo.clear();
            stacks.undo.push(baseline);
        });
    }

    /// Records a user edit that has already been applied. Redo history is
    /// discarded immediately.
    pub fn bump(&self) {
        self.debouncer.bump();
        self.stacks.lock().redo.clear();
    }

    /// Applies `edit` to the content and bumps if it changed the text.
    ///
    /// The edit and its bump happen under the settle lock, so a checkpoint
    /// never captures a keystroke without its bump. A burst that is due
    /// when the edit arrives is stored first, without the edit.
    pub fn edit(&self, edit: impl FnOnce(&mut ContentStore) -> ContentChange) -> ContentChange {
        self.edit_at(Instant::now(), edit)
    }

    fn edit_at(
        &self,
        now: Instant,
        edit: impl FnOnce(&mut ContentStore) -> ContentChange,
    ) -> ContentChange {
        self.debouncer.edit_at(
            now,
            || {
                let change = edit(&mut self.content.lock());
                if change.is_user_edit() {
                    self.stacks.lock().redo.clear();
                }
                change
            },
            ContentChange::is_user_edit,
        )
    }

    /// Steps back up to `count` checkpoints. An unsettled burst is stored
    /// first so it can be redone. Returns true if the content changed.
    ///
    /// Must be called from the UI thread; the restored frame is applied
    /// to the content store directly.
    pub fn undo(&self, count: usize) -> bool {
        let mut changes = Vec::new();
        for _ in 0..count {
            self.debouncer.settle_now();

            let mut stacks = self.stacks.lock();
            if stacks.undo.len() <= 1 {
                break;
            }
            let Some(top) = stacks.undo.pop() else {
                break;
            };
            stacks.redo.push(top);
            if let Some(frame) = stacks.undo.last() {
                changes.push(self.content.lock().apply_frame(frame));
            }
        }
        self.listeners.notify_all(&changes);
        !changes.is_empty()
    }

    /// Steps forward up to `count` checkpoints. Returns true if the content
    /// changed. Must be called from the UI thread.
    pub fn redo(&self, count: usize) -> bool {
        let mut changes = Vec::new();
        for _ in 0..count {
            let mut stacks = self.stacks.lock();
            let Some(frame) = stacks.redo.pop() else {
                break;
            };
            changes.push(self.content.lock().apply_frame(&frame));
            stacks.push_checkpoint(frame);
        }
        self.listeners.notify_all(&changes);
        !changes.is_empty()
    }

    /// Returns true if [`UndoProvider::undo`] would change the content.
    pub fn can_undo(&self) -> bool {
        self.stacks.lock().undo.len() > 1 || !self.debouncer.is_settled()
    }

    pub fn can_redo(&self) -> bool {
        !self.stacks.lock().redo.is_empty()
    }

    /// Number of frames on the undo stack, baseline included.
    pub fn undo_depth(&self) -> usize {
        self.stacks.lock().undo.len()
    }

    pub fn redo_depth(&self) -> usize {
        self.stacks.lock().redo.len()
    }

    /// Stores the pending burst's checkpoint now, if there is one.
    pub fn settle(&self) {
        self.debouncer.settle_now();
    }

    /// True once the latest burst has its checkpoint.
    pub fn is_settled(&self) -> bool {
        self.debouncer.is_settled()
    }

    /// Undo frames, most recent first.
    pub fn undo_frames(&self) -> Vec<ContentFrame> {
        self.stacks.lock().undo.iter().rev().cloned().collect()
    }

    /// Redo frames, most recent first.
    pub fn redo_frames(&self) -> Vec<ContentFrame> {
        self.stacks.lock().redo.iter().rev().cloned().collect()
    }

    /// Replaces both stacks with restored history (most recent first).
    /// An empty undo list falls back to a baseline of the current content.
    pub fn restore(&self, undo: Vec<ContentFrame>, redo: Vec<ContentFrame>) {
        self.debouncer.with_settled(|| {
            let mut stacks = self.stacks.lock();
            stacks.undo = undo.into_iter().rev().collect();
            stacks.redo = redo.into_iter().rev().collect();
            if stacks.undo.is_empty() {
                stacks.undo.push(self.content.lock().snapshot());
            }
            stacks.enforce_limit();
        });
    }

    #[cfg(test)]
    pub(crate) fn poll_at(&self, now: std::time::Instant) -> bool {
        self.debouncer.poll_at(now)
    }
}
