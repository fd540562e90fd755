//! The editor facade.
//!
//! Ties one [`ContentStore`] to its undo provider, highlight scheduler and
//! UI task queue. All methods here are meant to be called from the UI
//! thread; background loops only post work back through the queue.
//!
//! Change listeners run after every lock is released, so a listener may
//! call back into the editor.

use crate::config::EditorConfig;
use crate::content::{ChangeListeners, ContentChange, ContentStore, Selection};
use crate::dispatch::{UiHandle, UiQueue};
use crate::error::Result;
use crate::frame::ContentFrame;
use crate::highlight::{HighlightScheduler, Highlighter};
use crate::span::StyleSpan;
use crate::state::EditorState;
use crate::syntax::{Language, SyntaxHighlighter};
use crate::undo::UndoProvider;
use parking_lot::Mutex;
use std::ops::Range;
use std::sync::Arc;
use std::time::Duration;

/// A single editable document with history and highlighting.
///
/// Does not derive Debug because the attached highlighter is a trait object.
pub struct Editor {
    config: EditorConfig,
    content: Arc<Mutex<ContentStore>>,
    listeners: ChangeListeners,
    undo: UndoProvider,
    highlight: HighlightScheduler,
    queue: UiQueue,
    running: bool,
}

impl Default for Editor {
    fn default() -> Self {
        Self::new(EditorConfig::default())
    }
}

impl Editor {
    /// Creates an empty editor. The empty document is the undo baseline.
    pub fn new(config: EditorConfig) -> Self {
        Self::with_text(config, "")
    }

    /// Creates an editor whose baseline is `text`.
    pub fn with_text(config: EditorConfig, text: &str) -> Self {
        let content = Arc::new(Mutex::new(ContentStore::from_str(text)));
        let listeners = ChangeListeners::new();
        let queue = UiQueue::new();
        let undo = UndoProvider::new(&config, content.clone(), listeners.clone());
        let highlight =
            HighlightScheduler::new(&config, content.clone(), queue.handle(), listeners.clone());
        undo.reset();

        Self {
            config,
            content,
            listeners,
            undo,
            highlight,
            queue,
            running: false,
        }
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    /// Starts both background loops.
    pub fn start(&mut self) -> Result<()> {
        if self.running {
            return Ok(());
        }
        self.undo.start()?;
        if let Err(e) = self.highlight.start() {
            self.undo.stop();
            return Err(e.into());
        }
        self.running = true;
        log::info!("Editor started");
        Ok(())
    }

    /// Stops both loops and waits for them to exit. Idempotent.
    pub fn shutdown(&mut self) {
        if !self.running {
            return;
        }
        self.undo.stop();
        self.highlight.stop();
        self.running = false;
        log::info!("Editor stopped");
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn text(&self) -> String {
        self.content.lock().text()
    }

    pub fn selection(&self) -> Selection {
        self.content.lock().selection()
    }

    pub fn spans(&self) -> Vec<StyleSpan> {
        self.content.lock().spans().to_vec()
    }

    pub fn revision(&self) -> u64 {
        self.content.lock().revision()
    }

    pub fn len_chars(&self) -> usize {
        self.content.lock().len_chars()
    }

    /// Registers a listener called after every content change. The content
    /// lock is not held during the call.
    pub fn subscribe(&self, listener: impl Fn(&ContentChange) + Send + Sync + 'static) {
        self.listeners.subscribe(listener);
    }

    /// Replaces the selection with `text`, leaving the caret after it.
    pub fn type_text(&self, text: &str) -> ContentChange {
        self.edit(|content| content.type_text(text))
    }

    pub fn insert(&self, at: usize, text: &str) -> ContentChange {
        self.edit(|content| content.insert(at, text))
    }

    pub fn delete(&self, range: Range<usize>) -> ContentChange {
        self.edit(|content| content.delete(range))
    }

    pub fn replace(&self, range: Range<usize>, text: &str) -> ContentChange {
        self.edit(|content| content.replace(range, text))
    }

    /// Deletes the selection, or `count` chars before the caret.
    pub fn backspace(&self, count: usize) -> ContentChange {
        self.edit(|content| content.backspace(count))
    }

    /// Replaces the whole text. This is an edit like any other and can be undone.
    pub fn set_text(&self, text: &str) -> ContentChange {
        self.edit(|content| content.set_text(text))
    }

    /// Moves the selection. Selection changes alone are not checkpointed.
    pub fn set_selection(&self, start: usize, end: usize) -> ContentChange {
        self.edit(|content| content.set_selection(start, end))
    }

    fn edit(&self, f: impl FnOnce(&mut ContentStore) -> ContentChange) -> ContentChange {
        let change = self.undo.edit(f);
        if change.is_user_edit() {
            self.highlight.bump();
        }
        self.listeners.notify(&change);
        change
    }

    /// Steps back up to `count` checkpoints. Returns true if the text changed.
    pub fn undo(&self, count: usize) -> bool {
        let changed = self.undo.undo(count);
        if changed {
            self.highlight.bump();
        }
        changed
    }

    /// Steps forward up to `count` checkpoints. Returns true if the text changed.
    pub fn redo(&self, count: usize) -> bool {
        let changed = self.undo.redo(count);
        if changed {
            self.highlight.bump();
        }
        changed
    }

    pub fn can_undo(&self) -> bool {
        self.undo.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.undo.can_redo()
    }

    pub fn undo_depth(&self) -> usize {
        self.undo.undo_depth()
    }

    pub fn redo_depth(&self) -> usize {
        self.undo.redo_depth()
    }

    /// True once the latest edit burst has been checkpointed.
    pub fn is_undo_settled(&self) -> bool {
        self.undo.is_settled()
    }

    /// Attaches a highlighter and schedules a pass.
    pub fn set_highlighter(&self, highlighter: impl Highlighter + 'static) {
        self.highlight.set_highlighter(highlighter);
    }

    pub fn clear_highlighter(&self) {
        self.highlight.clear_highlighter();
    }

    pub fn has_highlighter(&self) -> bool {
        self.highlight.has_highlighter()
    }

    /// Attaches the built-in tree-sitter highlighter for `language`.
    pub fn set_language(&self, language: Language) {
        log::info!("Highlighting as {}", language.name());
        self.set_highlighter(SyntaxHighlighter::for_language(language));
    }

    pub fn set_highlighting_enabled(&self, enabled: bool) {
        self.highlight.set_enabled(enabled);
    }

    pub fn is_highlighting_enabled(&self) -> bool {
        self.highlight.is_enabled()
    }

    /// True if no highlight pass is pending.
    pub fn is_highlight_settled(&self) -> bool {
        self.highlight.is_settled()
    }

    /// Runs the tasks background loops have posted so far.
    pub fn run_ui_tasks(&self) -> usize {
        self.queue.run_pending()
    }

    /// Runs posted tasks, waiting up to `timeout` for the first one.
    pub fn run_ui_tasks_within(&self, timeout: Duration) -> usize {
        self.queue.run_within(timeout)
    }

    /// Handle for posting work to this editor's UI queue.
    pub fn ui_handle(&self) -> UiHandle {
        self.queue.handle()
    }

    /// Captures the content and full history. A pending burst is
    /// checkpointed first so it survives as an undo step.
    pub fn save_state(&self) -> EditorState {
        self.undo.settle();
        let current = self.content.lock().snapshot();
        EditorState::new(current, self.undo.undo_frames(), self.undo.redo_frames())
    }

    /// Replaces content and history with a saved state.
    pub fn restore_state(&self, state: EditorState) {
        let EditorState {
            current,
            undo_stack,
            redo_stack,
            ..
        } = state;
        let change = self.content.lock().apply_frame(&current);
        self.undo.restore(undo_stack, redo_stack);
        self.highlight.bump();
        self.listeners.notify(&change);
        log::info!(
            "Restored editor state ({} undo, {} redo frames)",
            self.undo.undo_depth(),
            self.undo.redo_depth()
        );
    }

    /// Current content as a frame.
    pub fn snapshot(&self) -> ContentFrame {
        self.content.lock().snapshot()
    }
}

impl Drop for Editor {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HighlightError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn fast() -> EditorConfig {
        EditorConfig::default().with_timing(ms(40), ms(5))
    }

    fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            std::thread::sleep(ms(5));
        }
        cond()
    }

    fn settle(editor: &Editor) {
        assert!(wait_until(ms(2000), || editor.is_undo_settled()));
    }

    #[test]
    fn test_bursts_become_checkpoints() {
        let mut editor = Editor::new(fast());
        editor.start().unwrap();

        editor.type_text("a");
        settle(&editor);
        editor.type_text("b");
        settle(&editor);

        assert_eq!(editor.undo_depth(), 3);
        assert!(editor.undo(1));
        assert_eq!(editor.text(), "a");
        assert!(editor.undo(1));
        assert_eq!(editor.text(), "");
        assert!(!editor.undo(1));
        assert!(!editor.can_undo());

        assert!(editor.redo(2));
        assert_eq!(editor.text(), "ab");
        editor.shutdown();
    }

    #[test]
    fn test_undo_before_settle_reverts_burst() {
        // Loops not started: the burst is only stored by the forced settle.
        let editor = Editor::with_text(EditorConfig::default(), "x");
        editor.type_text("yz");
        assert!(editor.can_undo());

        assert!(editor.undo(1));
        assert_eq!(editor.text(), "x");
        assert!(editor.redo(1));
        assert_eq!(editor.text(), "yzx");
    }

    #[test]
    fn test_edit_clears_redo() {
        let editor = Editor::new(EditorConfig::default());
        editor.type_text("one");
        editor.undo(1);
        assert!(editor.can_redo());

        editor.type_text("two");
        assert!(!editor.can_redo());
        assert_eq!(editor.redo_depth(), 0);
    }

    #[test]
    fn test_selection_change_is_not_an_edit() {
        let editor = Editor::with_text(EditorConfig::default(), "hello");
        editor.set_selection(1, 3);
        assert!(!editor.can_undo());
        assert_eq!(editor.selection(), Selection::new(1, 3));

        editor.type_text("E");
        assert_eq!(editor.text(), "hElo");
        editor.undo(1);
        assert_eq!(editor.text(), "hello");
    }

    #[test]
    fn test_highlight_applied_through_ui_queue() {
        let mut editor = Editor::new(fast());
        editor.start().unwrap();
        editor.set_highlighter(|text: &str| -> std::result::Result<Vec<StyleSpan>, HighlightError> {
            Ok(vec![StyleSpan::highlight(0, text.chars().count(), "word")])
        });
        editor.type_text("hello");

        assert!(wait_until(ms(2000), || {
            editor.run_ui_tasks();
            editor.spans() == vec![StyleSpan::highlight(0, 5, "word")]
        }));
        editor.shutdown();
    }

    #[test]
    fn test_failing_highlighter_keeps_editor_usable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut editor = Editor::new(fast());
        editor.start().unwrap();
        {
            let calls = calls.clone();
            editor.set_highlighter(
                move |_: &str| -> std::result::Result<Vec<StyleSpan>, HighlightError> {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err(HighlightError::new("grammar exploded"))
                },
            );
        }
        editor.type_text("abc");
        assert!(wait_until(ms(2000), || calls.load(Ordering::SeqCst) >= 1));

        editor.type_text("d");
        assert!(wait_until(ms(2000), || calls.load(Ordering::SeqCst) >= 2));
        editor.run_ui_tasks();
        assert_eq!(editor.text(), "abcd");
        assert!(editor.spans().is_empty());
        editor.shutdown();
    }

    #[test]
    fn test_rust_language_highlighting() {
        let mut editor = Editor::with_text(fast(), "fn main() {}");
        editor.start().unwrap();
        editor.set_language(Language::Rust);

        assert!(wait_until(ms(2000), || {
            editor.run_ui_tasks();
            editor.spans().iter().any(|s| s.style == "keyword")
        }));
        editor.shutdown();
    }

    #[test]
    fn test_save_and_restore_state() {
        let editor = Editor::new(EditorConfig::default());
        editor.type_text("first");
        editor.undo(1);
        editor.redo(1);
        editor.undo(1);
        editor.type_text("second");
        editor.set_selection(0, 3);
        let state = editor.save_state();

        let restored = Editor::new(EditorConfig::default());
        restored.restore_state(state.clone());
        assert_eq!(restored.text(), "second");
        assert_eq!(restored.selection(), Selection::new(0, 3));
        assert_eq!(restored.undo_depth(), state.undo_stack.len());
        assert_eq!(restored.save_state(), state);

        assert!(restored.undo(5));
        assert_eq!(restored.text(), "");
    }

    #[test]
    fn test_listeners_see_user_and_internal_changes() {
        let edits = Arc::new(AtomicUsize::new(0));
        let total = Arc::new(AtomicUsize::new(0));
        let editor = Editor::new(EditorConfig::default());
        {
            let edits = edits.clone();
            let total = total.clone();
            editor.subscribe(move |change| {
                total.fetch_add(1, Ordering::SeqCst);
                if change.is_user_edit() {
                    edits.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        editor.type_text("a");
        editor.undo(1);

        assert_eq!(edits.load(Ordering::SeqCst), 1);
        assert_eq!(total.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_listener_may_read_editor() {
        let editor = Arc::new(Editor::new(EditorConfig::default()));
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let weak = Arc::downgrade(&editor);
            let seen = seen.clone();
            editor.subscribe(move |_| {
                if let Some(editor) = weak.upgrade() {
                    let _ = editor.selection();
                    let _ = editor.can_undo();
                    seen.lock().push(editor.text());
                }
            });
        }

        let (done_tx, done_rx) = crossbeam_channel::bounded(1);
        let worker = {
            let editor = editor.clone();
            std::thread::spawn(move || {
                editor.type_text("ab");
                editor.undo(1);
                editor.redo(1);
                let state = editor.save_state();
                editor.restore_state(state);
                let _ = done_tx.send(());
            })
        };

        assert!(done_rx.recv_timeout(Duration::from_secs(3)).is_ok(), "listener deadlocked");
        worker.join().unwrap();
        assert_eq!(*seen.lock(), vec!["ab", "", "ab", "ab"]);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut editor = Editor::new(fast());
        editor.start().unwrap();
        assert!(editor.is_running());
        editor.shutdown();
        editor.shutdown();
        assert!(!editor.is_running());
    }
}
