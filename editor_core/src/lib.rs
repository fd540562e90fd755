//! Codepad Core - text editing engine for a touch code editor.
//!
//! This crate holds document content, snapshot-based undo/redo and debounced
//! syntax highlighting, without any dependency on a windowing or rendering
//! system. Background work runs on two settle loops and reports back to the
//! UI thread through a task queue.

pub mod config;
pub mod content;
pub mod debounce;
pub mod dispatch;
pub mod editor;
pub mod error;
pub mod frame;
pub mod highlight;
pub mod span;
pub mod state;
pub mod syntax;
pub mod undo;

pub use config::{EditorConfig, SettleConfig};
pub use content::{ChangeListeners, ChangeOrigin, ContentChange, ContentStore, Selection};
pub use debounce::{Debouncer, SettleState};
pub use dispatch::{UiHandle, UiQueue};
pub use editor::Editor;
pub use error::{EditorError, HighlightError, Result};
pub use frame::ContentFrame;
pub use highlight::{HighlightScheduler, Highlighter};
pub use span::StyleSpan;
pub use state::{EditorState, STATE_VERSION};
pub use syntax::{Language, SyntaxHighlighter, TokenStyle};
pub use undo::UndoProvider;
