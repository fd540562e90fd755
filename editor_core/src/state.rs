//! Editor state persistence.
//!
//! Saves and restores the current content plus the full undo/redo history as
//! JSON, so a suspended editor comes back with its history intact.
//!
//! Decoding is tolerant per frame: a frame whose span list is malformed keeps
//! its text and selection and loses only its spans. Anything else that is
//! wrong (bad JSON, missing text or an unknown version) fails the whole restore.

use crate::content::Selection;
use crate::error::{EditorError, Result};
use crate::frame::ContentFrame;
use crate::span::StyleSpan;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::Path;

pub const STATE_VERSION: u32 = 1;

/// Everything needed to rebuild an editor after suspension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EditorState {
    pub version: u32,
    /// Content at save time.
    pub current: ContentFrame,
    /// Undo frames, most recent first. The last entry is the baseline.
    pub undo_stack: Vec<ContentFrame>,
    /// Redo frames, most recent first.
    pub redo_stack: Vec<ContentFrame>,
}

/// Frame as read from disk, before span validation.
#[derive(Deserialize)]
struct RawFrame {
    text: String,
    #[serde(default)]
    spans: Value,
    #[serde(default)]
    selection_start: usize,
    #[serde(default)]
    selection_end: usize,
}

#[derive(Deserialize)]
struct RawState {
    version: u32,
    current: RawFrame,
    #[serde(default)]
    undo_stack: Vec<RawFrame>,
    #[serde(default)]
    redo_stack: Vec<RawFrame>,
}

impl RawFrame {
    fn into_frame(self, label: &str) -> ContentFrame {
        let len = self.text.chars().count();
        let spans = match decode_spans(self.spans, len) {
            Ok(spans) => spans,
            Err(reason) => {
                log::warn!("Dropping spans of {label}: {reason}");
                Vec::new()
            }
        };
        let selection = Selection::new(self.selection_start, self.selection_end);
        ContentFrame::new(self.text, spans, selection)
    }
}

/// Decodes and validates one frame's spans against its text length.
fn decode_spans(value: Value, len_chars: usize) -> std::result::Result<Vec<StyleSpan>, String> {
    if value.is_null() {
        return Ok(Vec::new());
    }
    let spans: Vec<StyleSpan> = serde_json::from_value(value).map_err(|e| e.to_string())?;
    match spans.iter().find(|span| !span.fits(len_chars)) {
        Some(bad) => Err(format!(
            "span {}..{} out of bounds for {} chars",
            bad.start, bad.end, len_chars
        )),
        None => Ok(spans),
    }
}

impl EditorState {
    /// Creates a state at the current format version.
    pub fn new(
        current: ContentFrame,
        undo_stack: Vec<ContentFrame>,
        redo_stack: Vec<ContentFrame>,
    ) -> Self {
        Self {
            version: STATE_VERSION,
            current,
            undo_stack,
            redo_stack,
        }
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parses JSON produced by [`EditorState::to_json`].
    pub fn from_json(data: &str) -> Result<Self> {
        let raw: RawState = serde_json::from_str(data)?;
        if raw.version != STATE_VERSION {
            return Err(EditorError::UnsupportedVersion {
                found: raw.version,
                expected: STATE_VERSION,
            });
        }
        if raw.undo_stack.is_empty() {
            return Err(EditorError::InvalidState("undo stack has no baseline".into()));
        }

        let current = raw.current.into_frame("current frame");
        let undo_stack = raw
            .undo_stack
            .into_iter()
            .enumerate()
            .map(|(i, frame)| frame.into_frame(&format!("undo frame {i}")))
            .collect();
        let redo_stack = raw
            .redo_stack
            .into_iter()
            .enumerate()
            .map(|(i, frame)| frame.into_frame(&format!("redo frame {i}")))
            .collect();

        Ok(Self::new(current, undo_stack, redo_stack))
    }

    /// Writes the state to `path`, creating parent directories.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() {
                fs::create_dir_all(dir)?;
            }
        }
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Reads the state from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        Self::from_json(&data)
    }
}
