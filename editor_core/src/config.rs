//! Editor configuration.
//!
//! Every field has a default, so a config file only needs to list what it
//! overrides:
//!
//! ```json
//! { "undo": { "threshold_ms": 800 }, "highlighting_enabled": false }
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default quiet period before an undo checkpoint is stored (in milliseconds).
const UNDO_THRESHOLD_MS: u64 = 500;
/// Default quiet period before a highlight pass runs (in milliseconds).
const HIGHLIGHT_THRESHOLD_MS: u64 = 500;
/// Default poll period of both background loops (in milliseconds).
const POLL_MS: u64 = 100;
/// Default maximum number of undo frames kept.
const MAX_UNDO_FRAMES: usize = 1000;

/// Timing of one settle-after-quiet-period loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    /// Quiet time after the last bump before the action fires.
    pub threshold_ms: u64,
    /// How often the background loop checks for a settled burst.
    pub poll_ms: u64,
}

impl SettleConfig {
    pub fn new(threshold: Duration, poll: Duration) -> Self {
        Self {
            threshold_ms: threshold.as_millis() as u64,
            poll_ms: poll.as_millis() as u64,
        }
    }

    pub fn threshold(&self) -> Duration {
        Duration::from_millis(self.threshold_ms)
    }

    /// Poll period, never shorter than one millisecond.
    pub fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_ms.max(1))
    }
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            threshold_ms: UNDO_THRESHOLD_MS,
            poll_ms: POLL_MS,
        }
    }
}

/// Configuration for one editor instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EditorConfig {
    /// Undo checkpoint timing.
    pub undo: SettleConfig,
    /// Highlight pass timing.
    pub highlight: SettleConfig,
    /// Whether highlighting starts enabled.
    pub highlighting_enabled: bool,
    /// Maximum undo stack depth, baseline included.
    pub max_undo_frames: usize,
}

impl Default for EditorConfig {
    fn default() -> Self {
        Self {
            undo: SettleConfig::default(),
            highlight: SettleConfig {
                threshold_ms: HIGHLIGHT_THRESHOLD_MS,
                poll_ms: POLL_MS,
            },
            highlighting_enabled: true,
            max_undo_frames: MAX_UNDO_FRAMES,
        }
    }
}

impl EditorConfig {
    /// Loads a config from a JSON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = fs::read(path.as_ref())?;
        Self::from_json(&data)
    }

    /// Parses a config from JSON bytes.
    pub fn from_json(data: &[u8]) -> Result<Self> {
        let config: EditorConfig = serde_json::from_slice(data)?;
        Ok(config.sanitized())
    }

    /// Sets both loops to the same timing. Mostly useful in tests.
    pub fn with_timing(mut self, threshold: Duration, poll: Duration) -> Self {
        self.undo = SettleConfig::new(threshold, poll);
        self.highlight = SettleConfig::new(threshold, poll);
        self
    }

    fn sanitized(mut self) -> Self {
        if self.max_undo_frames == 0 {
            log::warn!("max_undo_frames must be at least 1, using 1");
            self.max_undo_frames = 1;
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EditorConfig::default();
        assert_eq!(config.undo.threshold(), Duration::from_millis(500));
        assert_eq!(config.undo.poll_period(), Duration::from_millis(100));
        assert_eq!(config.highlight.threshold(), Duration::from_millis(500));
        assert!(config.highlighting_enabled);
        assert_eq!(config.max_undo_frames, 1000);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config =
            EditorConfig::from_json(br#"{"undo": {"threshold_ms": 800}, "highlighting_enabled": false}"#)
                .unwrap();
        assert_eq!(config.undo.threshold_ms, 800);
        assert_eq!(config.undo.poll_ms, 100);
        assert_eq!(config.highlight, EditorConfig::default().highlight);
        assert!(!config.highlighting_enabled);
    }

    #[test]
    fn test_zero_max_frames_sanitized() {
        let config = EditorConfig::from_json(br#"{"max_undo_frames": 0}"#).unwrap();
        assert_eq!(config.max_undo_frames, 1);
    }

    #[test]
    fn test_zero_poll_clamped() {
        let timing = SettleConfig {
            threshold_ms: 10,
            poll_ms: 0,
        };
        assert_eq!(timing.poll_period(), Duration::from_millis(1));
    }

    #[test]
    fn test_invalid_json_is_error() {
        assert!(EditorConfig::from_json(b"{").is_err());
    }
}
