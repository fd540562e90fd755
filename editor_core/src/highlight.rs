//! Debounced highlight scheduling.
//!
//! The scheduler owns only the timing policy. What a pass produces is up to
//! the attached [`Highlighter`]; the resulting spans are posted to the UI
//! thread and applied only if the text has not changed in the meantime.
//! Listeners hear about an applied result once the content lock is released.

use crate::config::EditorConfig;
use crate::content::{ChangeListeners, ContentStore};
use crate::debounce::Debouncer;
use crate::dispatch::UiHandle;
use crate::error::HighlightError;
use crate::span::StyleSpan;
use parking_lot::Mutex;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Produces style spans for a full document text.
pub trait Highlighter: Send {
    fn highlight(&mut self, text: &str) -> Result<Vec<StyleSpan>, HighlightError>;
}

impl<F> Highlighter for F
where
    F: FnMut(&str) -> Result<Vec<StyleSpan>, HighlightError> + Send,
{
    fn highlight(&mut self, text: &str) -> Result<Vec<StyleSpan>, HighlightError> {
        self(text)
    }
}

/// Holds the attached highlighter. While a pass runs the highlighter is taken
/// out of the slot so attaching a new one never waits for the pass.
#[derive(Default)]
struct HighlighterSlot {
    current: Option<Box<dyn Highlighter>>,
    generation: u64,
}

/// Text captured at settle time.
struct PendingPass {
    text: String,
    revision: u64,
}

/// Debounced driver for highlight passes.
pub struct HighlightScheduler {
    slot: Arc<Mutex<HighlighterSlot>>,
    enabled: Arc<AtomicBool>,
    debouncer: Debouncer<PendingPass>,
}

impl HighlightScheduler {
    pub fn new(
        config: &EditorConfig,
        content: Arc<Mutex<ContentStore>>,
        ui: UiHandle,
        listeners: ChangeListeners,
    ) -> Self {
        let slot = Arc::new(Mutex::new(HighlighterSlot::default()));
        let enabled = Arc::new(AtomicBool::new(config.highlighting_enabled));

        let capture = {
            let slot = slot.clone();
            let enabled = enabled.clone();
            let content = content.clone();
            move || {
                if !enabled.load(Ordering::SeqCst) || slot.lock().current.is_none() {
                    return None;
                }
                let content = content.lock();
                Some(PendingPass {
                    text: content.text(),
                    revision: content.revision(),
                })
            }
        };

        let process = {
            let slot = slot.clone();
            move |pass: PendingPass| run_pass(&slot, &content, &ui, &listeners, pass)
        };

        Self {
            slot,
            enabled,
            debouncer: Debouncer::new("highlight", config.highlight, capture, process),
        }
    }

    /// Starts the background highlight loop.
    pub fn start(&mut self) -> io::Result<()> {
        self.debouncer.start()
    }

    /// Stops the background highlight loop.
    pub fn stop(&mut self) {
        self.debouncer.stop();
    }

    /// Marks a highlight pass as pending.
    pub fn bump(&self) {
        self.debouncer.bump();
    }

    /// True if no pass is pending.
    pub fn is_settled(&self) -> bool {
        self.debouncer.is_settled()
    }

    /// Attaches a highlighter (replacing any previous one) and schedules a pass.
    pub fn set_highlighter(&self, highlighter: impl Highlighter + 'static) {
        {
            let mut slot = self.slot.lock();
            slot.current = Some(Box::new(highlighter));
            slot.generation += 1;
        }
        self.bump();
    }

    /// Detaches the highlighter. Spans already applied are left alone.
    pub fn clear_highlighter(&self) {
        let mut slot = self.slot.lock();
        slot.current = None;
        slot.generation += 1;
    }

    pub fn has_highlighter(&self) -> bool {
        self.slot.lock().current.is_some()
    }

    /// Enables or disables highlighting. Enabling schedules a pass.
    pub fn set_enabled(&self, enabled: bool) {
        let was = self.enabled.swap(enabled, Ordering::SeqCst);
        if enabled && !was {
            self.bump();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn bump_at(&self, now: Instant) {
        self.debouncer.bump_at(now);
    }

    #[cfg(test)]
    pub(crate) fn poll_at(&self, now: Instant) -> bool {
        self.debouncer.poll_at(now)
    }
}

/// Runs one highlight pass on the loop thread. Failures are logged and
/// dropped; the loop keeps polling.
fn run_pass(
    slot: &Mutex<HighlighterSlot>,
    content: &Arc<Mutex<ContentStore>>,
    ui: &UiHandle,
    listeners: &ChangeListeners,
    pass: PendingPass,
) {
    let (mut highlighter, generation) = {
        let mut slot = slot.lock();
        match slot.current.take() {
            Some(h) => (h, slot.generation),
            None => return,
        }
    };

    let started = Instant::now();
    let result = panic::catch_unwind(AssertUnwindSafe(|| highlighter.highlight(&pass.text)));

    {
        let mut slot = slot.lock();
        // Only put it back if nobody attached or detached one meanwhile.
        if slot.generation == generation && slot.current.is_none() {
            slot.current = Some(highlighter);
        }
    }

    match result {
        Ok(Ok(spans)) => {
            log::debug!(
                "highlight: {} spans for revision {} in {:?}",
                spans.len(),
                pass.revision,
                started.elapsed()
            );
            let content = content.clone();
            let listeners = listeners.clone();
            let revision = pass.revision;
            let posted = ui.post(move || {
                let applied = content.lock().apply_highlight(revision, spans);
                match applied {
                    Some(change) => listeners.notify(&change),
                    None => log::trace!("highlight: dropped stale result for revision {revision}"),
                }
            });
            if !posted {
                log::debug!("highlight: UI queue closed, result dropped");
            }
        }
        Ok(Err(e)) => log::warn!("{e}"),
        Err(_) => log::warn!("highlight: highlighter panicked, skipping pass"),
    }
}
