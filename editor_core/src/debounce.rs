//! Settle-after-quiet-period debouncing.
//!
//! Both the undo checkpoint loop and the highlight loop are instances of
//! [`Debouncer`]: a state machine that flips to *unsettled* on every bump and
//! back to *settled* once no bump has arrived for a threshold, polled by a
//! background thread at a fixed period.
//!
//! Settling runs in two phases:
//! 1. `capture` runs while the settle lock is held. It must be quick; it is
//!    serialized with bumps and forced settles.
//! 2. `process` receives what `capture` returned and runs on the loop thread
//!    after the lock is released, so slow work never blocks a bump.

use crate::config::SettleConfig;
use crossbeam_channel::{RecvTimeoutError, Sender};
use parking_lot::Mutex;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Pure timing state of one debouncer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettleState {
    settled: bool,
    last_edit: Option<Instant>,
}

impl Default for SettleState {
    fn default() -> Self {
        Self::new()
    }
}

impl SettleState {
    /// Creates a settled state with no edits recorded.
    pub fn new() -> Self {
        Self {
            settled: true,
            last_edit: None,
        }
    }

    /// Records an edit at `now`.
    pub fn bump(&mut self, now: Instant) {
        self.settled = false;
        self.last_edit = Some(now);
    }

    pub fn is_settled(&self) -> bool {
        self.settled
    }

    pub fn last_edit(&self) -> Option<Instant> {
        self.last_edit
    }

    /// Returns true if unsettled and strictly more than `threshold` has
    /// passed since the last edit.
    pub fn is_due(&self, now: Instant, threshold: Duration) -> bool {
        if self.settled {
            return false;
        }
        match self.last_edit {
            Some(last) => now.saturating_duration_since(last) > threshold,
            None => true,
        }
    }

    pub fn mark_settled(&mut self) {
        self.settled = true;
    }
}

type CaptureFn<T> = Box<dyn FnMut() -> Option<T> + Send>;
type ProcessFn<T> = Box<dyn FnMut(T) + Send>;

struct Inner<T> {
    state: SettleState,
    capture: CaptureFn<T>,
}

struct Shared<T> {
    inner: Mutex<Inner<T>>,
    process: Mutex<ProcessFn<T>>,
}

impl<T> Inner<T> {
    /// Settles and captures if the burst is due at `now`.
    fn settle_if_due(&mut self, now: Instant, threshold: Duration) -> Option<Option<T>> {
        if !self.state.is_due(now, threshold) {
            return None;
        }
        self.state.mark_settled();
        Some((self.capture)())
    }
}

impl<T> Shared<T> {
    /// One poll tick. Returns true if the debouncer settled on this tick.
    fn tick(&self, now: Instant, threshold: Duration) -> bool {
        let captured = self.inner.lock().settle_if_due(now, threshold);
        match captured {
            Some(value) => {
                self.process(value);
                true
            }
            None => false,
        }
    }

    fn process(&self, value: Option<T>) {
        if let Some(value) = value {
            let mut process = self.process.lock();
            (*process)(value);
        }
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// A settle-after-quiet-period loop parameterized by timing and actions.
pub struct Debouncer<T: Send + 'static> {
    name: &'static str,
    config: SettleConfig,
    shared: Arc<Shared<T>>,
    worker: Option<Worker>,
}

impl<T: Send + 'static> Debouncer<T> {
    /// Creates a debouncer. No thread runs until [`Debouncer::start`].
    pub fn new(
        name: &'static str,
        config: SettleConfig,
        capture: impl FnMut() -> Option<T> + Send + 'static,
        process: impl FnMut(T) + Send + 'static,
    ) -> Self {
        Self {
            name,
            config,
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    state: SettleState::new(),
                    capture: Box::new(capture),
                }),
                process: Mutex::new(Box::new(process)),
            }),
            worker: None,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn config(&self) -> SettleConfig {
        self.config
    }

    /// Spawns the polling thread. Calling it twice is a no-op.
    pub fn start(&mut self) -> io::Result<()> {
        if self.worker.is_some() {
            return Ok(());
        }

        let (stop_tx, stop_rx) = crossbeam_channel::bounded::<()>(1);
        let shared = self.shared.clone();
        let threshold = self.config.threshold();
        let poll = self.config.poll_period();
        let name = self.name;

        let handle = thread::Builder::new()
            .name(format!("{name}-settle"))
            .spawn(move || {
                log::debug!("{name}: settle loop started (threshold {threshold:?}, poll {poll:?})");
                loop {
                    match stop_rx.recv_timeout(poll) {
                        Err(RecvTimeoutError::Timeout) => {
                            if shared.tick(Instant::now(), threshold) {
                                log::trace!("{name}: settled");
                            }
                        }
                        // A stop message or a dropped sender both mean shut down.
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }
                }
                log::debug!("{name}: settle loop stopped");
            })?;

        self.worker = Some(Worker { stop_tx, handle });
        Ok(())
    }

    /// Stops the polling thread and waits for it. Idempotent.
    pub fn stop(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.try_send(());
            drop(worker.stop_tx);
            if worker.handle.join().is_err() {
                log::error!("{}: settle loop panicked", self.name);
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.worker.is_some()
    }

    /// Records an edit now.
    pub fn bump(&self) {
        self.bump_at(Instant::now());
    }

    /// Records an edit at `now`.
    ///
    /// The edit itself must already be visible to `capture`. Prefer
    /// [`Debouncer::edit_at`] when the edit has not happened yet.
    pub fn bump_at(&self, now: Instant) {
        self.shared.inner.lock().state.bump(now);
    }

    /// Performs an edit at `now` under the settle lock, so no tick can
    /// capture between the edit and its bump.
    ///
    /// A burst that is already due at `now` is settled first and captures
    /// the content as it was before `edit`. The edit's result decides
    /// whether it counts as a bump.
    pub fn edit_at<R>(
        &self,
        now: Instant,
        edit: impl FnOnce() -> R,
        is_bump: impl FnOnce(&R) -> bool,
    ) -> R {
        let (result, captured) = {
            let mut inner = self.shared.inner.lock();
            let captured = inner.settle_if_due(now, self.config.threshold());
            let result = edit();
            if is_bump(&result) {
                inner.state.bump(now);
            }
            (result, captured)
        };
        if let Some(value) = captured {
            self.shared.process(value);
        }
        result
    }

    pub fn is_settled(&self) -> bool {
        self.shared.inner.lock().state.is_settled()
    }

    /// Runs one poll tick at `now` on the calling thread.
    pub fn poll_at(&self, now: Instant) -> bool {
        self.shared.tick(now, self.config.threshold())
    }

    /// Settles immediately if unsettled, returning what `capture` produced.
    /// `process` is not run; the caller owns the result.
    pub fn settle_now(&self) -> Option<T> {
        let mut inner = self.shared.inner.lock();
        if inner.state.is_settled() {
            return None;
        }
        inner.state.mark_settled();
        (inner.capture)()
    }

    /// Marks settled and runs `f` under the settle lock, so no tick can
    /// capture while `f` rewrites the state it captures from.
    pub fn with_settled<R>(&self, f: impl FnOnce() -> R) -> R {
        let mut inner = self.shared.inner.lock();
        inner.state.mark_settled();
        f()
    }
}

impl<T: Send + 'static> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    fn counting(config: SettleConfig) -> (Debouncer<usize>, Arc<AtomicUsize>, Arc<AtomicUsize>) {
        let captures = Arc::new(AtomicUsize::new(0));
        let processed = Arc::new(AtomicUsize::new(0));
        let c = captures.clone();
        let p = processed.clone();
        let debouncer = Debouncer::new(
            "test",
            config,
            move || Some(c.fetch_add(1, Ordering::SeqCst) + 1),
            move |_| {
                p.fetch_add(1, Ordering::SeqCst);
            },
        );
        (debouncer, captures, processed)
    }

    #[test]
    fn test_state_transitions() {
        let t0 = Instant::now();
        let mut state = SettleState::new();
        assert!(state.is_settled());
        assert!(!state.is_due(t0 + ms(10_000), ms(500)));

        state.bump(t0);
        assert!(!state.is_settled());
        assert!(!state.is_due(t0 + ms(500), ms(500)));
        assert!(state.is_due(t0 + ms(501), ms(500)));

        state.mark_settled();
        assert!(!state.is_due(t0 + ms(10_000), ms(500)));
    }

    #[test]
    fn test_burst_settles_once() {
        let (debouncer, captures, processed) = counting(SettleConfig::new(ms(500), ms(100)));
        let t0 = Instant::now();
        for i in 0..20 {
            debouncer.bump_at(t0 + ms(i * 10));
        }

        // Quiet period measured from the last bump, not the first.
        assert!(!debouncer.poll_at(t0 + ms(600)));
        assert!(debouncer.poll_at(t0 + ms(800)));
        assert!(!debouncer.poll_at(t0 + ms(900)));
        assert!(!debouncer.poll_at(t0 + ms(5_000)));

        assert_eq!(captures.load(Ordering::SeqCst), 1);
        assert_eq!(processed.load(Ordering::SeqCst), 1);
        assert!(debouncer.is_settled());
    }

    #[test]
    fn test_separate_bursts_settle_separately() {
        let (debouncer, captures, _) = counting(SettleConfig::new(ms(500), ms(100)));
        let t0 = Instant::now();
        debouncer.bump_at(t0);
        assert!(debouncer.poll_at(t0 + ms(600)));
        debouncer.bump_at(t0 + ms(700));
        assert!(debouncer.poll_at(t0 + ms(1_300)));
        assert_eq!(captures.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_settle_now_skips_process() {
        let (debouncer, captures, processed) = counting(SettleConfig::default());
        assert_eq!(debouncer.settle_now(), None);

        debouncer.bump();
        assert_eq!(debouncer.settle_now(), Some(1));
        assert_eq!(debouncer.settle_now(), None);
        assert!(!debouncer.poll_at(Instant::now() + ms(10_000)));

        assert_eq!(captures.load(Ordering::SeqCst), 1);
        assert_eq!(processed.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_with_settled_cancels_pending() {
        let (debouncer, captures, _) = counting(SettleConfig::default());
        let t0 = Instant::now();
        debouncer.bump_at(t0);
        let out = debouncer.with_settled(|| 42);
        assert_eq!(out, 42);
        assert!(!debouncer.poll_at(t0 + ms(10_000)));
        assert_eq!(captures.load(Ordering::SeqCst), 0);
    }

    /// Debouncer whose capture reads a shared "document" value.
    fn document(config: SettleConfig) -> (Debouncer<usize>, Arc<AtomicUsize>, Arc<Mutex<Vec<usize>>>) {
        let doc = Arc::new(AtomicUsize::new(0));
        let stored = Arc::new(Mutex::new(Vec::new()));
        let d = doc.clone();
        let s = stored.clone();
        let debouncer = Debouncer::new(
            "doc",
            config,
            move || Some(d.load(Ordering::SeqCst)),
            move |value| s.lock().push(value),
        );
        (debouncer, doc, stored)
    }

    #[test]
    fn test_edit_settles_due_burst_before_editing() {
        let (debouncer, doc, stored) = document(SettleConfig::new(ms(500), ms(100)));
        let t0 = Instant::now();
        debouncer.edit_at(t0, || doc.store(1, Ordering::SeqCst), |_| true);

        // The first burst is due when the second edit arrives.
        debouncer.edit_at(t0 + ms(550), || doc.store(2, Ordering::SeqCst), |_| true);
        assert!(!debouncer.is_settled());
        assert!(!debouncer.poll_at(t0 + ms(600)));
        assert!(debouncer.poll_at(t0 + ms(1_100)));

        assert_eq!(*stored.lock(), vec![1, 2]);
    }

    #[test]
    fn test_edit_blocks_concurrent_tick() {
        let (debouncer, doc, stored) = document(SettleConfig::new(ms(500), ms(100)));
        let t0 = Instant::now();
        debouncer.edit_at(t0, || doc.store(1, Ordering::SeqCst), |_| true);

        let (edited_tx, edited_rx) = crossbeam_channel::bounded::<()>(1);
        thread::scope(|scope| {
            let ticker = scope.spawn(|| {
                let _ = edited_rx.recv();
                debouncer.poll_at(t0 + ms(550))
            });
            debouncer.edit_at(
                t0 + ms(550),
                || {
                    doc.store(2, Ordering::SeqCst);
                    // The tick runs while the edit is half done.
                    let _ = edited_tx.send(());
                    thread::sleep(ms(30));
                },
                |_| true,
            );
            // The tick waited for the bump, so it found nothing due.
            assert!(!ticker.join().unwrap());
        });

        assert!(debouncer.poll_at(t0 + ms(1_100)));
        assert_eq!(*stored.lock(), vec![1, 2]);
    }

    #[test]
    fn test_edit_without_bump_stays_settled() {
        let (debouncer, doc, stored) = document(SettleConfig::default());
        let t0 = Instant::now();
        let out = debouncer.edit_at(t0, || doc.load(Ordering::SeqCst) + 7, |_| false);
        assert_eq!(out, 7);
        assert!(debouncer.is_settled());
        assert!(!debouncer.poll_at(t0 + ms(10_000)));
        assert!(stored.lock().is_empty());
    }

    #[test]
    fn test_capture_returning_none_still_settles() {
        let debouncer: Debouncer<()> =
            Debouncer::new("none", SettleConfig::default(), || None, |_| panic!("no value"));
        let t0 = Instant::now();
        debouncer.bump_at(t0);
        assert!(debouncer.poll_at(t0 + ms(1_000)));
        assert!(debouncer.is_settled());
    }

    #[test]
    fn test_background_loop_settles_and_stops() {
        let (mut debouncer, captures, processed) = counting(SettleConfig::new(ms(50), ms(5)));
        debouncer.start().unwrap();
        assert!(debouncer.is_running());

        for _ in 0..10 {
            debouncer.bump();
        }

        let deadline = Instant::now() + Duration::from_secs(5);
        while processed.load(Ordering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(ms(5));
        }
        thread::sleep(ms(100));

        assert_eq!(captures.load(Ordering::SeqCst), 1);
        assert_eq!(processed.load(Ordering::SeqCst), 1);

        debouncer.stop();
        assert!(!debouncer.is_running());
        debouncer.stop();
    }

    #[test]
    fn test_stop_interrupts_long_poll() {
        let (mut debouncer, _, _) = counting(SettleConfig::new(ms(500), ms(60_000)));
        debouncer.start().unwrap();
        let started = Instant::now();
        debouncer.stop();
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
