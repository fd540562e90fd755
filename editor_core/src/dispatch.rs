//! UI execution context.
//!
//! Background loops never mutate widget-visible state directly. They post
//! closures to a [`UiQueue`], which the thread owning the editor drains
//! between input events, much like the render loop polls LSP responses.

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender};
use std::time::Duration;

/// A unit of work to run on the UI thread.
pub type UiTask = Box<dyn FnOnce() + Send>;

/// Cloneable handle for posting work onto the UI thread.
#[derive(Clone)]
pub struct UiHandle {
    task_tx: Sender<UiTask>,
}

impl UiHandle {
    /// Posts a task. Returns false if the queue is gone (editor torn down).
    pub fn post(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.task_tx.send(Box::new(task)).is_ok()
    }
}

/// The receiving end, owned by the UI thread.
pub struct UiQueue {
    task_tx: Sender<UiTask>,
    task_rx: Receiver<UiTask>,
}

impl Default for UiQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl UiQueue {
    pub fn new() -> Self {
        let (task_tx, task_rx) = crossbeam_channel::unbounded();
        Self { task_tx, task_rx }
    }

    /// Returns a handle for posting tasks.
    pub fn handle(&self) -> UiHandle {
        UiHandle {
            task_tx: self.task_tx.clone(),
        }
    }

    /// Number of tasks waiting to run.
    pub fn pending(&self) -> usize {
        self.task_rx.len()
    }

    /// Runs every task already queued without blocking. Returns how many ran.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(task) = self.task_rx.try_recv() {
            task();
            ran += 1;
        }
        ran
    }

    /// Waits up to `timeout` for a task, then drains the queue.
    pub fn run_within(&self, timeout: Duration) -> usize {
        match self.task_rx.recv_timeout(timeout) {
            Ok(task) => {
                task();
                1 + self.run_pending()
            }
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_run_pending_in_order() {
        let queue = UiQueue::new();
        let log = Arc::new(parking_lot::Mutex::new(Vec::new()));
        for i in 0..3 {
            let log = log.clone();
            assert!(queue.handle().post(move || log.lock().push(i)));
        }
        assert_eq!(queue.pending(), 3);
        assert_eq!(queue.run_pending(), 3);
        assert_eq!(*log.lock(), vec![0, 1, 2]);
        assert_eq!(queue.run_pending(), 0);
    }

    #[test]
    fn test_post_from_other_thread() {
        let queue = UiQueue::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let handle = queue.handle();
        let c = counter.clone();
        thread::spawn(move || {
            handle.post(move || {
                c.fetch_add(1, Ordering::SeqCst);
            });
        })
        .join()
        .unwrap();

        assert_eq!(queue.run_within(Duration::from_secs(1)), 1);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_run_within_times_out() {
        let queue = UiQueue::new();
        assert_eq!(queue.run_within(Duration::from_millis(5)), 0);
    }

    #[test]
    fn test_post_after_queue_dropped() {
        let queue = UiQueue::new();
        let handle = queue.handle();
        drop(queue);
        assert!(!handle.post(|| {}));
    }
}
