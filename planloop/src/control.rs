//! Cooperative pause/resume/abort signalling.
//!
//! One [`LoopSignal`] is shared between the controller and its operator
//! surface (CLI, TUI). Pause latches until resumed and is honored at
//! iteration boundaries; abort is additionally polled inside the in-flight
//! process wait so long iterations can be interrupted promptly.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Shared control token; clones observe the same underlying flags.
#[derive(Debug, Clone, Default)]
pub struct LoopSignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug, Default)]
struct SignalInner {
    cancelled: AtomicBool,
    paused: Mutex<bool>,
    changed: Condvar,
}

impl LoopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the loop stop as soon as possible, killing in-flight work.
    /// Irreversible.
    pub fn abort(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.changed.notify_all();
    }

    pub fn cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Latch a pause request; takes effect at the next iteration boundary.
    pub fn pause(&self) {
        *lock(&self.inner.paused) = true;
        self.inner.changed.notify_all();
    }

    pub fn resume(&self) {
        *lock(&self.inner.paused) = false;
        self.inner.changed.notify_all();
    }

    pub fn paused(&self) -> bool {
        *lock(&self.inner.paused)
    }

    /// Flip the pause latch, returning the new paused state.
    pub fn toggle_pause(&self) -> bool {
        let mut paused = lock(&self.inner.paused);
        *paused = !*paused;
        self.inner.changed.notify_all();
        *paused
    }

    /// Block until the pause latch clears or the loop is aborted.
    pub fn wait_while_paused(&self) {
        let mut paused = lock(&self.inner.paused);
        while *paused && !self.cancelled() {
            // Bounded waits keep this robust against missed notifications.
            let (guard, _) = self
                .inner
                .changed
                .wait_timeout(paused, Duration::from_millis(200))
                .unwrap_or_else(PoisonError::into_inner);
            paused = guard;
        }
    }
}

fn lock(mutex: &Mutex<bool>) -> MutexGuard<'_, bool> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Instant;

    #[test]
    fn starts_running_and_uncancelled() {
        let signal = LoopSignal::new();
        assert!(!signal.paused());
        assert!(!signal.cancelled());
    }

    #[test]
    fn pause_latches_until_resume() {
        let signal = LoopSignal::new();
        signal.pause();
        assert!(signal.paused());
        signal.resume();
        assert!(!signal.paused());
    }

    #[test]
    fn toggle_flips_and_reports_new_state() {
        let signal = LoopSignal::new();
        assert!(signal.toggle_pause());
        assert!(!signal.toggle_pause());
    }

    #[test]
    fn clones_share_state() {
        let signal = LoopSignal::new();
        let clone = signal.clone();
        clone.abort();
        assert!(signal.cancelled());
    }

    #[test]
    fn resume_wakes_a_paused_waiter() {
        let signal = LoopSignal::new();
        signal.pause();

        let waiter = signal.clone();
        let handle = thread::spawn(move || waiter.wait_while_paused());
        thread::sleep(Duration::from_millis(50));
        signal.resume();
        handle.join().expect("join");
    }

    #[test]
    fn abort_wakes_a_paused_waiter() {
        let signal = LoopSignal::new();
        signal.pause();

        let waiter = signal.clone();
        let started = Instant::now();
        let handle = thread::spawn(move || waiter.wait_while_paused());
        thread::sleep(Duration::from_millis(50));
        signal.abort();
        handle.join().expect("join");
        assert!(started.elapsed() < Duration::from_secs(2));
    }
}
