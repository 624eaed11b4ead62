//! Cooperative shutdown signal.
//!
//! One `Shutdown` instance is shared by every worker. It is set exactly once
//! and never cleared. Workers check it once per loop iteration and use
//! [`Shutdown::sleep`] instead of `thread::sleep` so that `stop()` latency is
//! bounded by a short tick rather than by the longest configured interval.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::Duration;

pub struct Shutdown {
    triggered: AtomicBool,
    lock: Mutex<bool>,
    cond: Condvar,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            triggered: AtomicBool::new(false),
            lock: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Set the signal and wake every blocked sleeper. Idempotent.
    pub fn trigger(&self) {
        self.triggered.store(true, Ordering::SeqCst);
        let mut flagged = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        *flagged = true;
        self.cond.notify_all();
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Sleep up to `duration`, waking early if the signal fires.
    ///
    /// Returns `true` if the full duration elapsed without a trigger, `false`
    /// if shutdown was requested before or during the sleep.
    pub fn sleep(&self, duration: Duration) -> bool {
        let flagged = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        if *flagged {
            return false;
        }
        let (flagged, _timeout) = self
            .cond
            .wait_timeout_while(flagged, duration, |flagged| !*flagged)
            .unwrap_or_else(|e| e.into_inner());
        !*flagged
    }

    /// Block until the signal fires.
    pub fn wait(&self) {
        let flagged = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let _flagged = self
            .cond
            .wait_while(flagged, |flagged| !*flagged)
            .unwrap_or_else(|e| e.into_inner());
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn sleep_runs_full_duration_when_untriggered() {
        let shutdown = Shutdown::new();
        let start = Instant::now();
        assert!(shutdown.sleep(Duration::from_millis(50)));
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn sleep_returns_immediately_after_trigger() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        let start = Instant::now();
        assert!(!shutdown.sleep(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn trigger_interrupts_concurrent_sleep() {
        let shutdown = Arc::new(Shutdown::new());
        let sleeper = shutdown.clone();
        let start = Instant::now();
        let handle = std::thread::spawn(move || sleeper.sleep(Duration::from_secs(30)));
        std::thread::sleep(Duration::from_millis(50));
        shutdown.trigger();
        assert!(!handle.join().expect("sleeper thread"));
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn trigger_is_idempotent() {
        let shutdown = Shutdown::new();
        shutdown.trigger();
        shutdown.trigger();
        assert!(shutdown.is_triggered());
    }
}
