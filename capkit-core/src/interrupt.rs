//! Wake primitive for leaving a blocking wait on stop

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
struct Inner {
    triggered: Mutex<bool>,
    cond: Condvar,
}

/// Latching interrupt shared between a capture loop and its controllers
///
/// `trigger()` sets the latch and wakes every waiter immediately; the latch
/// stays set until `reset()`. A trigger that happens before a waiter arrives
/// is therefore never lost.
#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    inner: Arc<Inner>,
}

impl Interrupt {
    /// Create an untriggered latch
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the latch and wake all waiters
    pub fn trigger(&self) {
        let mut triggered = self.inner.triggered.lock();
        *triggered = true;
        self.inner.cond.notify_all();
    }

    /// True once `trigger()` was called
    pub fn is_triggered(&self) -> bool {
        *self.inner.triggered.lock()
    }

    /// Clear the latch
    pub fn reset(&self) {
        *self.inner.triggered.lock() = false;
    }

    /// Block until triggered
    pub fn wait(&self) {
        let mut triggered = self.inner.triggered.lock();
        while !*triggered {
            self.inner.cond.wait(&mut triggered);
        }
    }

    /// Block until triggered or `timeout` elapses. Returns true if triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut triggered = self.inner.triggered.lock();
        while !*triggered {
            if self
                .inner
                .cond
                .wait_until(&mut triggered, deadline)
                .timed_out()
            {
                break;
            }
        }
        *triggered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_trigger_before_wait_is_latched() {
        let irq = Interrupt::new();
        irq.trigger();
        assert!(irq.is_triggered());
        assert!(irq.wait_timeout(Duration::from_millis(1)));
        irq.wait();

        irq.reset();
        assert!(!irq.is_triggered());
    }

    #[test]
    fn test_wait_timeout_expires() {
        let irq = Interrupt::new();
        let start = Instant::now();
        assert!(!irq.wait_timeout(Duration::from_millis(20)));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }

    #[test]
    fn test_trigger_wakes_blocked_waiter() {
        let irq = Interrupt::new();
        let waiter = irq.clone();

        let handle = thread::spawn(move || {
            let start = Instant::now();
            waiter.wait();
            start.elapsed()
        });

        thread::sleep(Duration::from_millis(20));
        irq.trigger();

        let waited = handle.join().unwrap();
        assert!(waited < Duration::from_secs(5));
    }
}
