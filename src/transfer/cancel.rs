//! Cancellation signal for in-flight transfers
//!
//! A transfer waiting for a lock or sleeping in backoff checks the token and
//! returns `Cancelled` without holding any lock.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

#[derive(Debug, Default)]
pub struct CancelToken {
    cancelled: AtomicBool,
    /// Guards the sleep predicate so `cancel()` cannot slip between a
    /// sleeper's check and its wait.
    gate: Mutex<()>,
    wakeup: Condvar,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake every sleeper
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        let _gate = self.gate.lock();
        self.wakeup.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` unless cancelled first.
    ///
    /// Returns `true` if the full duration elapsed, `false` if cancelled.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        let mut gate = self.gate.lock();
        while !self.is_cancelled() {
            if self.wakeup.wait_until(&mut gate, deadline).timed_out() {
                return !self.is_cancelled();
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_cancel_flag() {
        let token = CancelToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn test_sleep_completes() {
        let token = CancelToken::new();
        let start = Instant::now();
        assert!(token.sleep(Duration::from_millis(5)));
        assert!(start.elapsed() >= Duration::from_millis(5));
    }

    #[test]
    fn test_sleep_after_cancel_returns_immediately() {
        let token = CancelToken::new();
        token.cancel();
        let start = Instant::now();
        assert!(!token.sleep(Duration::from_secs(10)));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_cancel_wakes_sleeper() {
        let token = Arc::new(CancelToken::new());
        let sleeper = {
            let token = Arc::clone(&token);
            thread::spawn(move || token.sleep(Duration::from_secs(30)))
        };

        thread::sleep(Duration::from_millis(20));
        let start = Instant::now();
        token.cancel();
        assert!(!sleeper.join().unwrap());
        assert!(start.elapsed() < Duration::from_secs(5));
    }
}
