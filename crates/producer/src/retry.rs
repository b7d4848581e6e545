use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::errors::Result;

pub const DEFAULT_RECEIPT_ATTEMPTS: u32 = 3;
pub const DEFAULT_RECEIPT_DELAY: Duration = Duration::from_millis(500);

/// Fixed-count, fixed-delay retry. The delay is applied before every attempt,
/// so a freshly submitted transaction gets time to be included before the
/// first receipt lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_RECEIPT_ATTEMPTS,
            delay: DEFAULT_RECEIPT_DELAY,
        }
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// Run `op` until it succeeds or the attempts are exhausted, returning the
    /// last error in the latter case. `op` receives the 1-based attempt number.
    pub fn run<T, F>(&self, mut op: F) -> Result<T>
    where
        F: FnMut(u32) -> Result<T>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            if !self.delay.is_zero() {
                thread::sleep(self.delay);
            }
            match op(attempt) {
                Ok(value) => return Ok(value),
                Err(err) if attempt < attempts => {
                    warn!(attempt, attempts, error = %err, "attempt failed, retrying");
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
