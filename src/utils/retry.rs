use std::fmt::Display;
use std::thread::sleep;
use std::time::Duration;
use tracing::debug;

/// Bounded retry with a fixed interval between attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    max_attempts: usize,
    interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
        }
    }

    /// Executes `f` until it succeeds, fails with an error `is_retryable`
    /// rejects, or the attempt budget is exhausted. The first success or the
    /// last error is returned. A budget of zero still executes `f` once.
    pub fn run<F, P, T, E>(&self, is_retryable: P, mut f: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
        P: Fn(&E) -> bool,
        E: Display,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match f() {
                Ok(result) => return Ok(result),
                Err(err) if attempt < self.max_attempts && is_retryable(&err) => {
                    debug!(%err, attempt, "retrying failed call");
                    sleep(self.interval);
                }
                Err(err) => return Err(err),
            }
        }
    }
}
