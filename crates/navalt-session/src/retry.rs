//! Retry pacing for online route requests.
//!
//! Attempts are spaced by a minimum interval measured from the start of the
//! previous attempt, so a slow failure does not add extra delay. A server
//! may override the wait with an explicit delay.

use std::time::Duration;

use tokio::time::{sleep, sleep_until, Instant};

#[derive(Debug, Clone)]
pub struct RetryLimiter {
    min_interval: Duration,
    attempt_started_at: Option<Instant>,
}

impl RetryLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            attempt_started_at: None,
        }
    }

    /// Mark the start of an attempt.
    pub fn start_attempt(&mut self) {
        self.attempt_started_at = Some(Instant::now());
    }

    /// Earliest start of the next attempt.
    pub fn next_attempt_at(&self) -> Instant {
        match self.attempt_started_at {
            Some(started) => started + self.min_interval,
            None => Instant::now(),
        }
    }

    #[cfg(test)]
    fn ready(&self) -> bool {
        Instant::now() >= self.next_attempt_at()
    }

    /// Wait until the minimum interval since the last attempt start has passed.
    pub async fn wait(&self) {
        sleep_until(self.next_attempt_at()).await;
    }

    /// Wait exactly `delay`, ignoring the minimum interval.
    pub async fn wait_with_override(&self, delay: Duration) {
        sleep(delay).await;
    }
}
