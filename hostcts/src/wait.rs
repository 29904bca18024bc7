use std::thread;
use std::time::{Duration, Instant};

/// Bounds for readiness polling.
///
/// Device state changes (a user appearing, a user starting) are observed by
/// re-running a query with exponential backoff instead of sleeping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WaitPolicy {
    /// Total time allowed before giving up
    pub timeout: Duration,
    /// Delay after the first unsuccessful check
    pub initial_interval: Duration,
    /// The delay doubles after every check but never exceeds this
    pub max_interval: Duration,
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            initial_interval: Duration::from_millis(250),
            max_interval: Duration::from_millis(5000),
        }
    }
}

impl WaitPolicy {
    pub fn new(timeout: Duration, initial_interval: Duration, max_interval: Duration) -> Self {
        Self {
            timeout,
            initial_interval,
            max_interval,
        }
    }

    /// Delay before the given check (1-based), doubling up to `max_interval`
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp = attempt.max(1).saturating_sub(1).min(31);
        let delay = self.initial_interval.saturating_mul(1u32 << exp);
        delay.min(self.max_interval)
    }

    /// Poll `check` until it returns `true`.
    ///
    /// `check` is always invoked at least once. Errors from `check` end the
    /// poll immediately. Running past `timeout` is an [crate::Error::Timeout]
    /// naming `what`.
    pub fn poll_until<F>(&self, what: &str, mut check: F) -> crate::Result<()>
    where
        F: FnMut() -> crate::Result<bool>,
    {
        let start = Instant::now();
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            if check()? {
                log::trace!("{} ready after {} check(s)", what, attempt);
                return Ok(());
            }
            let elapsed = start.elapsed();
            if elapsed >= self.timeout {
                return Err(crate::Error::Timeout(format!(
                    "{} (gave up after {:?}, {} checks)",
                    what, elapsed, attempt
                )));
            }
            let remaining = self.timeout - elapsed;
            let delay = self.backoff_delay(attempt).min(remaining);
            log::trace!("{} not ready, checking again in {:?}", what, delay);
            thread::sleep(delay);
        }
    }

    /// Fixed wait for operations that give no observable signal. Never waits
    /// longer than `timeout`.
    pub fn settle(&self, wanted: Duration) {
        let delay = wanted.min(self.timeout);
        log::debug!("settling for {:?}", delay);
        thread::sleep(delay);
    }
}
