use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Enforces a minimum spacing between outbound requests.
///
/// The lock is held while waiting, so concurrent callers queue up and leave
/// one `min_interval` apart in arrival order.
pub struct RateLimiter {
    min_interval: Duration,
    last_call: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_call: Mutex::new(None),
        }
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Blocks until a request may start, then records the start time.
    /// Returns how long the caller waited.
    pub fn acquire(&self) -> Duration {
        let mut last = self.last_call.lock().unwrap_or_else(PoisonError::into_inner);
        let mut waited = Duration::ZERO;
        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                waited = self.min_interval - elapsed;
                std::thread::sleep(waited);
            }
        }
        *last = Some(Instant::now());
        waited
    }
}
