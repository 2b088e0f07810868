//! Global download pacing.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Minimum-interval gate shared by all download workers.
///
/// The gate holds the time the last download was released. An acquirer
/// locks the gate, sleeps out whatever remains of the interval, stamps the
/// current time and releases. Because the sleep happens while the lock is
/// held, releases across all workers are spaced at least `wait_time` apart
/// no matter how many run concurrently.
#[derive(Debug)]
pub struct RateLimiter {
    wait_time: Duration,
    last_release: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(wait_time: Duration) -> Self {
        Self {
            wait_time,
            last_release: Mutex::new(None),
        }
    }

    /// Wait until this caller may start its download.
    pub async fn acquire(&self) {
        let mut last_release = self.last_release.lock().await;

        if let Some(previous) = *last_release {
            let elapsed = previous.elapsed();
            if elapsed < self.wait_time {
                tokio::time::sleep(self.wait_time - elapsed).await;
            }
        }

        *last_release = Some(Instant::now());
    }
}
