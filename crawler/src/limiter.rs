use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use minutes_core::urls::netloc_of;

/// Per-host politeness. Each host maps to the earliest instant the next
/// request may start; a waiter reserves its slot under the lock and sleeps
/// outside it, so reservations stay monotonic while other hosts proceed.
#[derive(Default)]
pub struct HostRateLimiter {
    next_allowed: Mutex<HashMap<String, Instant>>,
}

impl HostRateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn wait(&self, url: &str, delay_sec: f64) {
        let netloc = netloc_of(url);
        if netloc.is_empty() || delay_sec <= 0.0 {
            return;
        }
        let delay = Duration::from_secs_f64(delay_sec);
        let sleep_for = {
            let mut map = self.next_allowed.lock();
            let now = Instant::now();
            let next = map.get(&netloc).copied().unwrap_or(now);
            let sleep_for = next.saturating_duration_since(now);
            let base = if next > now { next } else { now };
            map.insert(netloc, base + delay);
            sleep_for
        };
        if !sleep_for.is_zero() {
            tokio::time::sleep(sleep_for).await;
        }
    }
}
