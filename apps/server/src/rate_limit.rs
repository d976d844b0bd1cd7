//! Fixed-window submission throttle
//!
//! Applied to /model/apply before anything is validated or enqueued. The
//! throughput profile disables it entirely.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use archihub_core_types::{HubError, HubResult};

const WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    /// 0 disables the limiter
    per_minute: u32,
    window: Mutex<(Instant, u32)>,
}

impl RateLimiter {
    pub fn new(per_minute: u32) -> Self {
        Self {
            per_minute,
            window: Mutex::new((Instant::now(), 0)),
        }
    }

    /// Count one submission; rejects with RateLimited once the window is full
    pub fn check(&self) -> HubResult<()> {
        if self.per_minute == 0 {
            return Ok(());
        }
        let mut window = self.window.lock().expect("limiter poisoned");
        let now = Instant::now();
        if now.duration_since(window.0) >= WINDOW {
            *window = (now, 0);
        }
        if window.1 >= self.per_minute {
            let retry_after = WINDOW
                .saturating_sub(now.duration_since(window.0))
                .as_secs()
                .max(1);
            return Err(HubError::RateLimited {
                retry_after_secs: retry_after,
            });
        }
        window.1 += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_kicks_in_after_capacity() {
        let limiter = RateLimiter::new(3);
        for _ in 0..3 {
            limiter.check().unwrap();
        }
        assert!(matches!(
            limiter.check(),
            Err(HubError::RateLimited { .. })
        ));
    }

    #[test]
    fn zero_disables_the_throttle() {
        let limiter = RateLimiter::new(0);
        for _ in 0..1000 {
            limiter.check().unwrap();
        }
    }
}
