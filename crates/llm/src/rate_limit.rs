//! Sliding one-minute request window.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::{Duration, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Admits at most `max_per_minute` calls in any trailing 60-second window.
/// Calls over the limit are refused rather than queued.
pub struct RateLimiter {
    max_per_minute: u32,
    recent: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    pub fn new(max_per_minute: u32) -> Self {
        Self {
            max_per_minute,
            recent: Mutex::new(VecDeque::new()),
        }
    }

    pub fn max_per_minute(&self) -> u32 {
        self.max_per_minute
    }

    /// Record a call now if the window has room.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    fn try_acquire_at(&self, now: Instant) -> bool {
        let mut recent = self
            .recent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        while recent
            .front()
            .is_some_and(|t| now.saturating_duration_since(*t) >= WINDOW)
        {
            recent.pop_front();
        }

        if recent.len() >= self.max_per_minute as usize {
            return false;
        }
        recent.push_back(now);
        true
    }

    /// Calls admitted within the current window.
    pub fn in_window(&self) -> usize {
        let now = Instant::now();
        self.recent
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < WINDOW)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refuses_past_the_limit() {
        let limiter = RateLimiter::new(2);
        let t0 = Instant::now();
        assert!(limiter.try_acquire_at(t0));
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(1)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(2)));
    }

    #[test]
    fn window_slides() {
        let limiter = RateLimiter::new(2);
        let t0 = Instant::now();
        assert!(limiter.try_acquire_at(t0));
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(30)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(59)));
        // The first call ages out at the 60 s mark.
        assert!(limiter.try_acquire_at(t0 + Duration::from_secs(60)));
        assert!(!limiter.try_acquire_at(t0 + Duration::from_secs(61)));
    }

    #[test]
    fn zero_limit_refuses_everything() {
        let limiter = RateLimiter::new(0);
        assert!(!limiter.try_acquire());
        assert_eq!(limiter.in_window(), 0);
    }
}
