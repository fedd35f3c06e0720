use crate::clock::Clock;
use log::{debug, warn};
use std::time::{Duration, Instant};

/// Request budget per fixed window. The window restarts when it has fully
/// elapsed, or right after the limiter has waited out an exhausted budget.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    request_count: u32,
    window_start: Instant,
    max_requests: u32,
    window: Duration,
}

const RESET_MARGIN: Duration = Duration::from_secs(1);

impl RateLimiter {
    pub fn new(max_requests: u32, window: Duration, clock: &dyn Clock) -> Self {
        Self {
            request_count: 0,
            window_start: clock.now(),
            max_requests,
            window,
        }
    }

    /// Block until another request fits in the budget.
    ///
    /// Returns how long the call slept.
    pub fn check_limit(&mut self, clock: &dyn Clock) -> Duration {
        let now = clock.now();
        let elapsed = now.saturating_duration_since(self.window_start);
        if elapsed > self.window {
            debug!("Rate limit window elapsed after {:.1}s, resetting", elapsed.as_secs_f64());
            self.request_count = 0;
            self.window_start = now;
        }

        if self.request_count < self.max_requests {
            return Duration::ZERO;
        }

        let elapsed = now.saturating_duration_since(self.window_start);
        let wait = self.window.saturating_sub(elapsed).saturating_add(RESET_MARGIN);
        warn!(
            "API limit reached ({} requests). Waiting {:.1}s...",
            self.request_count,
            wait.as_secs_f64()
        );
        clock.sleep(wait);
        self.request_count = 0;
        self.window_start = clock.now();
        wait
    }

    pub fn record_request(&mut self) {
        self.request_count += 1;
    }

    pub fn request_count(&self) -> u32 {
        self.request_count
    }

    pub fn max_requests(&self) -> u32 {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn window_start(&self) -> Instant {
        self.window_start
    }
}
