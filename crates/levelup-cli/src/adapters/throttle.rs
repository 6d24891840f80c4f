//! Progress throttling.
//!
//! Rate-limits transfer progress so the update manager is not flooded with
//! one host event per received chunk.

use std::time::{Duration, Instant};

/// Rate-limiter for transfer progress events that also measures throughput
/// between two emitted events.
#[derive(Debug)]
pub struct ProgressThrottle {
    last_emit: Option<Instant>,
    min_interval: Duration,
    window_bytes: u64,
}

impl ProgressThrottle {
    /// Create a new throttle with the specified minimum interval.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            last_emit: None,
            min_interval,
            window_bytes: 0,
        }
    }

    /// Create a throttle with a default interval of 250ms.
    pub const fn default_interval() -> Self {
        Self::new(Duration::from_millis(250))
    }

    /// Count received bytes towards the current speed window.
    pub const fn record(&mut self, bytes: u64) {
        self.window_bytes = self.window_bytes.saturating_add(bytes);
    }

    /// Check whether enough time has passed to emit another progress event.
    ///
    /// Returns the bytes-per-second rate since the previous emission when it
    /// has, and starts a new window.
    pub fn should_emit(&mut self) -> Option<u64> {
        let now = Instant::now();
        let rate = match self.last_emit {
            Some(last) if now.duration_since(last) < self.min_interval => return None,
            Some(last) => per_second(self.window_bytes, now.duration_since(last)),
            None => 0,
        };
        self.last_emit = Some(now);
        self.window_bytes = 0;
        Some(rate)
    }

    /// Force the next check to emit, discarding the current window.
    pub const fn reset(&mut self) {
        self.last_emit = None;
        self.window_bytes = 0;
    }
}

impl Default for ProgressThrottle {
    fn default() -> Self {
        Self::default_interval()
    }
}

fn per_second(bytes: u64, elapsed: Duration) -> u64 {
    let millis = elapsed.as_millis().max(1);
    let rate = u128::from(bytes) * 1000 / millis;
    u64::try_from(rate).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throttle_first_emit() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(100));
        assert_eq!(throttle.should_emit(), Some(0));
    }

    #[test]
    fn test_throttle_respects_interval() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(50));
        assert!(throttle.should_emit().is_some());
        assert!(throttle.should_emit().is_none()); // Too soon

        std::thread::sleep(Duration::from_millis(60));
        assert!(throttle.should_emit().is_some());
    }

    #[test]
    fn test_throttle_measures_window() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(20));
        throttle.should_emit();
        throttle.record(4096);
        std::thread::sleep(Duration::from_millis(30));
        let rate = throttle.should_emit().unwrap();
        assert!(rate > 0);
        assert!(rate <= 4096 * 1000 / 30);
    }

    #[test]
    fn test_throttle_reset() {
        let mut throttle = ProgressThrottle::new(Duration::from_millis(100));
        throttle.should_emit();
        assert!(throttle.should_emit().is_none());

        throttle.record(10);
        throttle.reset();
        assert_eq!(throttle.should_emit(), Some(0));
    }

    #[test]
    fn test_per_second() {
        assert_eq!(per_second(1000, Duration::from_millis(500)), 2000);
        assert_eq!(per_second(5, Duration::ZERO), 5000);
    }
}
