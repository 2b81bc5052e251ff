//! Pull-timeout backoff for a quiet replication stream
//!
//! Each pull waits for `current()`. A timeout doubles the wait, any received
//! event drops it back to the floor. Growth is unbounded but saturating.

use std::time::Duration;

/// Backoff state carried across iterations of the sync loop.
#[derive(Debug, Clone)]
pub struct PullBackoff {
    floor: Duration,
    current: Duration,
    timeouts: u32,
}

impl PullBackoff {
    pub fn new(floor: Duration) -> Self {
        Self {
            floor,
            current: floor,
            timeouts: 0,
        }
    }

    /// Wait for the next pull
    pub fn current(&self) -> Duration {
        self.current
    }

    /// Consecutive timeouts since the last reset
    pub fn timeouts(&self) -> u32 {
        self.timeouts
    }

    /// Record a pull that timed out; returns the next wait.
    pub fn on_timeout(&mut self) -> Duration {
        self.timeouts = self.timeouts.saturating_add(1);
        self.current = self.current.saturating_mul(2);
        self.current
    }

    /// Record a received event.
    pub fn reset(&mut self) {
        self.timeouts = 0;
        self.current = self.floor;
    }
}

impl Default for PullBackoff {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doubles_on_timeout() {
        let mut backoff = PullBackoff::new(Duration::from_millis(10));
        assert_eq!(backoff.current(), Duration::from_millis(10));

        for n in 1..=5u32 {
            let next = backoff.on_timeout();
            assert_eq!(next, Duration::from_millis(10 * 2u64.pow(n)));
        }
        assert_eq!(backoff.timeouts(), 5);
    }

    #[test]
    fn test_reset_to_floor() {
        let mut backoff = PullBackoff::default();
        backoff.on_timeout();
        backoff.on_timeout();
        assert_eq!(backoff.current(), Duration::from_secs(4));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_secs(1));
        assert_eq!(backoff.timeouts(), 0);
    }

    #[test]
    fn test_saturates() {
        let mut backoff = PullBackoff::new(Duration::MAX / 3);
        backoff.on_timeout();
        backoff.on_timeout();
        assert_eq!(backoff.current(), Duration::MAX);
        backoff.on_timeout();
        assert_eq!(backoff.current(), Duration::MAX);
    }
}
