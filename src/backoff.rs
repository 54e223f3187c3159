use embassy_time::Duration;

/// Capped exponential delay between reconnect attempts.
///
/// The k-th consecutive failure waits `min(initial * 2^(k-1), ceiling)`; there is no jitter so
/// the sequence never decreases until [`Backoff::reset`] is called.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    ceiling: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(initial: Duration, ceiling: Duration) -> Self {
        Self {
            initial,
            ceiling: ceiling.max(initial),
            failures: 0,
        }
    }

    /// Records one more failure and returns how long to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.delay_for(self.failures);
        self.failures = self.failures.saturating_add(1);
        delay
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    fn delay_for(&self, previous_failures: u32) -> Duration {
        let scaled = 1u64
            .checked_shl(previous_failures)
            .and_then(|factor| self.initial.as_ticks().checked_mul(factor));
        match scaled {
            Some(ticks) if ticks < self.ceiling.as_ticks() => Duration::from_ticks(ticks),
            _ => self.ceiling,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delay_doubles_then_holds() {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(10));
        let delays: std::vec::Vec<u64> = (0..6).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, [1, 2, 4, 8, 10, 10]);
        assert_eq!(backoff.failures(), 6);
    }

    #[test]
    fn test_delays_are_non_decreasing_and_capped() {
        let ceiling = Duration::from_millis(60_000);
        let mut backoff = Backoff::new(Duration::from_millis(750), ceiling);
        let mut previous = Duration::from_ticks(0);
        for _ in 0..200 {
            let delay = backoff.next_delay();
            assert!(delay >= previous);
            assert!(delay <= ceiling);
            previous = delay;
        }
        assert_eq!(previous, ceiling);
    }

    #[test]
    fn test_reset_starts_over() {
        let mut backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1_000));
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_ceiling_below_initial_is_raised() {
        let mut backoff = Backoff::new(Duration::from_millis(500), Duration::from_millis(100));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(500));
    }
}
