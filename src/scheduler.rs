use embassy_time::{Duration, Instant};
use log::debug;

/// One sampling opportunity handed out by the [`Scheduler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    // Index of the period boundary that produced this tick
    pub seq: u64,
    // When the boundary was due
    pub due: Instant,
}

/// Fixed-period tick source with a skip policy.
///
/// Boundary `n` falls at `start + n * period`, so late wake-ups never shift later ticks. At most
/// one cycle is open at a time: a boundary reached while a cycle is still sampling is skipped and
/// counted, never queued.
#[derive(Debug)]
pub struct Scheduler {
    start: Instant,
    period: Duration,
    next_seq: u64,
    in_cycle: bool,
    skipped: u32,
}

impl Scheduler {
    pub fn new(start: Instant, period: Duration) -> Self {
        Self {
            start,
            period: period.max(Duration::from_ticks(1)),
            next_seq: 0,
            in_cycle: false,
            skipped: 0,
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn next_deadline(&self) -> Instant {
        self.boundary(self.next_seq)
    }

    pub fn in_cycle(&self) -> bool {
        self.in_cycle
    }

    /// Boundaries that passed without starting a cycle.
    pub fn skipped(&self) -> u32 {
        self.skipped
    }

    /// Opens a cycle when a boundary is due and none is running.
    ///
    /// If several boundaries are overdue only the latest one starts a cycle; the older ones are
    /// counted as skipped.
    pub fn poll(&mut self, now: Instant) -> Option<Tick> {
        if now < self.next_deadline() {
            return None;
        }

        let latest = self.latest_boundary(now);
        if self.in_cycle {
            self.skip_through(latest);
            return None;
        }

        if latest > self.next_seq {
            self.skip_through(latest - 1);
        }
        self.next_seq = latest + 1;
        self.in_cycle = true;
        Some(Tick {
            seq: latest,
            due: self.boundary(latest),
        })
    }

    /// Closes the open cycle. Boundaries reached while it was open are skipped, so the next
    /// deadline is the first boundary strictly after `now`.
    pub fn finish_sampling(&mut self, now: Instant) {
        self.in_cycle = false;
        if now >= self.next_deadline() {
            let latest = self.latest_boundary(now);
            self.skip_through(latest);
        }
    }

    fn skip_through(&mut self, seq: u64) {
        if seq < self.next_seq {
            return;
        }
        let missed = seq - self.next_seq + 1;
        debug!("Skipping {} tick(s), cycle still running", missed);
        self.skipped = self
            .skipped
            .saturating_add(u32::try_from(missed).unwrap_or(u32::MAX));
        self.next_seq = seq + 1;
    }

    fn latest_boundary(&self, now: Instant) -> u64 {
        now.saturating_duration_since(self.start).as_ticks() / self.period.as_ticks()
    }

    fn boundary(&self, seq: u64) -> Instant {
        self.start + Duration::from_ticks(self.period.as_ticks().saturating_mul(seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PERIOD_MS: u64 = 5_000;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn scheduler() -> Scheduler {
        Scheduler::new(at(0), Duration::from_millis(PERIOD_MS))
    }

    #[test]
    fn test_first_tick_is_immediate() {
        let mut scheduler = scheduler();
        assert_eq!(
            scheduler.poll(at(0)),
            Some(Tick {
                seq: 0,
                due: at(0)
            })
        );
        assert!(scheduler.in_cycle());
    }

    #[test]
    fn test_ticks_follow_the_period() {
        let mut scheduler = scheduler();
        for n in 0..5 {
            let now = at(n * PERIOD_MS + 3);
            let tick = scheduler.poll(now).unwrap();
            assert_eq!(tick.seq, n);
            assert_eq!(tick.due, at(n * PERIOD_MS));
            scheduler.finish_sampling(now + Duration::from_millis(100));
            assert_eq!(scheduler.poll(now + Duration::from_millis(200)), None);
            assert_eq!(scheduler.next_deadline(), at((n + 1) * PERIOD_MS));
        }
        assert_eq!(scheduler.skipped(), 0);
    }

    #[test]
    fn test_no_overlapping_cycles() {
        let mut scheduler = scheduler();
        scheduler.poll(at(0)).unwrap();

        assert_eq!(scheduler.poll(at(PERIOD_MS)), None);
        assert_eq!(scheduler.poll(at(2 * PERIOD_MS + 1)), None);
        assert_eq!(scheduler.skipped(), 2);

        scheduler.finish_sampling(at(2 * PERIOD_MS + 10));
        assert_eq!(scheduler.next_deadline(), at(3 * PERIOD_MS));
        assert_eq!(scheduler.poll(at(2 * PERIOD_MS + 20)), None);

        let tick = scheduler.poll(at(3 * PERIOD_MS)).unwrap();
        assert_eq!(tick.seq, 3);
    }

    #[test]
    fn test_slow_cycle_skips_passed_boundaries() {
        let mut scheduler = scheduler();
        scheduler.poll(at(0)).unwrap();

        // Sampling overran one and a half periods without the loop polling in between
        scheduler.finish_sampling(at(PERIOD_MS * 3 / 2));
        assert_eq!(scheduler.skipped(), 1);
        assert_eq!(scheduler.next_deadline(), at(2 * PERIOD_MS));
    }

    #[test]
    fn test_finishing_on_a_boundary_skips_it() {
        let mut scheduler = scheduler();
        scheduler.poll(at(0)).unwrap();
        scheduler.finish_sampling(at(PERIOD_MS));
        assert_eq!(scheduler.next_deadline(), at(2 * PERIOD_MS));
        assert_eq!(scheduler.skipped(), 1);
    }

    #[test]
    fn test_late_poll_starts_latest_boundary() {
        let mut scheduler = scheduler();
        scheduler.poll(at(0)).unwrap();
        scheduler.finish_sampling(at(10));

        let tick = scheduler.poll(at(3 * PERIOD_MS + 7)).unwrap();
        assert_eq!(tick.seq, 3);
        assert_eq!(tick.due, at(3 * PERIOD_MS));
        assert_eq!(scheduler.skipped(), 2);
    }

    #[test]
    fn test_sequence_is_strictly_increasing() {
        let mut scheduler = scheduler();
        let mut last = None;
        let mut now = 0;
        while now < 20 * PERIOD_MS {
            if let Some(tick) = scheduler.poll(at(now)) {
                if let Some(previous) = last {
                    assert!(tick.seq > previous);
                }
                last = Some(tick.seq);
                scheduler.finish_sampling(at(now + 7_300));
            }
            now += 250;
        }
        assert!(scheduler.skipped() > 0);
    }
}
