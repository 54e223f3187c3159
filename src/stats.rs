use core::fmt;

use crate::connection::PublishError;
use crate::telemetry::TelemetrySample;

/// Running counters of the control loop, reported periodically in the log.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct NodeStats {
    pub ticks: u32,
    pub samples: u32,
    pub published: u32,
    pub dropped: u32,
    pub skipped: u32,
    pub unavailable: u32,
    pub connect_attempts: u32,
    pub link_losses: u32,
}

impl NodeStats {
    pub fn record_sample(&mut self, sample: &TelemetrySample) {
        self.samples = self.samples.wrapping_add(1);
        self.unavailable = self.unavailable.wrapping_add(sample.unavailable() as u32);
    }

    pub fn record_publish(&mut self, result: &Result<usize, PublishError>) {
        match result {
            Ok(_) => self.published = self.published.wrapping_add(1),
            Err(_) => self.dropped = self.dropped.wrapping_add(1),
        }
    }
}

impl fmt::Display for NodeStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ticks={} samples={} published={} dropped={} skipped={} unavailable={} connects={} link_losses={}",
            self.ticks,
            self.samples,
            self.published,
            self.dropped,
            self.skipped,
            self.unavailable,
            self.connect_attempts,
            self.link_losses
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::Reading;

    #[test]
    fn test_counts_samples_and_outcomes() {
        let mut builder = TelemetrySample::builder("node", 0).unwrap();
        builder.record("t", Reading::Value(1.0)).unwrap();
        builder.record("h", Reading::Unavailable).unwrap();
        let sample = builder.build();

        let mut stats = NodeStats::default();
        stats.record_sample(&sample);
        stats.record_publish(&Ok(42));
        stats.record_publish(&Err(PublishError::NotConnected));

        assert_eq!(stats.samples, 1);
        assert_eq!(stats.unavailable, 1);
        assert_eq!(stats.published, 1);
        assert_eq!(stats.dropped, 1);
    }

    #[test]
    fn test_summary_line() {
        let stats = NodeStats {
            ticks: 3,
            published: 2,
            ..Default::default()
        };
        assert_eq!(
            stats.to_string(),
            "ticks=3 samples=0 published=2 dropped=0 skipped=0 unavailable=0 connects=0 link_losses=0"
        );
    }
}
