use embassy_time::Duration;
use log::{debug, warn};

use crate::config::{ChannelConfig, Config};
use crate::sensors::{read_with_timeout, SensorReadout};
use crate::telemetry::{self, Reading, TelemetrySample};

/// Runs one acquisition pass over every configured channel.
pub struct Sampler<R> {
    readout: R,
    device_id: &'static str,
    channels: &'static [ChannelConfig],
    read_timeout: Duration,
}

impl<R: SensorReadout> Sampler<R> {
    pub fn new(readout: R, config: &Config) -> Self {
        Self {
            readout,
            device_id: config.device_id,
            channels: config.channels,
            read_timeout: Duration::from_millis(config.read_timeout_ms),
        }
    }

    /// Reads every channel in configuration order. A failed read is recorded as unavailable so
    /// the sample always carries one entry per channel.
    pub async fn sample(&mut self, timestamp_ms: u64) -> Result<TelemetrySample, telemetry::Error> {
        let mut builder = TelemetrySample::builder(self.device_id, timestamp_ms)?;

        for channel in self.channels {
            let result = read_with_timeout(&mut self.readout, channel, self.read_timeout).await;
            if let Err(e) = result {
                warn!("Failed to read channel {}: {}", channel.name, e);
            }
            builder.record(channel.name, Reading::from(result))?;
        }

        let sample = builder.build();
        debug!(
            "Sampled {} channel(s) at {} ms, {} unavailable",
            sample.len(),
            timestamp_ms,
            sample.unavailable()
        );
        Ok(sample)
    }
}
