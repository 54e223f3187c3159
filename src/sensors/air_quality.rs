use log::debug;

use super::analog::{average, AnalogInput, Calibration};
use super::{ReadError, SensorReadout};
use crate::config::ChannelConfig;
use crate::constants::ANALOG_AVERAGE_SAMPLES;

/// MQ-135 style gas sensor on an analog pin, reported as an approximate ppm figure.
///
/// The heater needs a warm-up period after power on; until `warmup_reads` reads have been
/// taken the sensor reports `NotReady` so early, unstable values never reach a payload.
pub struct AirQualitySensor<A> {
    input: A,
    calibration: Calibration,
    warmup_reads: u32,
}

impl<A: AnalogInput> AirQualitySensor<A> {
    pub fn new(input: A, calibration: Calibration, warmup_reads: u32) -> Self {
        Self {
            input,
            calibration,
            warmup_reads,
        }
    }
}

impl<A: AnalogInput> SensorReadout for AirQualitySensor<A> {
    async fn read(&mut self, channel: &ChannelConfig) -> Result<f32, ReadError> {
        let raw = average(&mut self.input, ANALOG_AVERAGE_SAMPLES).await?;

        if self.warmup_reads > 0 {
            self.warmup_reads -= 1;
            debug!("{}: warming up, {} reads left", channel.name, self.warmup_reads);
            return Err(ReadError::NotReady);
        }

        Ok(self.calibration.apply(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ChannelKind;
    use crate::sensors::analog::tests::Scripted;
    use embassy_futures::block_on;

    const AQ: ChannelConfig = ChannelConfig {
        name: "aq",
        kind: ChannelKind::AirQuality,
        pin: 32,
    };

    #[test]
    fn test_not_ready_during_warmup() {
        let input = Scripted::constant(0, ANALOG_AVERAGE_SAMPLES * 3);
        let mut sensor = AirQualitySensor::new(input, Calibration::new(400.0, 5000.0), 2);

        assert_eq!(block_on(sensor.read(&AQ)), Err(ReadError::NotReady));
        assert_eq!(block_on(sensor.read(&AQ)), Err(ReadError::NotReady));
        assert_eq!(block_on(sensor.read(&AQ)), Ok(400.0));
    }
}
