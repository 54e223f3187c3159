use log::debug;

use super::analog::{AnalogInput, Calibration};
use super::{ReadError, SensorReadout};
use crate::config::ChannelConfig;
use crate::constants::SOUND_WINDOW_SAMPLES;

/// Microphone module on an analog pin. The level is the peak-to-peak swing over a short
/// window of conversions, mapped through the calibration.
pub struct SoundSensor<A> {
    input: A,
    calibration: Calibration,
}

impl<A: AnalogInput> SoundSensor<A> {
    pub fn new(input: A, calibration: Calibration) -> Self {
        Self { input, calibration }
    }

    /// Peak-to-peak amplitude in raw counts over one window.
    pub async fn measure_window(&mut self) -> Result<u16, ReadError> {
        let mut low = u16::MAX;
        let mut high = u16::MIN;
        for _ in 0..SOUND_WINDOW_SAMPLES {
            let sample = self.input.sample().await?;
            low = low.min(sample);
            high = high.max(sample);
        }
        Ok(high.saturating_sub(low))
    }

    pub fn level(&self, amplitude: u16) -> f32 {
        self.calibration.apply(f32::from(amplitude))
    }
}

impl<A: AnalogInput> SensorReadout for SoundSensor<A> {
    async fn read(&mut self, channel: &ChannelConfig) -> Result<f32, ReadError> {
        let amplitude = self.measure_window().await?;
        debug!("{}: peak-to-peak {}", channel.name, amplitude);
        Ok(self.level(amplitude))
    }
}
