use log::debug;

use super::analog::{average, AnalogInput, Calibration};
use super::{ReadError, SensorReadout};
use crate::config::ChannelConfig;
use crate::constants::ANALOG_AVERAGE_SAMPLES;

/// Photoresistor module on an analog pin, reported in lux.
pub struct LightSensor<A> {
    input: A,
    calibration: Calibration,
}

impl<A: AnalogInput> LightSensor<A> {
    pub fn new(input: A, calibration: Calibration) -> Self {
        Self { input, calibration }
    }
}

impl<A: AnalogInput> SensorReadout for LightSensor<A> {
    async fn read(&mut self, channel: &ChannelConfig) -> Result<f32, ReadError> {
        let raw = average(&mut self.input, ANALOG_AVERAGE_SAMPLES).await?;
        let lux = self.calibration.apply(raw);
        debug!("{}: raw {:.0} -> {:.1} lx", channel.name, raw, lux);
        Ok(lux)
    }
}
