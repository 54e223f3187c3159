use super::ReadError;
use crate::constants::ADC_FULL_SCALE;

/// One ADC conversion on a fixed pin.
pub trait AnalogInput {
    async fn sample(&mut self) -> Result<u16, ReadError>;
}

/// Linear mapping from raw ADC counts to a physical value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    // Physical value at 0 counts
    pub min: f32,
    // Physical value at full scale
    pub max: f32,
    // Counts decrease as the quantity increases (e.g. photoresistor divider to ground)
    pub inverted: bool,
}

impl Calibration {
    pub const fn new(min: f32, max: f32) -> Self {
        Self {
            min,
            max,
            inverted: false,
        }
    }

    pub const fn inverted(mut self) -> Self {
        self.inverted = !self.inverted;
        self
    }

    /// Maps a (possibly averaged) raw reading; counts above full scale are clamped.
    pub fn apply(&self, raw: f32) -> f32 {
        let full = ADC_FULL_SCALE as f32;
        let mut ratio = raw.clamp(0.0, full) / full;
        if self.inverted {
            ratio = 1.0 - ratio;
        }
        self.min + ratio * (self.max - self.min)
    }
}

/// Averages `n` conversions, giving up on the first failing one.
pub(crate) async fn average<A: AnalogInput>(input: &mut A, n: usize) -> Result<f32, ReadError> {
    let mut sum: u32 = 0;
    for _ in 0..n {
        sum += u32::from(input.sample().await?);
    }
    Ok(sum as f32 / n.max(1) as f32)
}
