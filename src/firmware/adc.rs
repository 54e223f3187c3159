use embassy_sync::{blocking_mutex::raw::NoopRawMutex, mutex::Mutex};
use embassy_time::{Duration, Timer};
use esp_hal::{
    analog::adc::{Adc, AdcChannel, AdcPin},
    peripherals::ADC1,
    Blocking,
};

use esp32_telemetry_node::sensors::AnalogInput;
use esp32_telemetry_node::ReadError;

pub type SharedAdc = Mutex<NoopRawMutex, Adc<'static, ADC1<'static>, Blocking>>;

/// Upper bound on conversion polls before the ADC is considered stuck
const MAX_POLLS: u32 = 100;

/// One ADC1 pin. ADC1 is shared between all analog sensors; each conversion holds the lock only
/// while it runs.
pub struct AdcInput<P> {
    adc: &'static SharedAdc,
    pin: AdcPin<P, ADC1<'static>>,
}

impl<P: AdcChannel> AdcInput<P> {
    pub fn new(adc: &'static SharedAdc, pin: AdcPin<P, ADC1<'static>>) -> Self {
        Self { adc, pin }
    }
}

impl<P: AdcChannel> AnalogInput for AdcInput<P> {
    async fn sample(&mut self) -> Result<u16, ReadError> {
        let mut adc = self.adc.lock().await;
        for _ in 0..MAX_POLLS {
            match adc.read_oneshot(&mut self.pin) {
                Ok(value) => return Ok(value),
                Err(nb::Error::WouldBlock) => Timer::after(Duration::from_micros(10)).await,
                Err(nb::Error::Other(_)) => return Err(ReadError::Hardware),
            }
        }
        Err(ReadError::Timeout)
    }
}
