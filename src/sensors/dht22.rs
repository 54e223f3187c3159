use dht_sensor::dht22::{self, Reading};
use dht_sensor::DhtError;
use embassy_time::{Delay, Duration, Instant};
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal_async::delay::DelayNs as AsyncDelayNs;
use log::{debug, warn};

use super::{ReadError, SensorReadout};
use crate::config::{ChannelConfig, ChannelKind};
use crate::constants::DHT22_MIN_INTERVAL_MS;

/// DHT22 temperature and humidity sensor on a single open-drain pin.
///
/// One bus transaction serves both the temperature and the humidity channel: the result is
/// kept for the sensor's minimum sampling period and handed out to whichever channel asks.
pub struct Dht22<P, D = Delay> {
    pin: P,
    delay: D,
    last: Option<(Reading, Instant)>,
}

impl<P> Dht22<P>
where
    P: InputPin + OutputPin,
{
    pub fn new(pin: P) -> Self {
        Self::with_delay(pin, Delay)
    }
}

impl<P, D> Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: AsyncDelayNs + DelayNs,
{
    /// Uses `delay` for the bit timing of the bus transaction.
    pub fn with_delay(pin: P, delay: D) -> Self {
        Self {
            pin,
            delay,
            last: None,
        }
    }

    fn cached(&self, now: Instant) -> Option<Reading> {
        let min_interval = Duration::from_millis(DHT22_MIN_INTERVAL_MS);
        match self.last {
            Some((reading, at)) if now.saturating_duration_since(at) < min_interval => {
                Some(reading)
            }
            _ => None,
        }
    }

    async fn reading(&mut self) -> Result<Reading, ReadError> {
        let now = Instant::now();
        if let Some(reading) = self.cached(now) {
            return Ok(reading);
        }

        match dht22::r#async::read(&mut self.delay, &mut self.pin).await {
            Ok(reading) => {
                debug!(
                    "DHT22: {:.1} C, {:.1} %RH",
                    reading.temperature, reading.relative_humidity
                );
                self.last = Some((reading, now));
                Ok(reading)
            }
            Err(DhtError::Timeout) => {
                warn!("DHT22: no response from sensor");
                Err(ReadError::Timeout)
            }
            Err(DhtError::ChecksumMismatch) => {
                warn!("DHT22: checksum mismatch");
                Err(ReadError::Hardware)
            }
            Err(DhtError::PinError(e)) => {
                warn!("DHT22: pin error: {:?}", e);
                Err(ReadError::Hardware)
            }
        }
    }
}

impl<P, D> SensorReadout for Dht22<P, D>
where
    P: InputPin + OutputPin,
    D: AsyncDelayNs + DelayNs,
{
    async fn read(&mut self, channel: &ChannelConfig) -> Result<f32, ReadError> {
        match channel.kind {
            ChannelKind::Temperature => Ok(self.reading().await?.temperature),
            ChannelKind::Humidity => Ok(self.reading().await?.relative_humidity),
            _ => Err(ReadError::Unsupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embedded_hal::digital::{ErrorKind, ErrorType};

    /// A pin whose every operation fails, standing in for a disconnected sensor.
    struct DeadPin;

    impl ErrorType for DeadPin {
        type Error = ErrorKind;
    }

    impl InputPin for DeadPin {
        fn is_high(&mut self) -> Result<bool, Self::Error> {
            Err(ErrorKind::Other)
        }

        fn is_low(&mut self) -> Result<bool, Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    impl OutputPin for DeadPin {
        fn set_low(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }

        fn set_high(&mut self) -> Result<(), Self::Error> {
            Err(ErrorKind::Other)
        }
    }

    const TEMPERATURE: ChannelConfig = ChannelConfig {
        name: "t",
        kind: ChannelKind::Temperature,
        pin: 15,
    };

    const HUMIDITY: ChannelConfig = ChannelConfig {
        name: "h",
        kind: ChannelKind::Humidity,
        pin: 15,
    };

    #[test]
    fn test_pin_fault_is_hardware_error() {
        let mut sensor = Dht22::new(DeadPin);
        assert_eq!(block_on(sensor.read(&TEMPERATURE)), Err(ReadError::Hardware));
    }

    #[test]
    fn test_explicit_delay_reports_pin_fault() {
        let mut sensor = Dht22::with_delay(DeadPin, Delay);
        assert_eq!(block_on(sensor.read(&HUMIDITY)), Err(ReadError::Hardware));
    }

    #[test]
    fn test_recent_transaction_serves_both_channels() {
        let mut sensor = Dht22::new(DeadPin);
        sensor.last = Some((
            Reading {
                temperature: 22.5,
                relative_humidity: 48.0,
            },
            Instant::now(),
        ));

        assert_eq!(block_on(sensor.read(&TEMPERATURE)), Ok(22.5));
        assert_eq!(block_on(sensor.read(&HUMIDITY)), Ok(48.0));
    }

    #[test]
    fn test_stale_transaction_is_not_reused() {
        let mut sensor = Dht22::new(DeadPin);
        let now = Instant::now();
        let reading = Reading {
            temperature: 22.5,
            relative_humidity: 48.0,
        };
        sensor.last = Some((reading, now));

        let later = now + Duration::from_millis(DHT22_MIN_INTERVAL_MS);
        assert_eq!(sensor.cached(later), None);
        assert_eq!(sensor.cached(now), Some(reading));
    }

    #[test]
    fn test_other_kinds_are_unsupported() {
        let mut sensor = Dht22::new(DeadPin);
        let lux = ChannelConfig {
            name: "lux",
            kind: ChannelKind::Light,
            pin: 34,
        };
        assert_eq!(block_on(sensor.read(&lux)), Err(ReadError::Unsupported));
    }
}
