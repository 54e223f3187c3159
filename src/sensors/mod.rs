use core::fmt;

use embassy_time::{with_timeout, Duration};

use crate::config::{ChannelConfig, ChannelKind};

pub mod air_quality;
pub mod analog;
pub mod dht22;
pub mod latched;
pub mod light;
pub mod sound;

pub use air_quality::AirQualitySensor;
pub use analog::{AnalogInput, Calibration};
pub use dht22::Dht22;
pub use latched::LatchedReadout;
pub use light::LightSensor;
pub use sound::SoundSensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadError {
    // The read did not complete within its time budget
    Timeout,
    // Bus or pin level fault, checksum mismatch
    Hardware,
    // The sensor has no fresh value yet
    NotReady,
    // No sensor fitted for this kind of channel
    Unsupported,
}

impl fmt::Display for ReadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "read timed out"),
            Self::Hardware => write!(f, "hardware fault"),
            Self::NotReady => write!(f, "no value available yet"),
            Self::Unsupported => write!(f, "no sensor fitted"),
        }
    }
}

/// Acquires one physical quantity for a channel.
pub trait SensorReadout {
    async fn read(&mut self, channel: &ChannelConfig) -> Result<f32, ReadError>;
}

/// Runs a read under a time budget so a stuck sensor cannot stall the sampling pass.
pub async fn read_with_timeout<R: SensorReadout>(
    readout: &mut R,
    channel: &ChannelConfig,
    timeout: Duration,
) -> Result<f32, ReadError> {
    with_timeout(timeout, readout.read(channel))
        .await
        .map_err(|_| ReadError::Timeout)?
}

/// The sensors fitted on the board, dispatched by channel kind.
pub struct Sensors<C, L, S, A> {
    pub climate: Option<C>,
    pub light: Option<L>,
    pub sound: Option<S>,
    pub air_quality: Option<A>,
}

impl<C, L, S, A> Default for Sensors<C, L, S, A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, L, S, A> Sensors<C, L, S, A> {
    pub fn new() -> Self {
        Self {
            climate: None,
            light: None,
            sound: None,
            air_quality: None,
        }
    }

    pub fn with_climate(mut self, sensor: C) -> Self {
        self.climate = Some(sensor);
        self
    }

    pub fn with_light(mut self, sensor: L) -> Self {
        self.light = Some(sensor);
        self
    }

    pub fn with_sound(mut self, sensor: S) -> Self {
        self.sound = Some(sensor);
        self
    }

    pub fn with_air_quality(mut self, sensor: A) -> Self {
        self.air_quality = Some(sensor);
        self
    }
}

async fn read_fitted<R: SensorReadout>(
    sensor: &mut Option<R>,
    channel: &ChannelConfig,
) -> Result<f32, ReadError> {
    match sensor {
        Some(sensor) => sensor.read(channel).await,
        None => Err(ReadError::Unsupported),
    }
}

impl<C, L, S, A> SensorReadout for Sensors<C, L, S, A>
where
    C: SensorReadout,
    L: SensorReadout,
    S: SensorReadout,
    A: SensorReadout,
{
    async fn read(&mut self, channel: &ChannelConfig) -> Result<f32, ReadError> {
        match channel.kind {
            ChannelKind::Temperature | ChannelKind::Humidity => {
                read_fitted(&mut self.climate, channel).await
            }
            ChannelKind::Light => read_fitted(&mut self.light, channel).await,
            ChannelKind::Sound => read_fitted(&mut self.sound, channel).await,
            ChannelKind::AirQuality => read_fitted(&mut self.air_quality, channel).await,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use embassy_futures::block_on;
    use embassy_time::Timer;

    /// Returns a fixed value, or a fixed error.
    pub(crate) struct Fixed(pub Result<f32, ReadError>);

    impl SensorReadout for Fixed {
        async fn read(&mut self, _channel: &ChannelConfig) -> Result<f32, ReadError> {
            self.0
        }
    }

    struct Stuck;

    impl SensorReadout for Stuck {
        async fn read(&mut self, _channel: &ChannelConfig) -> Result<f32, ReadError> {
            Timer::after(Duration::from_secs(60)).await;
            Ok(0.0)
        }
    }

    const LUX: ChannelConfig = ChannelConfig {
        name: "lux",
        kind: ChannelKind::Light,
        pin: 34,
    };

    const SOUND: ChannelConfig = ChannelConfig {
        name: "sound",
        kind: ChannelKind::Sound,
        pin: 35,
    };

    const TEMPERATURE: ChannelConfig = ChannelConfig {
        name: "t",
        kind: ChannelKind::Temperature,
        pin: 15,
    };

    #[test]
    fn test_dispatch_by_kind() {
        let mut sensors: Sensors<Fixed, Fixed, Fixed, Fixed> = Sensors::new()
            .with_climate(Fixed(Ok(21.5)))
            .with_light(Fixed(Ok(300.0)));

        assert_eq!(block_on(sensors.read(&TEMPERATURE)), Ok(21.5));
        assert_eq!(block_on(sensors.read(&LUX)), Ok(300.0));
        assert_eq!(
            block_on(sensors.read(&SOUND)),
            Err(ReadError::Unsupported)
        );
    }

    #[test]
    fn test_read_with_timeout_gives_up() {
        let result = block_on(read_with_timeout(
            &mut Stuck,
            &LUX,
            Duration::from_millis(20),
        ));
        assert_eq!(result, Err(ReadError::Timeout));
    }

    #[test]
    fn test_read_with_timeout_passes_errors_through() {
        let result = block_on(read_with_timeout(
            &mut Fixed(Err(ReadError::Hardware)),
            &LUX,
            Duration::from_millis(20),
        ));
        assert_eq!(result, Err(ReadError::Hardware));
    }
}
