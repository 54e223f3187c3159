use core::fmt;

use esp32_telemetry_node::sensors::Calibration;
use esp32_telemetry_node::{ChannelConfig, ChannelKind};

// Reference wiring of the node
pub const DHT22_PIN: u8 = 15;
pub const LIGHT_PIN: u8 = 34;
pub const SOUND_PIN: u8 = 35;
pub const AIR_QUALITY_PIN: u8 = 32;

/// LDR divider to ground: brighter light pulls the pin down
pub const LIGHT_CALIBRATION: Calibration = Calibration::new(0.0, 1000.0).inverted();
/// Peak-to-peak swing mapped to a 0..100 loudness scale
pub const SOUND_CALIBRATION: Calibration = Calibration::new(0.0, 100.0);
/// MQ-135 output mapped to its nominal 10..1000 ppm range
pub const AIR_QUALITY_CALIBRATION: Calibration = Calibration::new(10.0, 1000.0);
/// Reads discarded while the MQ-135 heater settles
pub const AIR_QUALITY_WARMUP_READS: u32 = 12;

/// Interval between two sound level windows in the background task
pub const SOUND_WINDOW_PERIOD_MS: u64 = 250;

#[derive(Debug)]
pub struct WiringError {
    pub channel: &'static str,
    pub configured: u8,
    pub wired: u8,
}

impl fmt::Display for WiringError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "channel '{}' is configured on GPIO{} but the board wires it to GPIO{}",
            self.channel, self.configured, self.wired
        )
    }
}

pub fn wired_pin(kind: ChannelKind) -> u8 {
    match kind {
        ChannelKind::Temperature | ChannelKind::Humidity => DHT22_PIN,
        ChannelKind::Light => LIGHT_PIN,
        ChannelKind::Sound => SOUND_PIN,
        ChannelKind::AirQuality => AIR_QUALITY_PIN,
    }
}

/// Pins are fixed by the board, so a channel configured on another pin would silently read the
/// wrong sensor.
pub fn check_wiring(channels: &[ChannelConfig]) -> Result<(), WiringError> {
    for channel in channels {
        let wired = wired_pin(channel.kind);
        if channel.pin != wired {
            return Err(WiringError {
                channel: channel.name,
                configured: channel.pin,
                wired,
            });
        }
    }
    Ok(())
}
