use core::fmt;

use crate::constants::{CHANNEL_NAME_MAX, DEVICE_ID_MAX, DEVICE_KEY, MAX_CHANNELS, TIMESTAMP_KEY};
use crate::telemetry::needs_escaping;

pub struct Config {
    // Device ID (used as MQTT client id, DHCP hostname and in every payload)
    pub device_id: &'static str,

    // Wi-Fi SSID to connect to
    pub wifi_ssid: &'static str,

    // Wi-Fi pre-shared key (password), empty for open networks
    pub wifi_psk: &'static str,

    // MQTT broker hostname or IP address
    pub mqtt_hostname: &'static str,

    // MQTT port (usually 1883)
    pub mqtt_port: u16,

    // MQTT username for authentication (optional)
    pub mqtt_username: Option<&'static str>,

    // MQTT password for authentication (optional)
    pub mqtt_password: Option<&'static str>,

    // MQTT topic to publish telemetry to
    pub mqtt_topic: &'static str,

    // Delivery guarantee requested for each publish
    pub mqtt_qos: Qos,

    // MQTT keep-alive negotiated with the broker
    pub mqtt_keep_alive_secs: u16,

    // Interval between two sampling cycles
    pub telemetry_interval_ms: u64,

    // Upper bound for a single channel read
    pub read_timeout_ms: u64,

    // Upper bound for TCP connect plus MQTT handshake
    pub connect_timeout_ms: u64,

    // Upper bound for a single publish
    pub publish_timeout_ms: u64,

    // First reconnect delay after a failure
    pub backoff_initial_ms: u64,

    // Reconnect delay ceiling
    pub backoff_max_ms: u64,

    // Sensor channels, in payload order
    pub channels: &'static [ChannelConfig],
}

/// One sensor channel: the payload key, what it measures and where it is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelConfig {
    pub name: &'static str,
    pub kind: ChannelKind,
    // GPIO number, only meaningful to the board wiring
    pub pin: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    Temperature,
    Humidity,
    Light,
    Sound,
    AirQuality,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Qos {
    AtMostOnce,
    AtLeastOnce,
}

#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    DeviceIdEmpty,
    DeviceIdTooLong,
    // Names that JSON would escape do not survive the payload unchanged
    EscapedCharacter(&'static str),
    HostnameEmpty,
    PortZero,
    TopicEmpty,
    TopicWildcard,
    IntervalZero,
    TimeoutZero(&'static str),
    PublishTimeoutExceedsInterval,
    BackoffInitialZero,
    BackoffCeilingBelowInitial,
    KeepAliveZero,
    NoChannels,
    TooManyChannels,
    ChannelNameEmpty,
    ChannelNameTooLong(&'static str),
    ChannelNameReserved(&'static str),
    DuplicateChannel(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceIdEmpty => write!(f, "device_id must not be empty"),
            Self::DeviceIdTooLong => {
                write!(f, "device_id exceeds {} bytes", DEVICE_ID_MAX)
            }
            Self::EscapedCharacter(name) => write!(
                f,
                "'{}' must not contain quotes, backslashes or control characters",
                name
            ),
            Self::HostnameEmpty => write!(f, "mqtt_hostname must not be empty"),
            Self::PortZero => write!(f, "mqtt_port must not be 0"),
            Self::TopicEmpty => write!(f, "mqtt_topic must not be empty"),
            Self::TopicWildcard => write!(f, "mqtt_topic must not contain '+' or '#'"),
            Self::IntervalZero => write!(f, "telemetry_interval_ms must be greater than 0"),
            Self::TimeoutZero(field) => write!(f, "{} must be greater than 0", field),
            Self::PublishTimeoutExceedsInterval => {
                write!(f, "publish_timeout_ms must be shorter than telemetry_interval_ms")
            }
            Self::BackoffInitialZero => write!(f, "backoff_initial_ms must be greater than 0"),
            Self::BackoffCeilingBelowInitial => {
                write!(f, "backoff_max_ms must not be below backoff_initial_ms")
            }
            Self::KeepAliveZero => write!(f, "mqtt_keep_alive_secs must be greater than 0"),
            Self::NoChannels => write!(f, "at least one channel is required"),
            Self::TooManyChannels => write!(f, "more than {} channels", MAX_CHANNELS),
            Self::ChannelNameEmpty => write!(f, "channel name must not be empty"),
            Self::ChannelNameTooLong(name) => {
                write!(f, "channel name '{}' exceeds {} bytes", name, CHANNEL_NAME_MAX)
            }
            Self::ChannelNameReserved(name) => {
                write!(f, "channel name '{}' is a reserved payload key", name)
            }
            Self::DuplicateChannel(name) => write!(f, "channel '{}' is configured twice", name),
        }
    }
}

impl Config {
    /// Checks every injected value once at boot so the control loop can rely on them.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device_id.is_empty() {
            return Err(ConfigError::DeviceIdEmpty);
        }
        if self.device_id.len() > DEVICE_ID_MAX {
            return Err(ConfigError::DeviceIdTooLong);
        }
        if needs_escaping(self.device_id) {
            return Err(ConfigError::EscapedCharacter(self.device_id));
        }
        if self.mqtt_hostname.is_empty() {
            return Err(ConfigError::HostnameEmpty);
        }
        if self.mqtt_port == 0 {
            return Err(ConfigError::PortZero);
        }
        if self.mqtt_topic.is_empty() {
            return Err(ConfigError::TopicEmpty);
        }
        if self.mqtt_topic.contains(['+', '#']) {
            return Err(ConfigError::TopicWildcard);
        }
        if self.mqtt_keep_alive_secs == 0 {
            return Err(ConfigError::KeepAliveZero);
        }

        if self.telemetry_interval_ms == 0 {
            return Err(ConfigError::IntervalZero);
        }
        for (field, value) in [
            ("read_timeout_ms", self.read_timeout_ms),
            ("connect_timeout_ms", self.connect_timeout_ms),
            ("publish_timeout_ms", self.publish_timeout_ms),
        ] {
            if value == 0 {
                return Err(ConfigError::TimeoutZero(field));
            }
        }
        if self.publish_timeout_ms >= self.telemetry_interval_ms {
            return Err(ConfigError::PublishTimeoutExceedsInterval);
        }

        if self.backoff_initial_ms == 0 {
            return Err(ConfigError::BackoffInitialZero);
        }
        if self.backoff_max_ms < self.backoff_initial_ms {
            return Err(ConfigError::BackoffCeilingBelowInitial);
        }

        self.validate_channels()
    }

    fn validate_channels(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        if self.channels.len() > MAX_CHANNELS {
            return Err(ConfigError::TooManyChannels);
        }

        for (i, channel) in self.channels.iter().enumerate() {
            if channel.name.is_empty() {
                return Err(ConfigError::ChannelNameEmpty);
            }
            if channel.name.len() > CHANNEL_NAME_MAX {
                return Err(ConfigError::ChannelNameTooLong(channel.name));
            }
            if needs_escaping(channel.name) {
                return Err(ConfigError::EscapedCharacter(channel.name));
            }
            if channel.name == DEVICE_KEY || channel.name == TIMESTAMP_KEY {
                return Err(ConfigError::ChannelNameReserved(channel.name));
            }
            if self.channels[..i].iter().any(|c| c.name == channel.name) {
                return Err(ConfigError::DuplicateChannel(channel.name));
            }
        }

        Ok(())
    }

    /// The ingest side takes the device from the second topic segment
    /// (`<prefix>/<device>/...`). Returns that segment when it disagrees with `device_id`.
    pub fn topic_device_mismatch(&self) -> Option<&'static str> {
        let segment = self.mqtt_topic.split('/').nth(1)?;
        if segment == self.device_id {
            None
        } else {
            Some(segment)
        }
    }
}
