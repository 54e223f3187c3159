/// Current firmware version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Size of the heap in DRAM (internal memory)
pub const HEAP_SIZE: usize = 72 * 1024;

/// Size of the TCP socket receive buffer
pub const RX_BUFFER_SIZE: usize = 4096;
/// Size of the TCP socket transmit buffer
pub const TX_BUFFER_SIZE: usize = 4096;

/// Size of the MQTT client receive buffer for application data
pub const MQTT_RX_BUFFER_SIZE: usize = 1024;
/// Size of the MQTT client transmit buffer for application data
pub const MQTT_TX_BUFFER_SIZE: usize = 1024;
/// Maximum number of MQTT v5 properties attached to a packet
pub const MQTT_MAX_PROPERTIES: usize = 5;

/// Maximum number of sensor channels in a sample
pub const MAX_CHANNELS: usize = 8;
/// Maximum length of a channel name (used as a payload key)
pub const CHANNEL_NAME_MAX: usize = 16;
/// Maximum length of the device identifier
pub const DEVICE_ID_MAX: usize = 32;
/// Capacity of the serialized telemetry payload
pub const PAYLOAD_CAPACITY: usize = 512;

/// Payload key holding the device identifier
pub const DEVICE_KEY: &str = "device";
/// Payload key holding the sample timestamp
pub const TIMESTAMP_KEY: &str = "ts";

/// Number of cycles between two statistics reports in the log
pub const STATS_REPORT_EVERY: u32 = 60;

/// Minimum time between two DHT22 bus transactions
pub const DHT22_MIN_INTERVAL_MS: u64 = 2_000;
/// Number of ADC conversions averaged for light and air quality readings
pub const ANALOG_AVERAGE_SAMPLES: usize = 8;
/// Number of ADC conversions in one sound level window
pub const SOUND_WINDOW_SAMPLES: usize = 64;
/// Full scale of the 12-bit ADC
pub const ADC_FULL_SCALE: u16 = 4095;

/// Delay before retrying Wi-Fi after a disconnect or failed attempt
pub const WIFI_RECONNECT_DELAY_MS: u64 = 5_000;
/// Upper bound for a single Wi-Fi association attempt
pub const WIFI_CONNECT_TIMEOUT_SECS: u64 = 30;
