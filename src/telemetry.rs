use core::fmt;

use heapless::{FnvIndexMap, String, Vec};
use serde::de::{Deserialize, Deserializer, Error as _, MapAccess, Visitor};
use serde::ser::{Serialize, SerializeMap, Serializer};

use crate::constants::{
    CHANNEL_NAME_MAX, DEVICE_ID_MAX, DEVICE_KEY, MAX_CHANNELS, PAYLOAD_CAPACITY, TIMESTAMP_KEY,
};
use crate::sensors::ReadError;

pub type ChannelName = String<CHANNEL_NAME_MAX>;
pub type DeviceId = String<DEVICE_ID_MAX>;
pub type Payload = Vec<u8, PAYLOAD_CAPACITY>;

#[derive(Debug, PartialEq)]
pub enum Error {
    DeviceIdTooLong,
    ChannelNameTooLong,
    // Quotes, backslashes and control characters would need escaping in the payload
    EscapedCharacter,
    TooManyChannels,
    DuplicateChannel,
    Serialization(serde_json_core::ser::Error),
    Deserialization(serde_json_core::de::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DeviceIdTooLong => write!(f, "device id exceeds {} bytes", DEVICE_ID_MAX),
            Self::ChannelNameTooLong => {
                write!(f, "channel name exceeds {} bytes", CHANNEL_NAME_MAX)
            }
            Self::EscapedCharacter => {
                write!(f, "names must not contain quotes, backslashes or control characters")
            }
            Self::TooManyChannels => write!(f, "more than {} channels", MAX_CHANNELS),
            Self::DuplicateChannel => write!(f, "channel recorded twice"),
            Self::Serialization(e) => write!(f, "payload encoding failed: {:?}", e),
            Self::Deserialization(e) => write!(f, "payload decoding failed: {:?}", e),
        }
    }
}

/// The value recorded for one channel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Reading {
    Value(f32),
    Unavailable,
}

impl Reading {
    pub fn value(&self) -> Option<f32> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Value(_))
    }
}

impl From<Option<f32>> for Reading {
    fn from(value: Option<f32>) -> Self {
        match value {
            Some(v) if v.is_finite() => Self::Value(v),
            _ => Self::Unavailable,
        }
    }
}

impl From<Result<f32, ReadError>> for Reading {
    fn from(result: Result<f32, ReadError>) -> Self {
        result.ok().into()
    }
}

/// Whether `name` would be escaped when written as a JSON string. Such names are refused so the
/// payload decodes back to exactly the same identifiers.
pub fn needs_escaping(name: &str) -> bool {
    name.chars().any(|c| c == '"' || c == '\\' || c.is_control())
}

fn device_id(value: &str) -> Result<DeviceId, Error> {
    if needs_escaping(value) {
        return Err(Error::EscapedCharacter);
    }
    DeviceId::try_from(value).map_err(|_| Error::DeviceIdTooLong)
}

/// Every reading taken at one sampling instant. Built once through [`SampleBuilder`] and
/// never modified afterwards.
#[derive(Debug, Clone)]
pub struct TelemetrySample {
    device_id: DeviceId,
    timestamp_ms: u64,
    readings: FnvIndexMap<ChannelName, Reading, MAX_CHANNELS>,
}

impl TelemetrySample {
    pub fn builder(device_id: &str, timestamp_ms: u64) -> Result<SampleBuilder, Error> {
        Ok(SampleBuilder {
            sample: TelemetrySample {
                device_id: self::device_id(device_id)?,
                timestamp_ms,
                readings: FnvIndexMap::new(),
            },
        })
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn get(&self, channel: &str) -> Option<Reading> {
        self.readings
            .iter()
            .find(|(name, _)| name.as_str() == channel)
            .map(|(_, reading)| *reading)
    }

    /// Channels in the order they were sampled.
    pub fn readings(&self) -> impl Iterator<Item = (&str, Reading)> {
        self.readings
            .iter()
            .map(|(name, reading)| (name.as_str(), *reading))
    }

    pub fn unavailable(&self) -> usize {
        self.readings.values().filter(|r| !r.is_available()).count()
    }

    /// Encodes the whole sample or nothing: the payload only exists once every field fits.
    pub fn encode(&self) -> Result<Payload, Error> {
        serde_json_core::to_vec::<_, PAYLOAD_CAPACITY>(self).map_err(Error::Serialization)
    }

    pub fn decode(payload: &[u8]) -> Result<Self, Error> {
        let (sample, _) = serde_json_core::from_slice(payload).map_err(Error::Deserialization)?;
        Ok(sample)
    }
}

// Channel order is part of the payload, so it is part of equality
impl PartialEq for TelemetrySample {
    fn eq(&self, other: &Self) -> bool {
        self.device_id == other.device_id
            && self.timestamp_ms == other.timestamp_ms
            && self.readings.iter().eq(other.readings.iter())
    }
}

pub struct SampleBuilder {
    sample: TelemetrySample,
}

impl SampleBuilder {
    pub fn record(&mut self, channel: &str, reading: Reading) -> Result<(), Error> {
        insert_reading(&mut self.sample.readings, channel, reading)
    }

    pub fn build(self) -> TelemetrySample {
        self.sample
    }
}

fn insert_reading(
    readings: &mut FnvIndexMap<ChannelName, Reading, MAX_CHANNELS>,
    channel: &str,
    reading: Reading,
) -> Result<(), Error> {
    if needs_escaping(channel) {
        return Err(Error::EscapedCharacter);
    }
    let name = ChannelName::try_from(channel).map_err(|_| Error::ChannelNameTooLong)?;
    match readings.insert(name, reading) {
        Ok(None) => Ok(()),
        Ok(Some(_)) => Err(Error::DuplicateChannel),
        Err(_) => Err(Error::TooManyChannels),
    }
}

impl Serialize for TelemetrySample {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.readings.len() + 2))?;
        map.serialize_entry(DEVICE_KEY, self.device_id.as_str())?;
        map.serialize_entry(TIMESTAMP_KEY, &self.timestamp_ms)?;
        for (name, reading) in self.readings.iter() {
            map.serialize_entry(name.as_str(), &reading.value())?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for TelemetrySample {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(SampleVisitor)
    }
}

struct SampleVisitor;

impl<'de> Visitor<'de> for SampleVisitor {
    type Value = TelemetrySample;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a telemetry object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut device_id: Option<DeviceId> = None;
        let mut timestamp_ms: Option<u64> = None;
        let mut readings = FnvIndexMap::new();

        while let Some(key) = map.next_key::<&'de str>()? {
            match key {
                DEVICE_KEY => {
                    let value: &'de str = map.next_value()?;
                    let value = self::device_id(value).map_err(A::Error::custom)?;
                    if device_id.replace(value).is_some() {
                        return Err(A::Error::duplicate_field(DEVICE_KEY));
                    }
                }
                TIMESTAMP_KEY => {
                    if timestamp_ms.replace(map.next_value()?).is_some() {
                        return Err(A::Error::duplicate_field(TIMESTAMP_KEY));
                    }
                }
                channel => {
                    let value: Option<f32> = map.next_value()?;
                    insert_reading(&mut readings, channel, value.into())
                        .map_err(A::Error::custom)?;
                }
            }
        }

        Ok(TelemetrySample {
            device_id: device_id.ok_or_else(|| A::Error::missing_field(DEVICE_KEY))?,
            timestamp_ms: timestamp_ms.ok_or_else(|| A::Error::missing_field(TIMESTAMP_KEY))?,
            readings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> TelemetrySample {
        let mut builder = TelemetrySample::builder("shrek-esp32", 5000).unwrap();
        builder.record("t", Reading::Value(23.5)).unwrap();
        builder.record("h", Reading::Value(41.2)).unwrap();
        builder.record("aq", Reading::Unavailable).unwrap();
        builder.build()
    }

    #[test]
    fn test_payload_layout() {
        let payload = sample().encode().unwrap();
        assert_eq!(
            core::str::from_utf8(&payload).unwrap(),
            r#"{"device":"shrek-esp32","ts":5000,"t":23.5,"h":41.2,"aq":null}"#
        );
    }

    #[test]
    fn test_decode_restores_channel_mapping() {
        let original = sample();
        let decoded = TelemetrySample::decode(&original.encode().unwrap()).unwrap();

        assert_eq!(decoded, original);
        let channels: std::vec::Vec<_> = decoded.readings().map(|(name, _)| name).collect();
        assert_eq!(channels, ["t", "h", "aq"]);
        assert_eq!(decoded.get("aq"), Some(Reading::Unavailable));
        assert_eq!(decoded.unavailable(), 1);
    }

    #[test]
    fn test_decode_accepts_integers_and_whitespace() {
        let decoded =
            TelemetrySample::decode(br#"{ "ts": 10, "device": "node", "lux": 300 }"#).unwrap();
        assert_eq!(decoded.device_id(), "node");
        assert_eq!(decoded.timestamp_ms(), 10);
        assert_eq!(decoded.get("lux"), Some(Reading::Value(300.0)));
    }

    #[test]
    fn test_decode_requires_device_and_timestamp() {
        assert!(TelemetrySample::decode(br#"{"ts":10,"t":1.0}"#).is_err());
        assert!(TelemetrySample::decode(br#"{"device":"node","t":1.0}"#).is_err());
    }

    #[test]
    fn test_builder_rejects_duplicates_and_overflow() {
        let mut builder = TelemetrySample::builder("node", 0).unwrap();
        builder.record("t", Reading::Value(1.0)).unwrap();
        assert_eq!(
            builder.record("t", Reading::Value(2.0)),
            Err(Error::DuplicateChannel)
        );

        let names = ["a", "b", "c", "d", "e", "f", "g"];
        for name in names {
            builder.record(name, Reading::Unavailable).unwrap();
        }
        assert_eq!(
            builder.record("overflow", Reading::Unavailable),
            Err(Error::TooManyChannels)
        );
    }

    #[test]
    fn test_non_finite_values_are_unavailable() {
        assert_eq!(Reading::from(Some(f32::NAN)), Reading::Unavailable);
        assert_eq!(Reading::from(Some(f32::INFINITY)), Reading::Unavailable);
        assert_eq!(Reading::from(Err(ReadError::Timeout)), Reading::Unavailable);
        assert_eq!(Reading::from(Ok(1.5)), Reading::Value(1.5));
    }

    #[test]
    fn test_channel_order_is_part_of_equality() {
        let mut builder = TelemetrySample::builder("shrek-esp32", 5000).unwrap();
        builder.record("h", Reading::Value(41.2)).unwrap();
        builder.record("t", Reading::Value(23.5)).unwrap();
        builder.record("aq", Reading::Unavailable).unwrap();
        assert_ne!(builder.build(), sample());
    }

    #[test]
    fn test_names_needing_escapes_are_refused() {
        assert_eq!(
            TelemetrySample::builder("lab\"node", 7).err(),
            Some(Error::EscapedCharacter)
        );
        assert_eq!(
            TelemetrySample::builder("lab\\node", 7).err(),
            Some(Error::EscapedCharacter)
        );

        let mut builder = TelemetrySample::builder("node", 7).unwrap();
        assert_eq!(
            builder.record("t\n", Reading::Value(1.0)),
            Err(Error::EscapedCharacter)
        );
        assert_eq!(builder.build().len(), 0);
    }

    #[test]
    fn test_escaped_payload_is_rejected_not_altered() {
        assert!(TelemetrySample::decode(br#"{"device":"lab\"node","ts":7,"t":1.0}"#).is_err());
        assert!(TelemetrySample::decode(br#"{"device":"node","ts":7,"t\u0041":1.0}"#).is_err());
    }

    #[test]
    fn test_device_id_too_long() {
        let long = "x".repeat(DEVICE_ID_MAX + 1);
        assert_eq!(
            TelemetrySample::builder(&long, 0).err(),
            Some(Error::DeviceIdTooLong)
        );
    }
}
