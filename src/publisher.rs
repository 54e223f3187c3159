use log::{debug, error, warn};

use crate::config::{Config, Qos};
use crate::connection::{ConnectionManager, Link, PublishError};
use crate::telemetry::TelemetrySample;

/// Encodes samples and hands them to the connection on a fixed topic.
///
/// There is no retry: a sample that cannot be sent is dropped and the next tick carries fresh
/// data.
pub struct Publisher {
    topic: &'static str,
    qos: Qos,
}

impl Publisher {
    pub fn new(config: &Config) -> Self {
        Self {
            topic: config.mqtt_topic,
            qos: config.mqtt_qos,
        }
    }

    pub fn topic(&self) -> &'static str {
        self.topic
    }

    /// Returns the number of payload bytes handed to the broker. `session` is the connection
    /// and its open link, if any.
    pub async fn publish<L: Link>(
        &self,
        sample: &TelemetrySample,
        session: Option<(&mut ConnectionManager, &mut L)>,
    ) -> Result<usize, PublishError> {
        // Encoding completes before the transport is touched
        let payload = sample.encode().map_err(|e| {
            error!("Dropping sample taken at {} ms: {}", sample.timestamp_ms(), e);
            PublishError::Serialization(e)
        })?;

        let result = match session {
            Some((manager, link)) => {
                manager
                    .publish(Some(link), self.topic, &payload, self.qos)
                    .await
            }
            None => Err(PublishError::NotConnected),
        };

        match result {
            Ok(()) => {
                debug!(
                    "Published sample taken at {} ms ({} bytes)",
                    sample.timestamp_ms(),
                    payload.len()
                );
                Ok(payload.len())
            }
            Err(PublishError::NotConnected) => {
                debug!(
                    "Not connected, dropping sample taken at {} ms",
                    sample.timestamp_ms()
                );
                Err(PublishError::NotConnected)
            }
            Err(e) => {
                warn!(
                    "Failed to publish sample taken at {} ms: {}",
                    sample.timestamp_ms(),
                    e
                );
                Err(e)
            }
        }
    }
}
