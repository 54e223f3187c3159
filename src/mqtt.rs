use embedded_io_async::{Read, Write};
use log::{debug, error, info};
use rust_mqtt::{
    client::{
        client::MqttClient,
        client_config::{ClientConfig, MqttVersion},
    },
    packet::v5::{publish_packet::QualityOfService, reason_codes::ReasonCode},
    utils::rng_generator::CountingRng,
};

use crate::config::{Config, Qos};
use crate::connection::{ConnectError, Link, TransportError};
use crate::constants::MQTT_MAX_PROPERTIES;

/// Seed for packet identifiers, only needs to differ between sessions on the broker side.
const PACKET_ID_SEED: u64 = 20_000;

/// MQTT v5 session over any async byte stream (plain TCP on the device, an in-memory pipe in
/// tests).
pub struct MqttSession<'a, T>
where
    T: Read + Write,
{
    client: MqttClient<'a, T, MQTT_MAX_PROPERTIES, CountingRng>,
}

impl<'a, T> MqttSession<'a, T>
where
    T: Read + Write,
{
    /// Sends CONNECT with a clean start and waits for CONNACK.
    pub async fn open(
        stream: T,
        tx_buffer: &'a mut [u8],
        rx_buffer: &'a mut [u8],
        config: &Config,
    ) -> Result<Self, ConnectError> {
        let mut client_config =
            ClientConfig::new(MqttVersion::MQTTv5, CountingRng(PACKET_ID_SEED));
        client_config.add_client_id(config.device_id);
        client_config.keep_alive = config.mqtt_keep_alive_secs;
        client_config.max_packet_size = rx_buffer.len() as u32;
        if let Some(username) = config.mqtt_username {
            client_config.add_username(username);
        }
        if let Some(password) = config.mqtt_password {
            client_config.add_password(password);
        }

        let tx_len = tx_buffer.len();
        let rx_len = rx_buffer.len();
        let mut client = MqttClient::new(
            stream,
            tx_buffer,
            tx_len,
            rx_buffer,
            rx_len,
            client_config,
        );

        match client.connect_to_broker().await {
            Ok(()) => {
                info!("MQTT session open as {}", config.device_id);
                Ok(Self { client })
            }
            Err(ReasonCode::NetworkError) => {
                error!("MQTT connect failed: network error");
                Err(ConnectError::Network)
            }
            Err(e) => {
                error!("MQTT connect_to_broker failed: {:?}", e);
                Err(ConnectError::Handshake)
            }
        }
    }
}

fn transport_error(code: ReasonCode) -> TransportError {
    match code {
        ReasonCode::NetworkError => TransportError::Network,
        _ => TransportError::Rejected,
    }
}

impl From<Qos> for QualityOfService {
    fn from(qos: Qos) -> Self {
        match qos {
            Qos::AtMostOnce => QualityOfService::QoS0,
            Qos::AtLeastOnce => QualityOfService::QoS1,
        }
    }
}

impl<T> Link for MqttSession<'_, T>
where
    T: Read + Write,
{
    async fn send(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), TransportError> {
        self.client
            .send_message(topic, payload, qos.into(), false)
            .await
            .map_err(|e| {
                error!("Failed to publish message: {:?}", e);
                transport_error(e)
            })?;
        debug!("Published {} bytes to {}", payload.len(), topic);
        Ok(())
    }

    async fn ping(&mut self) -> Result<(), TransportError> {
        self.client.send_ping().await.map_err(|e| {
            error!("MQTT ping failed: {:?}", e);
            transport_error(e)
        })
    }

    async fn close(&mut self) {
        if let Err(e) = self.client.disconnect().await {
            debug!("MQTT disconnect failed: {:?}", e);
        }
    }
}
