use embassy_net::{dns::DnsQueryType, tcp::TcpSocket, Stack};
use embassy_time::Duration;
use log::{info, warn};

use esp32_telemetry_node::constants::{
    MQTT_RX_BUFFER_SIZE, MQTT_TX_BUFFER_SIZE, RX_BUFFER_SIZE, TX_BUFFER_SIZE,
};
use esp32_telemetry_node::{Config, ConnectError, Connector, MqttSession};

/// Socket and MQTT buffers, allocated once in a static cell and reused by every connection.
pub struct Buffers {
    pub rx: [u8; RX_BUFFER_SIZE],
    pub tx: [u8; TX_BUFFER_SIZE],
    pub mqtt_rx: [u8; MQTT_RX_BUFFER_SIZE],
    pub mqtt_tx: [u8; MQTT_TX_BUFFER_SIZE],
}

impl Buffers {
    pub const fn new() -> Self {
        Self {
            rx: [0; RX_BUFFER_SIZE],
            tx: [0; TX_BUFFER_SIZE],
            mqtt_rx: [0; MQTT_RX_BUFFER_SIZE],
            mqtt_tx: [0; MQTT_TX_BUFFER_SIZE],
        }
    }
}

/// Plain TCP to the broker followed by the MQTT handshake.
///
/// Each link borrows the buffers, so the previous socket is dropped (and its slot in the network
/// stack released) before the next one is opened.
pub struct TcpConnector {
    stack: Stack<'static>,
    buffers: &'static mut Buffers,
    config: &'static Config,
}

impl TcpConnector {
    pub fn new(stack: Stack<'static>, buffers: &'static mut Buffers, config: &'static Config) -> Self {
        Self {
            stack,
            buffers,
            config,
        }
    }
}

impl Connector for TcpConnector {
    type Link<'a>
        = MqttSession<'a, TcpSocket<'a>>
    where
        Self: 'a;

    async fn connect(&mut self) -> Result<Self::Link<'_>, ConnectError> {
        if !self.stack.is_config_up() {
            return Err(ConnectError::Network);
        }

        let Buffers {
            rx,
            tx,
            mqtt_rx,
            mqtt_tx,
        } = &mut *self.buffers;

        let addr = self
            .stack
            .dns_query(self.config.mqtt_hostname, DnsQueryType::A)
            .await
            .map_err(|e| {
                warn!("DNS query for {} failed: {:?}", self.config.mqtt_hostname, e);
                ConnectError::Resolve
            })?
            .first()
            .copied()
            .ok_or(ConnectError::Resolve)?;

        let mut socket = TcpSocket::new(self.stack, rx, tx);
        socket.set_timeout(Some(Duration::from_millis(self.config.connect_timeout_ms)));
        // Keep-alive is driven by PINGREQ from the control loop
        socket.set_keep_alive(None);

        info!(
            "Connecting TCP socket to {}:{}",
            self.config.mqtt_hostname, self.config.mqtt_port
        );
        socket
            .connect((addr, self.config.mqtt_port))
            .await
            .map_err(|e| {
                warn!("TCP connect failed: {:?}", e);
                ConnectError::Network
            })?;

        // A broker that stays silent for a whole keep-alive period is gone
        socket.set_timeout(Some(Duration::from_millis(
            u64::from(self.config.mqtt_keep_alive_secs) * 1_000,
        )));

        MqttSession::open(socket, mqtt_tx, mqtt_rx, self.config).await
    }
}
