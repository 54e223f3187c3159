use core::fmt;

use embassy_time::{with_timeout, Duration, Instant};
use log::{info, warn};

use crate::backoff::Backoff;
use crate::config::{Config, Qos};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Backoff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectError {
    // TCP connect plus MQTT handshake did not finish in time
    Timeout,
    // Broker hostname could not be resolved
    Resolve,
    // TCP connection refused or reset
    Network,
    // The broker rejected the MQTT CONNECT
    Handshake,
}

impl fmt::Display for ConnectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "connect timed out"),
            Self::Resolve => write!(f, "broker hostname did not resolve"),
            Self::Network => write!(f, "TCP connection failed"),
            Self::Handshake => write!(f, "MQTT handshake rejected"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportError {
    // The underlying stream failed
    Network,
    // The broker answered with an error or disconnected us
    Rejected,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Network => write!(f, "link failure"),
            Self::Rejected => write!(f, "broker rejected the packet"),
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum PublishError {
    NotConnected,
    Transport(TransportError),
    Timeout,
    Serialization(crate::telemetry::Error),
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Transport(e) => write!(f, "{}", e),
            Self::Timeout => write!(f, "publish timed out"),
            Self::Serialization(e) => write!(f, "{}", e),
        }
    }
}

/// An established session with the broker.
pub trait Link {
    async fn send(&mut self, topic: &str, payload: &[u8], qos: Qos) -> Result<(), TransportError>;

    async fn ping(&mut self) -> Result<(), TransportError>;

    /// Best-effort orderly shutdown; the link is unusable afterwards.
    async fn close(&mut self);
}

/// Opens links to the broker. A link may borrow the connector's socket and buffers, so at most
/// one link exists at a time.
pub trait Connector {
    type Link<'a>: Link
    where
        Self: 'a;

    async fn connect(&mut self) -> Result<Self::Link<'_>, ConnectError>;
}

/// Link lifecycle state machine.
///
/// The manager never holds the link itself: the control loop owns it for as long as the manager
/// reports [`ConnectionState::Connected`] and drops it as soon as the state changes.
pub struct ConnectionManager {
    state: ConnectionState,
    backoff: Backoff,
    retry_at: Option<Instant>,
    connect_timeout: Duration,
    publish_timeout: Duration,
}

impl ConnectionManager {
    pub fn new(config: &Config) -> Self {
        Self {
            state: ConnectionState::Disconnected,
            backoff: Backoff::new(
                Duration::from_millis(config.backoff_initial_ms),
                Duration::from_millis(config.backoff_max_ms),
            ),
            retry_at: None,
            connect_timeout: Duration::from_millis(config.connect_timeout_ms),
            publish_timeout: Duration::from_millis(config.publish_timeout_ms),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// When the next connect attempt is allowed, if one is scheduled.
    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Advances time-driven transitions and returns the resulting state. `Connecting` means the
    /// caller should run [`ConnectionManager::connect`] now.
    pub fn poll(&mut self, now: Instant) -> ConnectionState {
        self.state = match (self.state, self.retry_at) {
            (ConnectionState::Disconnected | ConnectionState::Backoff, Some(at)) if now < at => {
                ConnectionState::Backoff
            }
            (ConnectionState::Disconnected | ConnectionState::Backoff, _) => {
                self.retry_at = None;
                ConnectionState::Connecting
            }
            (state, _) => state,
        };
        self.state
    }

    /// Runs one connect attempt bounded by the connect timeout.
    pub async fn connect<'c, C: Connector>(
        &mut self,
        connector: &'c mut C,
    ) -> Result<C::Link<'c>, ConnectError> {
        self.state = ConnectionState::Connecting;
        let result = match with_timeout(self.connect_timeout, connector.connect()).await {
            Ok(result) => result,
            Err(_) => Err(ConnectError::Timeout),
        };

        match result {
            Ok(link) => {
                self.connected();
                Ok(link)
            }
            Err(e) => {
                self.connect_failed(Instant::now(), e);
                Err(e)
            }
        }
    }

    /// Sends one payload if a link is up. Any failure drops the connection.
    pub async fn publish<L: Link>(
        &mut self,
        link: Option<&mut L>,
        topic: &str,
        payload: &[u8],
        qos: Qos,
    ) -> Result<(), PublishError> {
        let link = match link {
            Some(link) if self.is_connected() => link,
            _ => return Err(PublishError::NotConnected),
        };

        match with_timeout(self.publish_timeout, link.send(topic, payload, qos)).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.link_lost(Instant::now());
                Err(PublishError::Transport(e))
            }
            Err(_) => {
                self.link_lost(Instant::now());
                Err(PublishError::Timeout)
            }
        }
    }

    /// Keep-alive round trip. A missing PINGRESP counts as a lost link.
    pub async fn ping<L: Link>(&mut self, link: &mut L) -> Result<(), TransportError> {
        if !self.is_connected() {
            return Err(TransportError::Network);
        }
        match with_timeout(self.publish_timeout, link.ping()).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => {
                self.link_lost(Instant::now());
                Err(e)
            }
            Err(_) => {
                self.link_lost(Instant::now());
                Err(TransportError::Network)
            }
        }
    }

    pub(crate) fn connected(&mut self) {
        info!("Connected to MQTT broker");
        self.state = ConnectionState::Connected;
        self.retry_at = None;
        self.backoff.reset();
    }

    pub(crate) fn connect_failed(&mut self, now: Instant, error: ConnectError) {
        let delay = self.backoff.next_delay();
        warn!(
            "MQTT connect failed: {}, retrying in {} ms",
            error,
            delay.as_millis()
        );
        self.state = ConnectionState::Backoff;
        self.retry_at = Some(now + delay);
    }

    pub(crate) fn link_lost(&mut self, now: Instant) {
        let delay = self.backoff.next_delay();
        warn!(
            "MQTT link lost, reconnecting in {} ms",
            delay.as_millis()
        );
        self.state = ConnectionState::Disconnected;
        self.retry_at = Some(now + delay);
    }
}
