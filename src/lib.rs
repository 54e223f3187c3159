//! Periodic sensor telemetry for an ESP32 node.
//!
//! Every `telemetry_interval_ms` the node reads all configured channels, encodes one JSON sample
//! and publishes it over MQTT. The broker connection is kept up by a capped exponential backoff
//! state machine; sampling carries on while the broker is unreachable and samples that cannot be
//! sent are dropped.
//!
//! The library is hardware independent. Sensors come in through [`sensors::SensorReadout`] and
//! [`sensors::AnalogInput`], the network through [`connection::Connector`]. The ESP32 binary
//! (feature `firmware`) provides the concrete pins, ADC and TCP stack.
#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

pub mod backoff;
pub mod config;
pub mod connection;
pub mod constants;
pub mod mqtt;
pub mod node;
pub mod publisher;
pub mod sampler;
pub mod scheduler;
pub mod sensors;
pub mod stats;
pub mod telemetry;

pub use config::{ChannelConfig, ChannelKind, Config, ConfigError, Qos};
pub use connection::{
    ConnectError, ConnectionManager, ConnectionState, Connector, Link, PublishError,
    TransportError,
};
pub use mqtt::MqttSession;
pub use node::TelemetryNode;
pub use sensors::{ReadError, SensorReadout};
pub use stats::NodeStats;
pub use telemetry::{Reading, TelemetrySample};
