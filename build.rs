use std::{env, error::Error, fmt::Write, fs, path::Path};

use serde::Deserialize;

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    device_id: String,
    wifi_ssid: String,
    wifi_psk: String,
    mqtt_hostname: String,
    mqtt_port: u16,
    mqtt_username: Option<String>,
    mqtt_password: Option<String>,
    mqtt_topic: String,
    mqtt_qos: RawQos,
    mqtt_keep_alive_secs: u16,
    telemetry_interval_ms: u64,
    read_timeout_ms: u64,
    connect_timeout_ms: u64,
    publish_timeout_ms: u64,
    backoff_initial_ms: u64,
    backoff_max_ms: u64,
    channels: Vec<RawChannel>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawQos {
    AtMostOnce,
    AtLeastOnce,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawChannel {
    name: String,
    kind: RawKind,
    pin: u8,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "snake_case")]
enum RawKind {
    Temperature,
    Humidity,
    Light,
    Sound,
    AirQuality,
}

fn main() -> Result<(), Box<dyn Error>> {
    // Host builds (library and tests) take their configuration from code
    if env::var_os("CARGO_FEATURE_FIRMWARE").is_none() {
        return Ok(());
    }

    // Tell Cargo to rerun if toml changes
    println!("cargo:rerun-if-changed=cfg.toml");

    // Read and parse
    let toml_str = fs::read_to_string("cfg.toml")
        .map_err(|e| format!("cfg.toml: {} (start from cfg.toml.example)", e))?;
    let raw: RawConfig = toml::from_str(&toml_str)?;

    let mut channels = String::new();
    for channel in &raw.channels {
        write!(
            channels,
            "ChannelConfig {{ name: {name:?}, kind: ChannelKind::{kind:?}, pin: {pin} }}, ",
            name = channel.name,
            kind = channel.kind,
            pin = channel.pin
        )?;
    }

    // Generate Rust code
    let code = format!(
        r#"
        pub const CONFIG: Config = Config {{
            device_id: {device:?},
            wifi_ssid: {ssid:?},
            wifi_psk: {psk:?},
            mqtt_hostname: {mh:?},
            mqtt_port: {mp},
            mqtt_username: {mu:?},
            mqtt_password: {mpw:?},
            mqtt_topic: {mt:?},
            mqtt_qos: Qos::{qos:?},
            mqtt_keep_alive_secs: {ka},
            telemetry_interval_ms: {intv},
            read_timeout_ms: {rt},
            connect_timeout_ms: {ct},
            publish_timeout_ms: {pt},
            backoff_initial_ms: {bi},
            backoff_max_ms: {bm},
            channels: &[{channels}],
        }};
    "#,
        device = raw.device_id,
        ssid = raw.wifi_ssid,
        psk = raw.wifi_psk,
        mh = raw.mqtt_hostname,
        mp = raw.mqtt_port,
        mu = raw.mqtt_username,
        mpw = raw.mqtt_password,
        mt = raw.mqtt_topic,
        qos = raw.mqtt_qos,
        ka = raw.mqtt_keep_alive_secs,
        intv = raw.telemetry_interval_ms,
        rt = raw.read_timeout_ms,
        ct = raw.connect_timeout_ms,
        pt = raw.publish_timeout_ms,
        bi = raw.backoff_initial_ms,
        bm = raw.backoff_max_ms,
        channels = channels,
    );

    let out_dir = env::var("OUT_DIR")?;
    let dest_path = Path::new(&out_dir).join("config.rs");
    fs::write(dest_path, code)?;
    Ok(())
}
