#![no_std]
#![no_main]

use static_cell::StaticCell;

use embassy_executor::Spawner;
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex, signal::Signal};
use embassy_time::{Duration, Timer};

use esp_alloc as _;
use esp_backtrace as _;
use esp_hal::{self as hal};
use esp_println::logger::init_logger;
use esp_wifi::EspWifiController;

use hal::{
    analog::adc::{Adc, AdcConfig, Attenuation},
    gpio::{Flex, Pull},
    peripherals::{GPIO32, GPIO34, GPIO35},
    rng::Rng,
    timer::timg::TimerGroup,
};

extern crate alloc;

mod firmware;

use esp32_telemetry_node::config::{ChannelConfig, ChannelKind, Config, Qos};
use esp32_telemetry_node::constants::*;
use esp32_telemetry_node::sensors::{
    AirQualitySensor, Dht22, LatchedReadout, LightSensor, Sensors, SoundSensor,
};
use esp32_telemetry_node::TelemetryNode;

use firmware::adc::{AdcInput, SharedAdc};
use firmware::board::*;
use firmware::transport::{Buffers, TcpConnector};
use firmware::wifi::Wifi;

include!(concat!(env!("OUT_DIR"), "/config.rs"));

esp_bootloader_esp_idf::esp_app_desc!();

type BoardSensors = Sensors<
    Dht22<Flex<'static>>,
    LightSensor<AdcInput<GPIO34<'static>>>,
    LatchedReadout<'static, CriticalSectionRawMutex>,
    AirQualitySensor<AdcInput<GPIO32<'static>>>,
>;

static ESP_WIFI: StaticCell<EspWifiController<'static>> = StaticCell::new();
static ADC: StaticCell<SharedAdc> = StaticCell::new();
static BUFFERS: StaticCell<Buffers> = StaticCell::new();

// Latest sound level, written by the sound task and taken by the sampling pass
static SOUND_LEVEL: Signal<CriticalSectionRawMutex, f32> = Signal::new();

#[esp_hal_embassy::main]
async fn main(spawner: Spawner) {
    init_logger(log::LevelFilter::Info);
    log::info!("esp32_telemetry_node v{} ({})", VERSION, CONFIG.device_id);

    if let Err(e) = CONFIG.validate() {
        panic!("Invalid configuration: {}", e);
    }
    if let Err(e) = check_wiring(CONFIG.channels) {
        panic!("Invalid configuration: {}", e);
    }
    if let Some(segment) = CONFIG.topic_device_mismatch() {
        log::warn!(
            "Topic {} names device '{}' but device_id is '{}'",
            CONFIG.mqtt_topic,
            segment,
            CONFIG.device_id
        );
    }

    let peripherals = esp_hal::init(esp_hal::Config::default());

    let rng = Rng::new(peripherals.RNG);

    esp_alloc::heap_allocator!(size: HEAP_SIZE);

    let timg0 = TimerGroup::new(peripherals.TIMG0);
    let timg1 = TimerGroup::new(peripherals.TIMG1);

    esp_hal_embassy::init(timg0.timer0);

    // possibly high transient required at init
    // https://github.com/esp-rs/esp-hal/issues/1626
    Timer::after(Duration::from_millis(1000)).await;

    let mut dht_pin = Flex::new(peripherals.GPIO15);
    dht_pin.set_as_open_drain(Pull::Up);
    dht_pin.set_high();

    let mut adc_config = AdcConfig::new();
    let light_pin = adc_config.enable_pin(peripherals.GPIO34, Attenuation::_11dB);
    let sound_pin = adc_config.enable_pin(peripherals.GPIO35, Attenuation::_11dB);
    let air_quality_pin = adc_config.enable_pin(peripherals.GPIO32, Attenuation::_11dB);
    let adc = ADC.init(Mutex::new(Adc::new(peripherals.ADC1, adc_config)));

    let sound = SoundSensor::new(AdcInput::new(adc, sound_pin), SOUND_CALIBRATION);
    spawner
        .spawn(sound_task(sound))
        .expect("Failed to spawn sound task");

    let sensors: BoardSensors = Sensors::new()
        .with_climate(Dht22::new(dht_pin))
        .with_light(LightSensor::new(
            AdcInput::new(adc, light_pin),
            LIGHT_CALIBRATION,
        ))
        .with_sound(LatchedReadout::new(&SOUND_LEVEL))
        .with_air_quality(AirQualitySensor::new(
            AdcInput::new(adc, air_quality_pin),
            AIR_QUALITY_CALIBRATION,
            AIR_QUALITY_WARMUP_READS,
        ));

    let wifi_controller = ESP_WIFI.init(
        esp_wifi::init(timg1.timer0, rng.clone()).expect("Failed to initialize WiFi controller"),
    );
    let wifi = Wifi::new(wifi_controller, peripherals.WIFI, rng, &CONFIG, spawner)
        .expect("Failed to bring up WiFi");

    wifi.wait_for_ip().await;

    let connector = TcpConnector::new(wifi.stack, BUFFERS.init(Buffers::new()), &CONFIG);
    let node = TelemetryNode::new(&CONFIG, connector, sensors);

    spawner
        .spawn(telemetry_task(node))
        .expect("Failed to spawn telemetry task");
}

#[embassy_executor::task]
async fn telemetry_task(mut node: TelemetryNode<TcpConnector, BoardSensors>) {
    node.run().await
}

#[embassy_executor::task]
async fn sound_task(mut sensor: SoundSensor<AdcInput<GPIO35<'static>>>) {
    loop {
        match sensor.measure_window().await {
            Ok(amplitude) => SOUND_LEVEL.signal(sensor.level(amplitude)),
            Err(e) => log::warn!("Sound window failed: {}", e),
        }
        Timer::after(Duration::from_millis(SOUND_WINDOW_PERIOD_MS)).await;
    }
}
