pub mod adc;
pub mod board;
pub mod transport;
pub mod wifi;
