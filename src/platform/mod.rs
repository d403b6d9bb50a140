//! ESP-IDF implementations of the frame collaborators

pub mod http;
pub mod nvs;
pub mod spiffs;
pub mod watchdog;
pub mod wifi;
