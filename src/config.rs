//! Runtime configuration of the photo frame.
//!
//! Defaults can be overridden at build time through `EPD_IMAGE_URL`,
//! `EPD_WIFI_SSID` and `EPD_WIFI_PASS`, and at runtime with
//! [`FrameConfig::set`] (the device feeds it from NVS).

use std::time::Duration;

use log::info;
use thiserror::Error;

use crate::download::RetryPolicy;
use crate::epd::BusyWait;

pub const KEY_IMAGE_URL: &str = "image_url";
pub const KEY_INTERVAL: &str = "interval_s";
pub const KEY_CHUNK_SIZE: &str = "chunk_size";
pub const KEY_CHUNK_TRIES: &str = "chunk_tries";
pub const KEY_WIFI_SSID: &str = "wifi_ssid";
pub const KEY_WIFI_PASS: &str = "wifi_pass";

/// Every key understood by [`FrameConfig::set`]
pub const KEYS: [&str; 6] = [
    KEY_IMAGE_URL,
    KEY_INTERVAL,
    KEY_CHUNK_SIZE,
    KEY_CHUNK_TRIES,
    KEY_WIFI_SSID,
    KEY_WIFI_PASS,
];

const DEFAULT_IMAGE_URL: &str = match option_env!("EPD_IMAGE_URL") {
    Some(url) => url,
    None => "http://10.0.0.253:8080/image.bin",
};
const DEFAULT_WIFI_SSID: &str = match option_env!("EPD_WIFI_SSID") {
    Some(ssid) => ssid,
    None => "",
};
const DEFAULT_WIFI_PASS: &str = match option_env!("EPD_WIFI_PASS") {
    Some(pass) => pass,
    None => "",
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown config key `{0}`")]
    UnknownKey(String),
    #[error("invalid value `{value}` for `{key}`")]
    InvalidValue { key: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameConfig {
    pub image_url: String,
    /// Time between two periodic updates
    pub update_interval: Duration,
    /// Bytes per range request, 0 fetches the whole file at once
    pub chunk_size: u64,
    /// Attempts per chunk, the first one included
    pub chunk_tries: u32,
    pub retry_backoff_ms: u32,
    /// Free space required on top of the frame size
    pub space_margin: u64,
    pub http_timeout: Duration,
    pub busy_poll_ms: u32,
    pub busy_timeout_ms: u32,
    pub busy_settle_ms: u32,
    /// Frame file name inside the storage root
    pub file_name: String,
    pub wifi_ssid: String,
    pub wifi_pass: String,
}

impl Default for FrameConfig {
    fn default() -> Self {
        FrameConfig {
            image_url: DEFAULT_IMAGE_URL.to_string(),
            update_interval: Duration::from_secs(30 * 60),
            chunk_size: 100_000,
            chunk_tries: 3,
            retry_backoff_ms: 500,
            space_margin: 8 * 1024,
            http_timeout: Duration::from_secs(15),
            busy_poll_ms: BusyWait::PANEL.poll_ms,
            busy_timeout_ms: BusyWait::PANEL.timeout_ms,
            busy_settle_ms: BusyWait::PANEL.settle_ms,
            file_name: "image.bin".to_string(),
            wifi_ssid: DEFAULT_WIFI_SSID.to_string(),
            wifi_pass: DEFAULT_WIFI_PASS.to_string(),
        }
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            key,
            value: value.to_string(),
        })
}

impl FrameConfig {
    /// Apply one textual override
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            KEY_IMAGE_URL => {
                let url = value.trim();
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::InvalidValue {
                        key: KEY_IMAGE_URL,
                        value: value.to_string(),
                    });
                }
                self.image_url = url.to_string();
            }
            KEY_INTERVAL => {
                let secs: u64 = parse(KEY_INTERVAL, value)?;
                if secs == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: KEY_INTERVAL,
                        value: value.to_string(),
                    });
                }
                self.update_interval = Duration::from_secs(secs);
            }
            KEY_CHUNK_SIZE => self.chunk_size = parse(KEY_CHUNK_SIZE, value)?,
            KEY_CHUNK_TRIES => {
                let tries: u32 = parse(KEY_CHUNK_TRIES, value)?;
                if tries == 0 {
                    return Err(ConfigError::InvalidValue {
                        key: KEY_CHUNK_TRIES,
                        value: value.to_string(),
                    });
                }
                self.chunk_tries = tries;
            }
            KEY_WIFI_SSID => self.wifi_ssid = value.to_string(),
            KEY_WIFI_PASS => self.wifi_pass = value.to_string(),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.chunk_tries,
            backoff_ms: self.retry_backoff_ms,
        }
    }

    pub fn busy_wait(&self) -> BusyWait {
        BusyWait {
            poll_ms: self.busy_poll_ms,
            timeout_ms: self.busy_timeout_ms,
            settle_ms: self.busy_settle_ms,
        }
    }

    /// Log the effective configuration
    pub fn dump(&self) {
        info!("EPD Photo Frame:");
        info!("  Image URL: {}", self.image_url);
        info!(
            "  Update interval: {} s",
            self.update_interval.as_secs()
        );
        info!(
            "  Chunks: {} bytes, {} tries, {} ms backoff",
            self.chunk_size, self.chunk_tries, self.retry_backoff_ms
        );
        info!("  Space margin: {} bytes", self.space_margin);
        info!("  HTTP timeout: {} s", self.http_timeout.as_secs());
        info!(
            "  Busy wait: poll {} ms, timeout {} ms, settle {} ms",
            self.busy_poll_ms, self.busy_timeout_ms, self.busy_settle_ms
        );
        info!("  Frame file: {}", self.file_name);
        info!("  WiFi SSID: {:?}", self.wifi_ssid);
        info!("  WiFi password: <{} chars>", self.wifi_pass.len());
    }
}
