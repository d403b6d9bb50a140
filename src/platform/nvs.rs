use esp_idf_svc::nvs::{EspDefaultNvsPartition, EspNvs, NvsDefault};
use log::{info, warn};

use epd_photo_frame::config::{FrameConfig, KEYS, KEY_WIFI_PASS};

pub const NS: &str = "frame_cfg";

/// Read a string from NVS, returning None if the key is absent or on error.
fn nvs_get_str(nvs: &EspNvs<NvsDefault>, key: &str) -> Option<String> {
    let len = match nvs.str_len(key) {
        Ok(Some(len)) => len,
        _ => return None,
    };

    let mut buf = vec![0u8; len];
    match nvs.get_str(key, &mut buf) {
        Ok(Some(val)) => {
            let s = val.trim_end_matches('\0').to_string();
            if s.is_empty() {
                None
            } else {
                Some(s)
            }
        }
        _ => None,
    }
}

/// Load overrides from the `frame_cfg` namespace on top of the defaults.
/// A missing namespace or a bad value only costs the override.
pub fn load(partition: EspDefaultNvsPartition) -> FrameConfig {
    let mut config = FrameConfig::default();

    let nvs = match EspNvs::new(partition, NS, false) {
        Ok(nvs) => nvs,
        Err(e) => {
            warn!("NVS namespace {} not available ({}), using defaults", NS, e);
            return config;
        }
    };

    for key in KEYS {
        let Some(value) = nvs_get_str(&nvs, key) else {
            continue;
        };
        if key == KEY_WIFI_PASS {
            info!("NVS {} = <{} chars>", key, value.len());
        } else {
            info!("NVS {} = {:?}", key, value);
        }
        if let Err(e) = config.set(key, &value) {
            warn!("Ignoring NVS {}: {}", key, e);
        }
    }
    config
}
