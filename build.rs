use std::env;

fn main() {
    // The ESP-IDF environment only exists when cross compiling for the device.
    // Host builds (tests, the frame checker tool) skip it.
    let target_os = env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if target_os == "espidf" {
        embuild::espidf::sysenv::output();
    }

    // Optional build-time defaults, see src/config.rs
    for key in ["EPD_IMAGE_URL", "EPD_WIFI_SSID", "EPD_WIFI_PASS"] {
        println!("cargo:rerun-if-env-changed={}", key);
    }
    println!("cargo:rerun-if-changed=build.rs");
}
