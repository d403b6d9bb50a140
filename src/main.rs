#[cfg(target_os = "espidf")]
mod platform;

#[cfg(target_os = "espidf")]
fn main() -> anyhow::Result<()> {
    device::run()
}

/// Off target the binary only checks a frame file before it is published
#[cfg(not(target_os = "espidf"))]
fn main() -> anyhow::Result<()> {
    host::run()
}

#[cfg(target_os = "espidf")]
mod device {
    use std::time::Instant;

    use anyhow::Result;
    use esp_idf_svc::eventloop::EspSystemEventLoop;
    use esp_idf_svc::hal::cpu::Core;
    use esp_idf_svc::hal::delay::{Delay, FreeRtos};
    use esp_idf_svc::hal::gpio::{self, AnyInputPin, AnyOutputPin, Input, Output, PinDriver};
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::prelude::*;
    use esp_idf_svc::hal::spi;
    use esp_idf_svc::hal::task::thread::ThreadSpawnConfiguration;
    use esp_idf_svc::nvs::EspDefaultNvsPartition;
    use log::{error, info, warn};

    use epd_photo_frame::{
        Acquirer, DirStorage, Downloader, Epd13in3, FrameGeometry, LogSink, PanelPins,
        PhotoFrame, PollOutcome,
    };

    use crate::platform::http::EspRangeClient;
    use crate::platform::nvs;
    use crate::platform::spiffs::{Spiffs, MOUNT_POINT};
    use crate::platform::watchdog::TaskWatchdog;
    use crate::platform::wifi::{WifiLink, WifiNetwork};

    const SPI_BAUDRATE_MHZ: u32 = 4;
    const POLL_PERIOD_MS: u32 = 1000;

    type OutPin = PinDriver<'static, AnyOutputPin, Output>;
    type BusyPin = PinDriver<'static, AnyInputPin, Input>;

    fn output(pin: impl Into<AnyOutputPin>) -> Result<OutPin> {
        Ok(PinDriver::output(pin.into())?)
    }

    pub fn run() -> Result<()> {
        // It is necessary to call this function once. Otherwise some patches to the runtime
        // implemented by esp-idf-sys might not link properly. See https://github.com/esp-rs/esp-idf-template/issues/71
        esp_idf_svc::sys::link_patches();

        // Bind the log crate to the ESP Logging facilities
        esp_idf_svc::log::EspLogger::initialize_default();

        let peripherals = Peripherals::take()?;
        let pins = peripherals.pins;
        let sys_loop = EspSystemEventLoop::take()?;
        let nvs_partition = EspDefaultNvsPartition::take()?;

        let config = nvs::load(nvs_partition.clone());

        let mut wifi = WifiLink::start(peripherals.modem, sys_loop, nvs_partition)?;
        let network = WifiNetwork::new(&config.wifi_ssid, &config.wifi_pass);
        if let Err(e) = wifi.connect(&network) {
            // The stored frame can still be shown, downloads will fail until
            // the link comes up
            error!("Wi-Fi unavailable: {:?}", e);
        }

        // Both chip selects are driven by the panel driver
        let spi = spi::SpiDeviceDriver::new_single(
            peripherals.spi2,
            pins.gpio12,
            pins.gpio11,
            Option::<gpio::AnyIOPin>::None,
            Option::<gpio::AnyOutputPin>::None,
            &spi::SpiDriverConfig::new(),
            // Mode0 is the esp-idf-hal default
            &spi::SpiConfig::new().baudrate(SPI_BAUDRATE_MHZ.MHz().into()),
        )?;

        let busy: BusyPin = PinDriver::input(AnyInputPin::from(pins.gpio15))?;
        let panel_pins = PanelPins {
            busy,
            dc: output(pins.gpio13)?,
            rst: output(pins.gpio14)?,
            cs_master: output(pins.gpio18)?,
            cs_slave: output(pins.gpio17)?,
            power: output(pins.gpio7)?,
        };

        let panel = Epd13in3::new(spi, panel_pins, Delay::default(), TaskWatchdog)
            .with_busy_wait(config.busy_wait());

        let storage = DirStorage::new(MOUNT_POINT, Spiffs::mount(MOUNT_POINT)?);
        let downloader = Downloader::new(
            Acquirer::new(&config, FrameGeometry::PANEL),
            EspRangeClient::new(config.http_timeout),
            Delay::default(),
            TaskWatchdog,
        );
        let interval = config.update_interval;

        let mut frame = PhotoFrame::new(panel, storage, downloader, config);
        frame.add_sink(Box::new(LogSink));
        frame.setup()?;

        match frame.display_stored() {
            Ok(report) if report.timed_out() => warn!("Stored frame shown, busy timed out"),
            Ok(_) => info!("Stored frame shown"),
            Err(e) => info!("No stored frame to show: {}", e),
        }

        let mut last_start: Option<Instant> = None;
        loop {
            let due = last_start.map_or(true, |at| at.elapsed() >= interval);
            if due && !frame.download_running() {
                if !wifi.is_connected() {
                    warn!("Wi-Fi down, reconnecting");
                    if let Err(e) = wifi.connect(&network) {
                        error!("Reconnect failed: {:?}", e);
                    }
                }
                if let Err(e) = start_on_core1(&mut frame) {
                    error!("Could not start download: {:?}", e);
                }
                last_start = Some(Instant::now());
            }

            match frame.poll() {
                PollOutcome::Finished(Ok(report)) => {
                    info!("Frame updated (busy timed out: {})", report.timed_out());
                }
                PollOutcome::Finished(Err(e)) => warn!("Update failed: {}", e),
                PollOutcome::Idle | PollOutcome::Running => {}
            }

            FreeRtos::delay_ms(POLL_PERIOD_MS);
        }
    }

    /// Spawn the download on the second core, away from the Wi-Fi stack
    fn start_on_core1<P, S, F>(frame: &mut PhotoFrame<P, S, F>) -> Result<bool>
    where
        P: epd_photo_frame::Panel,
        S: epd_photo_frame::Storage + Send + 'static,
        F: epd_photo_frame::download::Fetch + Send + 'static,
    {
        ThreadSpawnConfiguration {
            pin_to_core: Some(Core::Core1),
            ..Default::default()
        }
        .set()?;
        let started = frame.start_background_download();
        ThreadSpawnConfiguration::default().set()?;
        Ok(started?)
    }
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use std::path::Path;

    use anyhow::{bail, Context, Result};
    use log::info;

    use epd_photo_frame::{
        check_frame, DirStorage, FixedCapacity, FrameCheck, FrameGeometry, FRAME_SIZE,
    };

    pub fn run() -> Result<()> {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

        let Some(arg) = std::env::args().nth(1) else {
            bail!("usage: epd-photo-frame <frame.bin>");
        };
        let path = Path::new(&arg);
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .context("frame path has no file name")?;
        let root = path.parent().filter(|p| !p.as_os_str().is_empty());
        let storage = DirStorage::new(root.unwrap_or(Path::new(".")), FixedCapacity(u64::MAX));

        let geometry = FrameGeometry::PANEL;
        info!(
            "Panel {} rows x {} bytes, {} bytes per controller half row",
            geometry.rows,
            geometry.bytes_per_row,
            geometry.half_row()
        );

        match check_frame(&storage, name, FRAME_SIZE as u64)
            .with_context(|| format!("reading {}", path.display()))?
        {
            FrameCheck::Valid => {
                info!("{}: valid frame of {} bytes", path.display(), FRAME_SIZE);
                Ok(())
            }
            FrameCheck::Missing => bail!("{}: not found", path.display()),
            FrameCheck::WrongSize(found) => bail!(
                "{}: {} bytes, a frame is {} bytes",
                path.display(),
                found,
                FRAME_SIZE
            ),
        }
    }
}
