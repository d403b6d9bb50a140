//! Host stand-ins for the panel bus and the image server.

#![allow(dead_code)]

use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, Operation, SpiDevice};

use epd_photo_frame::download::{ChunkRange, DownloadError, RangeClient, RangeResponse};
use epd_photo_frame::epd::{Cmd, Select};
use epd_photo_frame::{Epd13in3, NoKeepAlive, PanelPins, FRAME_SIZE};

/// What the two controllers received, decoded from DC and the selects
#[derive(Debug, Default)]
pub struct BusLog {
    dc_high: bool,
    master_selected: bool,
    slave_selected: bool,
    last_cmd: Option<u8>,
    pub commands: Vec<(u8, Option<Select>)>,
    pub master_pixels: Vec<u8>,
    pub slave_pixels: Vec<u8>,
}

impl BusLog {
    fn selection(&self) -> Option<Select> {
        match (self.master_selected, self.slave_selected) {
            (true, true) => Some(Select::Both),
            (true, false) => Some(Select::Master),
            (false, true) => Some(Select::Slave),
            (false, false) => None,
        }
    }

    pub fn opcodes(&self) -> Vec<u8> {
        self.commands.iter().map(|(cmd, _)| *cmd).collect()
    }

    pub fn clear(&mut self) {
        self.commands.clear();
        self.master_pixels.clear();
        self.slave_pixels.clear();
    }
}

#[derive(Debug, Clone, Default)]
pub struct Bus(pub Arc<Mutex<BusLog>>);

impl Bus {
    pub fn log(&self) -> std::sync::MutexGuard<'_, BusLog> {
        self.0.lock().unwrap()
    }

    pub fn panel(&self) -> HostPanel {
        let pins = PanelPins {
            busy: IdleBusy,
            dc: self.line(Line::Dc),
            rst: self.line(Line::Other),
            cs_master: self.line(Line::CsMaster),
            cs_slave: self.line(Line::CsSlave),
            power: self.line(Line::Other),
        };
        Epd13in3::new(BusSpi(self.clone()), pins, NoDelay, NoKeepAlive)
    }

    fn line(&self, line: Line) -> BusPin {
        BusPin {
            line,
            bus: self.clone(),
        }
    }
}

pub type HostPanel = Epd13in3<BusSpi, IdleBusy, BusPin, NoDelay, NoKeepAlive>;

pub struct BusSpi(Bus);

impl SpiErrorType for BusSpi {
    type Error = Infallible;
}

impl SpiDevice for BusSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        let mut log = self.0.log();
        for op in operations {
            let Operation::Write(bytes) = op else {
                continue;
            };
            if !log.dc_high {
                let cmd = bytes[0];
                let selection = log.selection();
                log.last_cmd = Some(cmd);
                log.commands.push((cmd, selection));
            } else if log.last_cmd == Some(Cmd::DTM) {
                match log.selection() {
                    Some(Select::Master) => log.master_pixels.extend_from_slice(bytes),
                    Some(Select::Slave) => log.slave_pixels.extend_from_slice(bytes),
                    _ => {}
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Line {
    Dc,
    CsMaster,
    CsSlave,
    Other,
}

pub struct BusPin {
    line: Line,
    bus: Bus,
}

impl BusPin {
    fn drive(&mut self, high: bool) {
        let mut log = self.bus.log();
        match self.line {
            Line::Dc => log.dc_high = high,
            // Selects are active low
            Line::CsMaster => log.master_selected = !high,
            Line::CsSlave => log.slave_selected = !high,
            Line::Other => {}
        }
    }
}

impl PinErrorType for BusPin {
    type Error = Infallible;
}

impl OutputPin for BusPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.drive(true);
        Ok(())
    }
}

/// Busy line of a panel that finishes instantly
pub struct IdleBusy;

impl PinErrorType for IdleBusy {
    type Error = Infallible;
}

impl InputPin for IdleBusy {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(true)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(false)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Serves one image, failing chosen chunks with a 503 a number of times
#[derive(Debug, Clone)]
pub struct ImageServer {
    image: Arc<Vec<u8>>,
    failures: Arc<Mutex<HashMap<usize, u32>>>,
    pub requests: Arc<Mutex<Vec<String>>>,
}

impl ImageServer {
    pub fn new(image: Vec<u8>) -> Self {
        ImageServer {
            image: Arc::new(image),
            failures: Arc::default(),
            requests: Arc::default(),
        }
    }

    pub fn fail_chunk(self, index: usize, times: u32) -> Self {
        self.failures.lock().unwrap().insert(index, times);
        self
    }

    pub fn request_log(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl RangeClient for ImageServer {
    type Body<'a> = &'a [u8] where Self: 'a;

    fn get_range(
        &mut self,
        _url: &str,
        range: &ChunkRange,
    ) -> Result<RangeResponse<&[u8]>, DownloadError> {
        self.requests.lock().unwrap().push(range.header_value());

        let mut failures = self.failures.lock().unwrap();
        if let Some(left) = failures.get_mut(&range.index) {
            if *left > 0 {
                *left -= 1;
                return Ok(RangeResponse {
                    status: 503,
                    body: &[],
                });
            }
        }

        let end = (range.end as usize + 1).min(self.image.len());
        Ok(RangeResponse {
            status: 206,
            body: &self.image[range.start as usize..end],
        })
    }
}

/// A full frame with a recognisable byte pattern
pub fn test_image() -> Vec<u8> {
    (0..FRAME_SIZE).map(|i| (i % 251) as u8).collect()
}
