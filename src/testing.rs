//! Fakes shared by the unit tests

use std::collections::HashMap;
use std::convert::Infallible;
use std::io::{self, Cursor, Read};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, InputPin, OutputPin};
use embedded_hal::spi::{ErrorType as SpiErrorType, Operation, SpiDevice};

use crate::download::{ChunkRange, DownloadError, RangeClient, RangeResponse};
use crate::epd::{Clock, Epd13in3, PanelPins, Select};
use crate::keep_alive::{KeepAlive, NoKeepAlive};

/// Delay that only adds up the requested time. Clones share the total.
#[derive(Debug, Clone, Default)]
pub struct RecordingDelay(Arc<AtomicU64>);

impl RecordingDelay {
    pub fn total_ms(&self) -> u64 {
        self.0.load(Ordering::SeqCst) / 1_000_000
    }
}

impl DelayNs for RecordingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.0.fetch_add(u64::from(ns), Ordering::SeqCst);
    }

    fn delay_us(&mut self, us: u32) {
        self.0.fetch_add(u64::from(us) * 1_000, Ordering::SeqCst);
    }

    fn delay_ms(&mut self, ms: u32) {
        self.0.fetch_add(u64::from(ms) * 1_000_000, Ordering::SeqCst);
    }
}

impl Clock for RecordingDelay {
    fn now_ms(&self) -> u64 {
        self.total_ms()
    }
}

/// Input pin stuck at one level
#[derive(Debug)]
pub struct LevelPin {
    high: bool,
    reads: usize,
}

impl LevelPin {
    pub fn low() -> Self {
        LevelPin {
            high: false,
            reads: 0,
        }
    }

    pub fn high() -> Self {
        LevelPin {
            high: true,
            reads: 0,
        }
    }

    pub fn reads(&self) -> usize {
        self.reads
    }
}

impl PinErrorType for LevelPin {
    type Error = Infallible;
}

impl InputPin for LevelPin {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        self.reads += 1;
        Ok(self.high)
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        self.is_high().map(|h| !h)
    }
}

/// Output lines of the panel
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Dc,
    Rst,
    CsMaster,
    CsSlave,
    Power,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Level(Line, bool),
    Write(Vec<u8>),
}

/// One command as seen on the wire, with the data bytes that followed it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Controllers selected when the opcode was clocked
    pub select: Option<Select>,
    pub cmd: u8,
    pub data: Vec<u8>,
    /// Both selects went high after this frame
    pub released: bool,
}

pub type RecordedEpd<K = NoKeepAlive> = Epd13in3<RecSpi, LevelPin, RecPin, RecordingDelay, K>;

/// Shared log of every line change and SPI write
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Recorder {
    fn push(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }

    pub fn spi(&self) -> RecSpi {
        RecSpi(self.clone())
    }

    pub fn pin(&self, line: Line) -> RecPin {
        RecPin {
            line,
            rec: self.clone(),
        }
    }

    /// A driver wired to this recorder, BUSY stuck idle or busy
    pub fn epd<K: KeepAlive>(
        &self,
        idle: bool,
        delay: RecordingDelay,
        keep_alive: K,
    ) -> RecordedEpd<K> {
        let pins = PanelPins {
            busy: if idle { LevelPin::high() } else { LevelPin::low() },
            dc: self.pin(Line::Dc),
            rst: self.pin(Line::Rst),
            cs_master: self.pin(Line::CsMaster),
            cs_slave: self.pin(Line::CsSlave),
            power: self.pin(Line::Power),
        };
        Epd13in3::new(self.spi(), pins, delay.clone(), keep_alive).with_clock(delay)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    pub fn levels(&self) -> Vec<(Line, bool)> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Level(line, level) => Some((line, level)),
                Event::Write(_) => None,
            })
            .collect()
    }

    /// Decode the log into commands, using DC and the two selects
    pub fn frames(&self) -> Vec<Frame> {
        let mut frames: Vec<Frame> = Vec::new();
        let (mut dc, mut master, mut slave) = (false, false, false);

        for event in self.events() {
            match event {
                Event::Level(Line::Dc, level) => dc = level,
                Event::Level(Line::CsMaster, level) => master = !level,
                Event::Level(Line::CsSlave, level) => slave = !level,
                Event::Level(..) => {}
                Event::Write(bytes) if !dc => {
                    for cmd in bytes {
                        frames.push(Frame {
                            select: selected(master, slave),
                            cmd,
                            data: Vec::new(),
                            released: false,
                        });
                    }
                }
                Event::Write(bytes) => {
                    if let Some(frame) = frames.last_mut() {
                        frame.data.extend(bytes);
                    }
                }
            }
            if !master && !slave {
                if let Some(frame) = frames.last_mut() {
                    frame.released = true;
                }
            }
        }
        frames
    }
}

fn selected(master: bool, slave: bool) -> Option<Select> {
    match (master, slave) {
        (true, true) => Some(Select::Both),
        (true, false) => Some(Select::Master),
        (false, true) => Some(Select::Slave),
        (false, false) => None,
    }
}

/// SPI device writing into a [`Recorder`]
#[derive(Debug)]
pub struct RecSpi(Recorder);

impl SpiErrorType for RecSpi {
    type Error = Infallible;
}

impl SpiDevice for RecSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Infallible> {
        for op in operations {
            if let Operation::Write(bytes) = op {
                self.0.push(Event::Write(bytes.to_vec()));
            }
        }
        Ok(())
    }
}

/// Output pin writing into a [`Recorder`]
#[derive(Debug)]
pub struct RecPin {
    line: Line,
    rec: Recorder,
}

impl PinErrorType for RecPin {
    type Error = Infallible;
}

impl OutputPin for RecPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.rec.push(Event::Level(self.line, false));
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.rec.push(Event::Level(self.line, true));
        Ok(())
    }
}

/// What goes wrong on one attempt of one chunk
#[derive(Debug, Clone, Copy)]
pub enum Fault {
    Connect,
    Status(u16),
    /// Body cut to this many bytes
    Truncate(usize),
    /// Body with this many extra bytes
    Overlong(usize),
    /// Body errors after this many bytes
    ReadError(usize),
}

/// Serves ranges of an in-memory resource, failing where scripted
#[derive(Debug, Clone)]
pub struct ScriptedClient {
    data: Vec<u8>,
    faults: HashMap<(usize, u32), Fault>,
    attempts: HashMap<usize, u32>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl ScriptedClient {
    pub fn new(data: Vec<u8>) -> Self {
        ScriptedClient {
            data,
            faults: HashMap::new(),
            attempts: HashMap::new(),
            requests: Arc::default(),
        }
    }

    /// Fail `attempt` (1 based) of chunk `index`
    pub fn fail(mut self, index: usize, attempt: u32, fault: Fault) -> Self {
        self.faults.insert((index, attempt), fault);
        self
    }

    pub fn requested_ranges(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

impl RangeClient for ScriptedClient {
    type Body<'a> = ScriptedBody where Self: 'a;

    fn get_range(
        &mut self,
        _url: &str,
        range: &ChunkRange,
    ) -> Result<RangeResponse<ScriptedBody>, DownloadError> {
        self.requests.lock().unwrap().push(range.header_value());
        let attempt = self.attempts.entry(range.index).or_insert(0);
        *attempt += 1;

        let start = (range.start as usize).min(self.data.len());
        let end = (range.end as usize + 1).min(self.data.len());
        let mut body = self.data[start..end].to_vec();
        let mut status = 206;
        let mut fail_after = None;

        match self.faults.get(&(range.index, *attempt)) {
            None => {}
            Some(Fault::Connect) => {
                return Err(DownloadError::Connect("connection refused".into()))
            }
            Some(Fault::Status(code)) => status = *code,
            Some(Fault::Truncate(keep)) => body.truncate(*keep),
            Some(Fault::Overlong(extra)) => body.extend(std::iter::repeat(0xEE).take(*extra)),
            Some(Fault::ReadError(after)) => fail_after = Some(*after),
        }

        Ok(RangeResponse {
            status,
            body: ScriptedBody {
                data: Cursor::new(body),
                fail_after,
            },
        })
    }
}

#[derive(Debug)]
pub struct ScriptedBody {
    data: Cursor<Vec<u8>>,
    fail_after: Option<usize>,
}

impl Read for ScriptedBody {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.fail_after {
            Some(limit) => {
                let pos = self.data.position() as usize;
                if pos >= limit {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
                }
                let n = buf.len().min(limit - pos);
                self.data.read(&mut buf[..n])
            }
            None => self.data.read(buf),
        }
    }
}
