//! 13.3" dual controller e-paper panel
//!
//! The panel is two side by side sub-panels, each with its own controller
//! and chip select. Commands are framed with a DC line, the BUSY line is
//! shared.
//!
//! ### Usage
//! 1. create [`driver::Epd13in3`] with an SPI device and the [`PanelPins`]
//! 1. [`driver::Epd13in3::init`] once after power up
//! 1. stream a stored frame with [`driver::Epd13in3::write_frame`]
//! 1. latch it with [`driver::Epd13in3::refresh`]

use std::io::{Read, Seek};

pub mod busy;
pub mod cmd;
pub mod driver;
pub mod interface;
pub mod render;
pub mod sequence;

pub use busy::{BusyWait, Clock, SystemClock, WaitOutcome};
pub use cmd::Cmd;
pub use driver::{DisplayError, Epd13in3, PanelState, PowerState, RefreshReport};
pub use interface::PanelPins;
pub use render::{Half, RenderError};
pub use sequence::Select;

/// Display width, pixels horizontally
pub const WIDTH: u16 = 1200;

/// Display height, pixels vertically
pub const HEIGHT: u16 = 1600;

/// Bytes of one full row, 4 bits per pixel
pub const BYTES_PER_ROW: usize = WIDTH as usize / 2;

/// Bytes of one row that belong to a single controller
pub const HALF_ROW: usize = BYTES_PER_ROW / 2;

/// Size of a complete framebuffer file
pub const FRAME_SIZE: usize = BYTES_PER_ROW * HEIGHT as usize;

/// Byte layout of a framebuffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameGeometry {
    pub rows: usize,
    pub bytes_per_row: usize,
}

impl FrameGeometry {
    /// The real panel
    pub const PANEL: FrameGeometry = FrameGeometry {
        rows: HEIGHT as usize,
        bytes_per_row: BYTES_PER_ROW,
    };

    pub const fn half_row(&self) -> usize {
        self.bytes_per_row / 2
    }

    pub const fn frame_size(&self) -> usize {
        self.rows * self.bytes_per_row
    }
}

impl Default for FrameGeometry {
    fn default() -> Self {
        Self::PANEL
    }
}

/// What the refresh orchestration needs from a panel
pub trait Panel {
    fn init(&mut self) -> Result<(), DisplayError>;

    fn is_initialized(&self) -> bool;

    fn geometry(&self) -> FrameGeometry;

    /// Stream a stored frame to both halves without refreshing
    fn write_frame<R: Read + Seek>(&mut self, reader: &mut R) -> Result<(), RenderError>;

    /// Fill both halves with `fill` without refreshing
    fn write_fill(&mut self, fill: u8) -> Result<(), RenderError>;

    /// Power on, refresh, power off
    fn refresh(&mut self) -> Result<RefreshReport, DisplayError>;

    fn sleep(&mut self) -> Result<(), DisplayError>;

    fn wake(&mut self) -> Result<(), DisplayError>;
}

impl<SPI, BSY, OUT, DELAY, KA> Panel for Epd13in3<SPI, BSY, OUT, DELAY, KA>
where
    SPI: embedded_hal::spi::SpiDevice,
    BSY: embedded_hal::digital::InputPin,
    OUT: embedded_hal::digital::OutputPin,
    DELAY: embedded_hal::delay::DelayNs,
    KA: crate::keep_alive::KeepAlive,
{
    fn init(&mut self) -> Result<(), DisplayError> {
        Epd13in3::init(self)
    }

    fn is_initialized(&self) -> bool {
        self.state() == PanelState::Initialized
    }

    fn geometry(&self) -> FrameGeometry {
        self.geometry
    }

    fn write_frame<R: Read + Seek>(&mut self, reader: &mut R) -> Result<(), RenderError> {
        Epd13in3::write_frame(self, reader)
    }

    fn write_fill(&mut self, fill: u8) -> Result<(), RenderError> {
        Epd13in3::write_fill(self, fill)
    }

    fn refresh(&mut self) -> Result<RefreshReport, DisplayError> {
        Epd13in3::refresh(self)
    }

    fn sleep(&mut self) -> Result<(), DisplayError> {
        Epd13in3::sleep(self)
    }

    fn wake(&mut self) -> Result<(), DisplayError> {
        Epd13in3::wake(self)
    }
}
