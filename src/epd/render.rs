//! Streams a stored framebuffer to both controller halves.
//!
//! The file holds whole rows: the master half first, the slave half right
//! after it. Each controller wants its halves as one contiguous stream, so
//! the file is read twice with a single half-row buffer, discarding the bytes
//! that belong to the other controller.

use std::io::{self, Read, Seek, SeekFrom};

use display_interface::DisplayError;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use crate::epd::cmd::Cmd;
use crate::epd::driver::Epd13in3;
use crate::epd::sequence::{Select, PASS_SETTLE_MS};
use crate::keep_alive::KeepAlive;

/// Rows between two keep-alive feeds
pub const ROWS_PER_FEED: usize = 32;

/// Controller half addressed by a data pass
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Half {
    Master,
    Slave,
}

impl Half {
    fn select(self) -> Select {
        match self {
            Half::Master => Select::Master,
            Half::Slave => Select::Slave,
        }
    }
}

impl std::fmt::Display for Half {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.select().as_str())
    }
}

/// Why a frame could not be streamed to the panel
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The stored file is missing or has the wrong size
    #[error("no valid image stored (found {found:?} bytes)")]
    NoValidImage { found: Option<u64> },
    /// The file ended before the pass was complete
    #[error("short read in {half} pass at row {row}")]
    ShortRead { half: Half, row: usize },
    #[error("storage read failed: {0}")]
    Io(#[from] io::Error),
    #[error("panel bus error: {0:?}")]
    Bus(DisplayError),
}

impl From<DisplayError> for RenderError {
    fn from(e: DisplayError) -> Self {
        RenderError::Bus(e)
    }
}

impl<SPI, BSY, OUT, DELAY, KA> Epd13in3<SPI, BSY, OUT, DELAY, KA>
where
    SPI: SpiDevice,
    BSY: InputPin,
    OUT: OutputPin,
    DELAY: DelayNs,
    KA: KeepAlive,
{
    /// Send a stored frame: master pass, settle, slave pass.
    ///
    /// Does not refresh. A failed pass leaves both selects released and the
    /// caller must skip the refresh cycle.
    pub fn write_frame<R: Read + Seek>(&mut self, reader: &mut R) -> Result<(), RenderError> {
        let mut row = vec![0u8; self.geometry.half_row()];

        reader.seek(SeekFrom::Start(0))?;
        self.write_half(reader, Half::Master, &mut row)?;

        self.delay.delay_ms(PASS_SETTLE_MS);

        reader.seek(SeekFrom::Start(0))?;
        self.write_half(reader, Half::Slave, &mut row)?;
        Ok(())
    }

    /// Fill both halves with a constant byte, used to blank the panel
    pub fn write_fill(&mut self, fill: u8) -> Result<(), RenderError> {
        let row = vec![fill; self.geometry.half_row()];
        for half in [Half::Master, Half::Slave] {
            self.in_pass(half, |epd| {
                for r in 0..epd.geometry.rows {
                    epd.interface.data(&row)?;
                    epd.row_done(half, r);
                }
                Ok(())
            })?;
            if half == Half::Master {
                self.delay.delay_ms(PASS_SETTLE_MS);
            }
        }
        Ok(())
    }

    fn write_half<R: Read>(
        &mut self,
        reader: &mut R,
        half: Half,
        row: &mut [u8],
    ) -> Result<(), RenderError> {
        log::info!("Streaming {} half", half);
        self.in_pass(half, |epd| {
            for r in 0..epd.geometry.rows {
                match half {
                    Half::Master => {
                        read_half_row(reader, row, half, r)?;
                        epd.interface.data(row)?;
                        // slave half of this row, discarded
                        read_half_row(reader, row, half, r)?;
                    }
                    Half::Slave => {
                        read_half_row(reader, row, half, r)?;
                        read_half_row(reader, row, half, r)?;
                        epd.interface.data(row)?;
                    }
                }
                epd.row_done(half, r);
            }
            Ok(())
        })?;
        log::info!("{} half done", half);
        Ok(())
    }

    /// Select `half`, send DATA_START and run `body`. The select is released
    /// whatever `body` returns.
    fn in_pass<F>(&mut self, half: Half, body: F) -> Result<(), RenderError>
    where
        F: FnOnce(&mut Self) -> Result<(), RenderError>,
    {
        let started = self
            .interface
            .select(half.select())
            .and_then(|_| self.interface.cmd(Cmd::DTM));
        let result = match started {
            Ok(()) => body(self),
            Err(e) => Err(e.into()),
        };
        let released = self.interface.deselect_all();

        if let Err(e) = &result {
            log::error!("{} pass aborted: {}", half, e);
        }
        result?;
        released?;
        Ok(())
    }

    fn row_done(&mut self, half: Half, row: usize) {
        if (row + 1) % ROWS_PER_FEED == 0 {
            self.keep_alive.feed();
            log::debug!("{} half: {}/{} rows", half, row + 1, self.geometry.rows);
        }
    }
}

fn read_half_row<R: Read>(
    reader: &mut R,
    buf: &mut [u8],
    half: Half,
    row: usize,
) -> Result<(), RenderError> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => RenderError::ShortRead { half, row },
        _ => RenderError::Io(e),
    })
}
