//! Driver for the 13.3" dual controller e-paper panel
//!
//! The driver is organised in three groups of functions:
//!
//! ### Initialisation
//! - `new()` - wrap the interface, nothing is sent yet
//! - `init()` - power rail, reset pulses and the fixed init table
//! - `wake()` - power the rail back up after `sleep()` and re-initialise
//!
//! ### Refresh cycle
//! - `refresh()` - POWER_ON, DISPLAY_REFRESH, POWER_OFF, each gated by a busy wait
//! - `sleep()` - POWER_OFF and drop the power rail
//!
//! ### Frame data
//! Streaming the framebuffer lives in [`crate::epd::render`].
//!
//! ## BUSY polarity
//!
//! The BUSY line of this panel is LOW while busy and HIGH when idle. A wait
//! that times out is logged and the sequence continues.

pub use display_interface::DisplayError;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{InputPin, OutputPin};
use embedded_hal::spi::SpiDevice;

use crate::epd::busy::{BusyWait, Clock, SystemClock, WaitOutcome};
use crate::epd::interface::{DisplayInterface, PanelPins};
use crate::epd::sequence::{
    InitStep, Select, INIT_SEQUENCE, POWER_OFF_PARAM, POWER_ON_SETTLE_MS, REFRESH_PARAM,
    REFRESH_SETTLE_MS,
};
use crate::epd::{cmd::Cmd, FrameGeometry};
use crate::keep_alive::KeepAlive;

/// Whether the init table has been sent since the last reset or sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelState {
    Uninitialized,
    Initialized,
}

/// Position in the power-on / refresh / power-off cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerState {
    Off,
    PoweredOn,
    Refreshing,
}

/// Busy wait results of one refresh cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshReport {
    pub power_on: WaitOutcome,
    pub refresh: WaitOutcome,
    pub power_off: WaitOutcome,
}

impl RefreshReport {
    /// `true` if any of the three waits gave up before the panel went idle
    pub fn timed_out(&self) -> bool {
        !(self.power_on.is_idle() && self.refresh.is_idle() && self.power_off.is_idle())
    }
}

/// 13.3" e-paper driver
///
/// ## Type Parameters
///
/// - `SPI` - SPI device for communication, without hardware CS
/// - `BSY` - BUSY input pin (LOW when the panel is busy)
/// - `OUT` - output pins: DC, RST, both chip selects and the power rail
/// - `DELAY` - Delay provider for timing
/// - `KA` - keep-alive fed from every blocking loop
pub struct Epd13in3<SPI, BSY, OUT, DELAY, KA> {
    pub(crate) interface: DisplayInterface<SPI, BSY, OUT>,
    pub(crate) delay: DELAY,
    pub(crate) keep_alive: KA,
    pub(crate) geometry: FrameGeometry,
    busy_wait: BusyWait,
    clock: Box<dyn Clock + Send>,
    state: PanelState,
    power: PowerState,
}

impl<SPI, BSY, OUT, DELAY, KA> Epd13in3<SPI, BSY, OUT, DELAY, KA>
where
    SPI: SpiDevice,
    BSY: InputPin,
    OUT: OutputPin,
    DELAY: DelayNs,
    KA: KeepAlive,
{
    /// Create the driver. The panel stays untouched until [`Self::init`].
    pub fn new(spi: SPI, pins: PanelPins<BSY, OUT>, delay: DELAY, keep_alive: KA) -> Self {
        Epd13in3 {
            interface: DisplayInterface::new(spi, pins),
            delay,
            keep_alive,
            geometry: FrameGeometry::PANEL,
            busy_wait: BusyWait::PANEL,
            clock: Box::new(SystemClock::new()),
            state: PanelState::Uninitialized,
            power: PowerState::Off,
        }
    }

    /// Override the busy wait timing
    pub fn with_busy_wait(mut self, busy_wait: BusyWait) -> Self {
        self.busy_wait = busy_wait;
        self
    }

    /// Measure busy wait timeouts on `clock` instead of the system clock
    pub fn with_clock(mut self, clock: impl Clock + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Override the frame layout, mostly useful for small test frames
    pub fn with_geometry(mut self, geometry: FrameGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn state(&self) -> PanelState {
        self.state
    }

    pub fn power_state(&self) -> PowerState {
        self.power
    }

    /// Bring the panel from power-off to an addressable state.
    pub fn init(&mut self) -> Result<(), DisplayError> {
        log::info!("Initialising panel");
        self.state = PanelState::Uninitialized;

        self.interface.park()?;
        self.interface.set_power(true)?;
        self.interface.reset(&mut self.delay)?;

        for step in INIT_SEQUENCE.iter() {
            self.send_step(step)?;
        }

        self.state = PanelState::Initialized;
        log::info!("Panel initialised ({} init commands)", INIT_SEQUENCE.len());
        Ok(())
    }

    /// One table entry: select, opcode, parameters, release
    fn send_step(&mut self, step: &InitStep) -> Result<(), DisplayError> {
        log::debug!(
            "init 0x{:02X} -> {} ({} bytes)",
            step.cmd,
            step.select,
            step.data.len()
        );
        self.interface.transaction(step.select, step.cmd, step.data)
    }

    /// Block on the BUSY line using the configured timing
    pub fn wait_idle(&mut self) -> WaitOutcome {
        self.busy_wait.wait(
            &mut self.interface.busy,
            &mut self.delay,
            &*self.clock,
            &mut self.keep_alive,
        )
    }

    /// Latch the transferred frame: POWER_ON, settle, DISPLAY_REFRESH,
    /// POWER_OFF. Always runs to the end, timeouts only show up in the report.
    pub fn refresh(&mut self) -> Result<RefreshReport, DisplayError> {
        log::info!("Refresh cycle start");

        self.interface.transaction(Select::Both, Cmd::PON, &[])?;
        self.power = PowerState::PoweredOn;
        let power_on = self.wait_idle();

        self.delay.delay_ms(REFRESH_SETTLE_MS);
        self.interface
            .transaction(Select::Both, Cmd::DRF, &[REFRESH_PARAM])?;
        self.power = PowerState::Refreshing;
        let refresh = self.wait_idle();

        self.interface
            .transaction(Select::Both, Cmd::POF, &[POWER_OFF_PARAM])?;
        let power_off = self.wait_idle();
        self.power = PowerState::Off;

        let report = RefreshReport {
            power_on,
            refresh,
            power_off,
        };
        if report.timed_out() {
            log::warn!("Refresh cycle finished with busy timeouts: {:?}", report);
        } else {
            log::info!("Refresh cycle done");
        }
        Ok(report)
    }

    /// Power the panel down and cut the rail. Needs [`Self::wake`] afterwards.
    pub fn sleep(&mut self) -> Result<(), DisplayError> {
        log::info!("Panel going to sleep");
        self.interface
            .transaction(Select::Both, Cmd::POF, &[POWER_OFF_PARAM])?;
        self.wait_idle();
        self.interface.set_power(false)?;
        self.power = PowerState::Off;
        self.state = PanelState::Uninitialized;
        Ok(())
    }

    /// Restore the power rail and re-run the init table
    pub fn wake(&mut self) -> Result<(), DisplayError> {
        log::info!("Waking panel");
        self.interface.set_power(true)?;
        self.delay.delay_ms(POWER_ON_SETTLE_MS);
        self.init()
    }
}
