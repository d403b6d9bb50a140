//! Display interface using SPI with two manually driven chip selects
use crate::epd::sequence::{Select, RESET_PULSES};
use display_interface::DisplayError;
use embedded_hal::{
    delay::DelayNs,
    digital::{InputPin, OutputPin},
    spi::SpiDevice,
};

/// Control lines of the panel besides the SPI clock and data
pub struct PanelPins<BSY, OUT> {
    /// LOW while the panel is busy, HIGH when idle
    pub busy: BSY,
    /// Data/Command control pin (High for data, Low for command)
    pub dc: OUT,
    /// Pin for Reseting
    pub rst: OUT,
    /// Chip select of the master (left) controller, active low
    pub cs_master: OUT,
    /// Chip select of the slave (right) controller, active low
    pub cs_slave: OUT,
    /// Panel power rail enable
    pub power: OUT,
}

/// The connection interface of the dual controller panel
///
/// The SPI device must be configured without a hardware CS line; both
/// selects are driven here so a single transaction can address one or both
/// controllers.
pub struct DisplayInterface<SPI, BSY, OUT> {
    /// SPI device
    spi: SPI,
    /// Busy line, read through [`crate::epd::BusyWait`]
    pub(crate) busy: BSY,
    dc: OUT,
    rst: OUT,
    cs_master: OUT,
    cs_slave: OUT,
    power: OUT,
}

impl<SPI, BSY, OUT> DisplayInterface<SPI, BSY, OUT> {
    /// Create the interface, no lines are touched yet
    pub fn new(spi: SPI, pins: PanelPins<BSY, OUT>) -> Self {
        DisplayInterface {
            spi,
            busy: pins.busy,
            dc: pins.dc,
            rst: pins.rst,
            cs_master: pins.cs_master,
            cs_slave: pins.cs_slave,
            power: pins.power,
        }
    }
}

impl<SPI, BSY, OUT> DisplayInterface<SPI, BSY, OUT>
where
    SPI: SpiDevice,
    BSY: InputPin,
    OUT: OutputPin,
{
    /// Put the lines in their idle state: both controllers deselected,
    /// command mode.
    pub(crate) fn park(&mut self) -> Result<(), DisplayError> {
        self.deselect_all()?;
        self.dc.set_low().map_err(|_| DisplayError::DCError)
    }

    /// Assert the chip select(s) for `target`. Master goes first when both
    /// are selected.
    pub(crate) fn select(&mut self, target: Select) -> Result<(), DisplayError> {
        if matches!(target, Select::Master | Select::Both) {
            self.cs_master.set_low().map_err(|_| DisplayError::CSError)?;
        }
        if matches!(target, Select::Slave | Select::Both) {
            self.cs_slave.set_low().map_err(|_| DisplayError::CSError)?;
        }
        Ok(())
    }

    /// Release both chip selects; every transaction ends this way.
    pub(crate) fn deselect_all(&mut self) -> Result<(), DisplayError> {
        self.cs_master.set_high().map_err(|_| DisplayError::CSError)?;
        self.cs_slave.set_high().map_err(|_| DisplayError::CSError)
    }

    /// Basic function for sending commands
    pub(crate) fn cmd(&mut self, command: u8) -> Result<(), DisplayError> {
        // low for commands
        self.dc.set_low().map_err(|_| DisplayError::DCError)?;

        match self.spi.write(&[command]) {
            Ok(_) => Ok(()),
            Err(e) => {
                log::error!("SPI write error for command 0x{:02X}: {:?}", command, e);
                Err(DisplayError::BusWriteError)
            }
        }
    }

    /// Basic function for sending an array of u8-values of data over spi
    pub(crate) fn data(&mut self, data: &[u8]) -> Result<(), DisplayError> {
        if data.is_empty() {
            return Ok(());
        }
        // high for data
        self.dc.set_high().map_err(|_| DisplayError::DCError)?;
        self.spi
            .write(data)
            .map_err(|_| DisplayError::BusWriteError)
    }

    /// Basic function for sending a command and the data belonging to it.
    pub(crate) fn cmd_with_data(&mut self, command: u8, data: &[u8]) -> Result<(), DisplayError> {
        self.cmd(command)?;
        self.data(data)
    }

    /// One complete transaction: select, command, parameters, release.
    pub(crate) fn transaction(
        &mut self,
        target: Select,
        command: u8,
        data: &[u8],
    ) -> Result<(), DisplayError> {
        self.select(target)?;
        let sent = self.cmd_with_data(command, data);
        // release even when the write failed
        let released = self.deselect_all();
        sent.and(released)
    }

    /// Drive the reset line through the power-up pulse train
    pub(crate) fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), DisplayError> {
        for (level, hold_ms) in RESET_PULSES {
            if level {
                self.rst.set_high().map_err(|_| DisplayError::RSError)?;
            } else {
                self.rst.set_low().map_err(|_| DisplayError::RSError)?;
            }
            delay.delay_ms(hold_ms);
        }
        Ok(())
    }

    /// Switch the panel power rail
    pub(crate) fn set_power(&mut self, on: bool) -> Result<(), DisplayError> {
        // the rail shares the generic control-line error
        if on {
            self.power.set_high().map_err(|_| DisplayError::RSError)
        } else {
            self.power.set_low().map_err(|_| DisplayError::RSError)
        }
    }
}
