//! Fixed command tables for the panel.
//!
//! The init table is a vendor contract: order, payloads and which controller
//! half receives each entry must match the panel firmware byte for byte.

use crate::epd::cmd::Cmd;

/// Which controller half a transaction addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Select {
    /// Left half controller
    Master,
    /// Right half controller
    Slave,
    /// Both controllers under one select pulse
    Both,
}

impl Select {
    /// Short name used in log lines and errors
    pub fn as_str(self) -> &'static str {
        match self {
            Select::Master => "master",
            Select::Slave => "slave",
            Select::Both => "both",
        }
    }
}

impl std::fmt::Display for Select {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a command table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InitStep {
    /// Opcode from [`Cmd`]
    pub cmd: u8,
    /// Controller(s) selected for the whole transaction
    pub select: Select,
    /// Parameter bytes sent after the opcode
    pub data: &'static [u8],
}

impl InitStep {
    const fn new(cmd: u8, select: Select, data: &'static [u8]) -> Self {
        Self { cmd, select, data }
    }
}

/// Reset line levels and the hold time after each level, in order.
pub const RESET_PULSES: [(bool, u32); 5] = [
    (true, 30),
    (false, 30),
    (true, 30),
    (false, 30),
    (true, 30),
];

/// Power rail settle time before re-initialising after sleep
pub const POWER_ON_SETTLE_MS: u32 = 100;

/// Pause between POWER_ON completing and DISPLAY_REFRESH
pub const REFRESH_SETTLE_MS: u32 = 50;

/// Pause between the master and slave data passes
pub const PASS_SETTLE_MS: u32 = 50;

/// Parameter byte of DISPLAY_REFRESH
pub const REFRESH_PARAM: u8 = 0x00;

/// Parameter byte of POWER_OFF
pub const POWER_OFF_PARAM: u8 = 0x00;

/// Panel configuration, sent once after reset.
pub const INIT_SEQUENCE: [InitStep; 16] = [
    InitStep::new(
        Cmd::AN_TM,
        Select::Master,
        &[0xC0, 0x1C, 0x1C, 0xCC, 0xCC, 0xCC, 0x15, 0x15, 0x55],
    ),
    InitStep::new(
        Cmd::CMD66,
        Select::Both,
        &[0x49, 0x55, 0x13, 0x5D, 0x05, 0x10],
    ),
    InitStep::new(Cmd::PSR, Select::Both, &[0xDF, 0x69]),
    InitStep::new(Cmd::CDI, Select::Both, &[0xF7]),
    InitStep::new(Cmd::TCON, Select::Both, &[0x03, 0x03]),
    InitStep::new(Cmd::AGID, Select::Both, &[0x10]),
    InitStep::new(Cmd::PWS, Select::Both, &[0x22]),
    InitStep::new(Cmd::CCSET, Select::Both, &[0x01]),
    // 0x04B0 = 1200 sources, 0x0320 = 800 gates per controller
    InitStep::new(Cmd::TRES, Select::Both, &[0x04, 0xB0, 0x03, 0x20]),
    InitStep::new(
        Cmd::PWR_EPD,
        Select::Master,
        &[0x0F, 0x00, 0x28, 0x2C, 0x28, 0x38],
    ),
    InitStep::new(Cmd::EN_BUF, Select::Master, &[0x07]),
    InitStep::new(Cmd::BTST_P, Select::Master, &[0xE8, 0x28]),
    InitStep::new(Cmd::BOOST_VDDP_EN, Select::Master, &[0x01]),
    InitStep::new(Cmd::BTST_N, Select::Master, &[0xE8, 0x28]),
    InitStep::new(Cmd::BUCK_BOOST_VDDN, Select::Master, &[0x01]),
    InitStep::new(Cmd::TFT_VCOM_POWER, Select::Master, &[0x02]),
];
