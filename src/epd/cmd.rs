/// Command opcodes understood by both controller halves of the 13.3" panel.
pub struct Cmd;

#[allow(missing_docs)]
impl Cmd {
    // Power control
    pub const PSR: u8 = 0x00;
    pub const PWR_EPD: u8 = 0x01;
    pub const POF: u8 = 0x02;
    pub const PON: u8 = 0x04;
    pub const BTST_N: u8 = 0x05;
    pub const BTST_P: u8 = 0x06;

    // Image transfer and refresh
    pub const DTM: u8 = 0x10;
    pub const DRF: u8 = 0x12;

    // Panel configuration
    pub const CDI: u8 = 0x50;
    pub const TCON: u8 = 0x60;
    pub const TRES: u8 = 0x61;
    pub const AN_TM: u8 = 0x74;
    pub const AGID: u8 = 0x86;
    pub const BUCK_BOOST_VDDN: u8 = 0xB0;
    pub const TFT_VCOM_POWER: u8 = 0xB1;
    pub const EN_BUF: u8 = 0xB6;
    pub const BOOST_VDDP_EN: u8 = 0xB7;
    pub const CCSET: u8 = 0xE0;
    pub const PWS: u8 = 0xE3;
    pub const CMD66: u8 = 0xF0;
}

/*
Vendor firmware names:
0x00 - Panel Setting
0x01 - Power Setting
0x02 - Power OFF (one parameter byte)
0x04 - Power ON
0x10 - Data Start Transmission
0x12 - Display Refresh (one parameter byte)
0x50 - VCOM and Data Interval
0x61 - Resolution Setting
*/
