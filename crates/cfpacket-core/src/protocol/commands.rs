//! Command codes
//!
//! Codes understood by packet-mode modules. Codes 0x07, 0x08, 0x0F and 0x15
//! are deprecated and 0x20 is reserved; they are never sent.

use serde::{Deserialize, Serialize};

/// Echo the payload back
pub const PING: u8 = 0x00;
/// Read the model, hardware and firmware string
pub const GET_VERSION_INFO: u8 = 0x01;
/// Write the 16-byte user flash area
pub const WRITE_FLASH_AREA: u8 = 0x02;
/// Read the 16-byte user flash area
pub const READ_FLASH_AREA: u8 = 0x03;
/// Save the current state as the power-on state
pub const STORE_AS_BOOT: u8 = 0x04;
/// Reboot the display or reset the host
pub const POWER_CONTROL: u8 = 0x05;
/// Blank the LCD and home the cursor
pub const CLEAR_SCREEN: u8 = 0x06;
/// Load a custom character bitmap
pub const SET_CHAR_DATA: u8 = 0x09;
/// Read 8 bytes of LCD controller memory
pub const READ_LCD_MEMORY: u8 = 0x0A;
/// Move the cursor
pub const SET_CURSOR_POS: u8 = 0x0B;
/// Choose the cursor shape
pub const SET_CURSOR_STYLE: u8 = 0x0C;
/// Set the LCD contrast
pub const SET_LCD_CONTRAST: u8 = 0x0D;
/// Set the backlight level
pub const SET_BACKLIGHT: u8 = 0x0E;
/// Enable fan tachometer reports
pub const SET_FAN_REPORTING: u8 = 0x10;
/// Set fan power levels
pub const SET_FAN_POWER: u8 = 0x11;
/// Read a DOW device's ROM id
pub const READ_DOW_DEVICE: u8 = 0x12;
/// Enable temperature sensor reports
pub const SET_TEMP_REPORTING: u8 = 0x13;
/// Raw DOW bus transaction
pub const DOW_TRANSACTION: u8 = 0x14;
/// Pass a byte straight to the LCD controller
pub const DIRECT_LCD_CMD: u8 = 0x16;
/// Choose which key events are reported
pub const SET_KEY_REPORTING: u8 = 0x17;
/// Poll the keypad
pub const READ_KEY_STATE: u8 = 0x18;
/// Set which fans fall back to full power
pub const SET_FAN_FAILSAFE: u8 = 0x19;
/// Set the fan tachometer glitch filter
pub const SET_FAN_TACH_GLITCH: u8 = 0x1A;
/// Read the fan power and fail-safe mask
pub const GET_FAN_FAILSAFE: u8 = 0x1B;
/// Configure the ATX power switch functions
pub const SET_ATX_POWER_SW: u8 = 0x1C;
/// Arm or disarm the host watchdog
pub const MANAGE_WATCHDOG: u8 = 0x1D;
/// Read the reporting and status settings
pub const REPORTING_STATUS: u8 = 0x1E;
/// Write text at a row and column
pub const WRITE_DATA: u8 = 0x1F;
/// Change the link speed
pub const SET_BAUD_RATE: u8 = 0x21;
/// Drive a GPIO pin
pub const SET_GPIO: u8 = 0x22;
/// Read a GPIO pin and its configuration
pub const GET_GPIO: u8 = 0x23;

/// Payload of a reboot request (POWER_CONTROL)
pub const REBOOT_PAYLOAD: [u8; 3] = [8, 18, 99];

const COMMAND_NAMES: [&str; 36] = [
    "Ping",
    "Read Version",
    "Write Flash",
    "Read Flash",
    "Store Boot State",
    "Reboot",
    "Clear LCD",
    "LCD Line 1",
    "LCD Line 2",
    "LCD CGRAM",
    "Read LCD Memory",
    "Place Cursor",
    "Set Cursor Style",
    "Contrast",
    "Backlight",
    "Read Fans",
    "Set Fan Rpt.",
    "Set Fan Power",
    "Read DOW ID",
    "Set Temp. Rpt",
    "DOW Transaction",
    "Set Live Display",
    "Direct LCD Command",
    "Set Key Event Reporting",
    "Read Keypad, Polled Mode",
    "Set Fan Fail-Safe",
    "Set Fan RPM Glitch Filter",
    "Read Fan Pwr & Fail-Safe",
    "Set ATX switch functionality",
    "Watchdog Host Reset",
    "Rd Rpt",
    "Send Data to LCD (row,col)",
    "Key Legends",
    "Set Baud Rate",
    "Set/Configure GPIO",
    "Read GPIO & Configuration",
];

/// Human-readable name for the command index in the low six bits of `code`
pub fn command_name(code: u8) -> &'static str {
    COMMAND_NAMES
        .get((code & 0x3F) as usize)
        .copied()
        .unwrap_or("Unknown")
}

/// Unsolicited reports sent by the display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Report {
    /// A key was pressed or released
    KeyActivity,
    /// Fan tachometer reading
    FanSpeed,
    /// Temperature sensor reading
    TempSensor,
}

impl Report {
    /// Report type for a command byte, if it is one
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0x80 => Some(Report::KeyActivity),
            0x81 => Some(Report::FanSpeed),
            0x82 => Some(Report::TempSensor),
            _ => None,
        }
    }
}
