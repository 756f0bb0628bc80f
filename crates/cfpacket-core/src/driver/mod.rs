//! Crystalfontz packet-mode display driver
//!
//! Wraps a [`PacketEngine`] with the model-specific command set and the
//! device lifecycle:
//!
//! ```text
//! Disconnected -> Connecting -> Initializing -> Ready -> ShuttingDown -> Disconnected
//! ```
//!
//! Protocol 2 and protocol 3 differ only in their [`Capabilities`]; a write
//! the model cannot perform is logged and skipped.

pub mod models;
pub mod runner;
mod version;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

use crate::config::DriverConfig;
use crate::protocol::commands::{
    CLEAR_SCREEN, GET_VERSION_INFO, PING, POWER_CONTROL, REBOOT_PAYLOAD, SET_BACKLIGHT,
    SET_CHAR_DATA, SET_CURSOR_STYLE, SET_FAN_POWER, SET_GPIO, SET_LCD_CONTRAST, WRITE_DATA,
};
use crate::protocol::{
    open_port, transfer_rate_ms, Command, EngineStats, Packet, PacketBuilder, PacketEngine,
    PacketListener, Priority, ProtocolError, ResponseHandler, SerialLink,
};

pub use models::{Capabilities, Model, ProtocolVariant};
pub use runner::{spawn, DriverHandle};
pub use version::DeviceVersion;

/// Longest message accepted by [`CrystalfontzDriver::ping`]
pub const MAX_PING_LEN: usize = 16;

/// Number of fan channels on fan-capable modules
pub const FAN_COUNT: usize = 4;

/// Highest custom character slot
pub const MAX_SPECIAL_CHAR: u8 = 7;

/// Lifecycle state of a display
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceState {
    /// No port open
    Disconnected,
    /// Port open, setup not started
    Connecting,
    /// Setup commands queued or awaiting responses
    Initializing,
    /// Setup finished
    Ready,
    /// Reboot sent, port closing
    ShuttingDown,
}

/// Snapshot of a driver for status reporting
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DriverStatus {
    /// Lifecycle state
    pub state: DeviceState,
    /// Configured model
    pub model: String,
    /// Version reported by the device, once known
    pub version: Option<DeviceVersion>,
    /// When the current link was opened
    pub connected_at: Option<DateTime<Utc>>,
    /// Link counters
    pub stats: EngineStats,
}

/// Driver for one packet-mode display
pub struct CrystalfontzDriver {
    engine: PacketEngine,
    model: Model,
    caps: Capabilities,
    config: DriverConfig,
    state: DeviceState,
    fans: [u8; FAN_COUNT],
    version: Arc<Mutex<Option<DeviceVersion>>>,
    connected_at: Option<DateTime<Utc>>,
}

impl CrystalfontzDriver {
    /// Create a driver for the configured model. Nothing is opened yet.
    pub fn new(config: DriverConfig) -> Result<Self, ProtocolError> {
        let model = Model::lookup_packet(&config.model)?;
        let caps = model.capabilities();
        debug!(model = %model.name, ?caps, "driver created");

        Ok(Self {
            engine: PacketEngine::new(config.engine_config()),
            model,
            caps,
            config,
            state: DeviceState::Disconnected,
            fans: [0; FAN_COUNT],
            version: Arc::new(Mutex::new(None)),
            connected_at: None,
        })
    }

    /// Model driven by this instance
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Capability flags for the model
    pub fn capabilities(&self) -> Capabilities {
        self.caps
    }

    /// Configuration the driver was created with
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Lifecycle state
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Version reported by the device, once the reply has arrived
    pub fn version(&self) -> Option<DeviceVersion> {
        self.version.lock().ok().and_then(|v| v.clone())
    }

    /// Current fan power levels
    pub fn fans(&self) -> [u8; FAN_COUNT] {
        self.fans
    }

    /// Link counters
    pub fn stats(&self) -> &EngineStats {
        self.engine.stats()
    }

    /// Underlying engine
    pub fn engine(&self) -> &PacketEngine {
        &self.engine
    }

    /// Update period for the send/read/scan cycle, in milliseconds
    pub fn transfer_rate_ms(&self) -> u64 {
        transfer_rate_ms(self.config.baud)
    }

    /// Install the receiver for key, fan and temperature reports
    pub fn set_listener(&mut self, listener: Box<dyn PacketListener>) {
        self.engine.set_listener(listener);
    }

    /// Status snapshot
    pub fn status(&self) -> DriverStatus {
        DriverStatus {
            state: self.state,
            model: self.model.name.clone(),
            version: self.version(),
            connected_at: self.connected_at,
            stats: self.engine.stats().clone(),
        }
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Open the configured serial port
    pub fn connect(&mut self) -> Result<(), ProtocolError> {
        if self.engine.is_attached() {
            return Err(ProtocolError::AlreadyConnected);
        }
        self.state = DeviceState::Connecting;
        match open_port(&self.config.port, Some(self.config.baud)) {
            Ok(channel) => {
                self.attach(Box::new(channel));
                Ok(())
            }
            Err(e) => {
                self.state = DeviceState::Disconnected;
                Err(e)
            }
        }
    }

    /// Use an already open link instead of the configured port
    pub fn connect_with(&mut self, link: Box<dyn SerialLink>) -> Result<(), ProtocolError> {
        if self.engine.is_attached() {
            return Err(ProtocolError::AlreadyConnected);
        }
        self.state = DeviceState::Connecting;
        self.attach(link);
        Ok(())
    }

    fn attach(&mut self, link: Box<dyn SerialLink>) {
        self.engine.attach(link);
        self.connected_at = Some(Utc::now());
        info!(
            "Connected to {} on {} at {} baud",
            self.model.name, self.config.port, self.config.baud
        );
    }

    /// Queue the startup sequence: version query, contrast, backlight,
    /// clear screen and cursor style.
    pub fn setup_device(&mut self) -> Result<(), ProtocolError> {
        if !self.engine.is_attached() {
            return Err(ProtocolError::NotConnected);
        }
        self.state = DeviceState::Initializing;

        self.initiate_version()?;
        self.set_contrast(self.config.contrast)?;
        self.set_backlight(self.config.backlight)?;
        self.clear_lcd()?;
        self.set_cursor_style(0)?;
        Ok(())
    }

    /// Connect to the configured port and start setup
    pub fn start(&mut self) -> Result<(), ProtocolError> {
        self.connect()?;
        self.setup_device()
    }

    fn initiate_version(&mut self) -> Result<(), ProtocolError> {
        let slot = self.version.clone();
        let expected = self.model.name.clone();
        self.get_version(Some(Box::new(move |result: Result<Packet, ProtocolError>| {
            let packet = match result {
                Ok(packet) => packet,
                Err(e) => {
                    warn!("Version query failed: {}", e);
                    return;
                }
            };
            let Some(version) = DeviceVersion::parse(&packet.data) else {
                warn!(
                    "Unrecognised version reply: {:?}",
                    String::from_utf8_lossy(&packet.data)
                );
                return;
            };
            if version.model != expected {
                warn!(
                    "Device model mismatch: configured {}, device reports {}",
                    expected, version.model
                );
            }
            info!(
                "{} hardware {} firmware {}",
                version.model, version.hardware, version.firmware
            );
            if let Ok(mut slot) = slot.lock() {
                *slot = Some(version);
            }
        })))
    }

    /// Send a reboot, drop all pending work and close the link
    pub fn take_down(&mut self) {
        if !self.engine.is_attached() {
            self.state = DeviceState::Disconnected;
            return;
        }
        self.state = DeviceState::ShuttingDown;
        if let Err(e) = self.reboot(true) {
            warn!("Reboot on shutdown failed: {}", e);
        }
        let dropped = self.engine.abandon_all();
        self.engine.detach();
        self.connected_at = None;
        self.state = DeviceState::Disconnected;
        info!("Display {} taken down ({} commands abandoned)", self.model.name, dropped);
    }

    /// One send/read/scan cycle.
    ///
    /// An I/O failure tears the link down and is returned.
    pub fn update(&mut self) -> Result<(), ProtocolError> {
        if let Err(e) = self.engine.update() {
            self.fail(&e);
            return Err(e);
        }
        if self.state == DeviceState::Initializing && self.engine.is_idle() {
            self.state = DeviceState::Ready;
            info!("Display {} ready", self.model.name);
        }
        Ok(())
    }

    /// Resend or abandon one timed-out request
    pub fn bin_watch(&mut self) -> Result<(), ProtocolError> {
        self.engine.bin_watch().inspect_err(|e| self.fail(e))
    }

    fn fail(&mut self, error: &ProtocolError) {
        warn!("Link to {} lost: {}", self.model.name, error);
        let dropped = self.engine.abandon_all();
        self.engine.detach();
        self.connected_at = None;
        self.state = DeviceState::Disconnected;
        debug!(dropped, "driver disconnected");
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    fn submit(
        &mut self,
        command: Command,
        handler: Option<ResponseHandler>,
        send_now: bool,
    ) -> Result<(), ProtocolError> {
        self.engine
            .send_command(command, handler, Priority::Normal, send_now)
    }

    /// Echo request; the display answers with the same bytes
    pub fn ping(
        &mut self,
        message: &[u8],
        handler: Option<ResponseHandler>,
    ) -> Result<(), ProtocolError> {
        if message.len() > MAX_PING_LEN {
            return Err(ProtocolError::PayloadTooLarge {
                len: message.len(),
                max: MAX_PING_LEN,
            });
        }
        let command = Command::new(PING, message.to_vec())?;
        self.submit(command, handler, false)
    }

    /// Ask for the hardware and firmware version
    pub fn get_version(&mut self, handler: Option<ResponseHandler>) -> Result<(), ProtocolError> {
        self.submit(Command::empty(GET_VERSION_INFO), handler, false)
    }

    /// Reboot the display. `send_now` bypasses the queues.
    pub fn reboot(&mut self, send_now: bool) -> Result<(), ProtocolError> {
        let command = Command::new(POWER_CONTROL, REBOOT_PAYLOAD.to_vec())?;
        self.submit(command, None, send_now)
    }

    /// Blank the screen and home the cursor
    pub fn clear_lcd(&mut self) -> Result<(), ProtocolError> {
        self.submit(Command::empty(CLEAR_SCREEN), None, false)
    }

    /// Load an 8-row glyph into custom character slot `index` (0-7)
    pub fn set_special_char(&mut self, index: u8, glyph: [u8; 8]) -> Result<(), ProtocolError> {
        if index > MAX_SPECIAL_CHAR {
            return Err(ProtocolError::InvalidArgument(format!(
                "special character index {} out of range 0-{}",
                index, MAX_SPECIAL_CHAR
            )));
        }
        let command = PacketBuilder::new(SET_CHAR_DATA)
            .byte(index)
            .bytes(&glyph)
            .build()?;
        self.submit(command, None, false)
    }

    /// Select cursor style 0-4; anything else is ignored
    pub fn set_cursor_style(&mut self, style: i32) -> Result<(), ProtocolError> {
        let Ok(style) = u8::try_from(style) else {
            debug!(style, "cursor style ignored");
            return Ok(());
        };
        if style > 4 {
            debug!(style, "cursor style ignored");
            return Ok(());
        }
        let command = PacketBuilder::new(SET_CURSOR_STYLE).byte(style).build()?;
        self.submit(command, None, false)
    }

    /// Set contrast, clamped to 0-50
    pub fn set_contrast(&mut self, level: i32) -> Result<(), ProtocolError> {
        if !self.caps.has_contrast {
            debug!(level, model = %self.model.name, "contrast not supported");
            return Ok(());
        }
        let command = PacketBuilder::new(SET_LCD_CONTRAST)
            .clamped(level, 0, 50)
            .build()?;
        self.submit(command, None, false)
    }

    /// Set backlight, clamped to 0-100
    pub fn set_backlight(&mut self, level: i32) -> Result<(), ProtocolError> {
        if !self.caps.has_backlight {
            debug!(level, model = %self.model.name, "backlight not supported");
            return Ok(());
        }
        let command = PacketBuilder::new(SET_BACKLIGHT)
            .clamped(level, 0, 100)
            .build()?;
        self.submit(command, None, false)
    }

    /// Set one fan's power (0-100) and send all four levels
    pub fn set_fan_power(&mut self, fan: usize, value: i32) -> Result<(), ProtocolError> {
        if fan >= FAN_COUNT {
            return Err(ProtocolError::InvalidArgument(format!(
                "fan {} out of range 0-{}",
                fan,
                FAN_COUNT - 1
            )));
        }
        self.fans[fan] = value.clamp(0, 100) as u8;
        let command = PacketBuilder::new(SET_FAN_POWER).bytes(&self.fans).build()?;
        self.submit(command, None, false)
    }

    /// Write text at (`row`, `col`).
    ///
    /// Text past the end of the row, or past what one frame can carry, is
    /// dropped.
    pub fn send_data(&mut self, row: u8, col: u8, text: &[u8]) -> Result<(), ProtocolError> {
        if row >= self.model.rows || col >= self.model.cols {
            return Err(ProtocolError::InvalidArgument(format!(
                "position ({}, {}) outside {}x{} display",
                row, col, self.model.rows, self.model.cols
            )));
        }
        let room = usize::from(self.model.cols - col);
        let len = text
            .len()
            .min(room)
            .min(self.caps.payload_limit.saturating_sub(2));
        let command = PacketBuilder::new(WRITE_DATA)
            .byte(col)
            .byte(row)
            .bytes(&text[..len])
            .build()?;
        self.submit(command, None, false)
    }

    /// Drive GPIO `index` at `value` percent (clamped to 0-100)
    pub fn set_gpio(&mut self, index: u8, value: i32) -> Result<(), ProtocolError> {
        if index >= self.model.gpos {
            return Err(ProtocolError::InvalidArgument(format!(
                "GPIO {} out of range for {}",
                index, self.model.name
            )));
        }
        let command = PacketBuilder::new(SET_GPIO)
            .byte(index)
            .clamped(value, 0, 100)
            .build()?;
        self.submit(command, None, false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(model: &str) -> DriverConfig {
        DriverConfig {
            port: "/dev/null-test".to_string(),
            model: model.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_rejects_legacy_models() {
        assert!(matches!(
            CrystalfontzDriver::new(config("634")),
            Err(ProtocolError::UnsupportedModel(_))
        ));
        assert!(CrystalfontzDriver::new(config("633")).is_ok());
    }

    #[test]
    fn test_setup_requires_link() {
        let mut driver = CrystalfontzDriver::new(config("635")).unwrap();
        assert_eq!(driver.state(), DeviceState::Disconnected);
        assert!(matches!(
            driver.setup_device(),
            Err(ProtocolError::NotConnected)
        ));
    }

    #[test]
    fn test_capability_no_ops_do_not_queue() {
        let mut driver = CrystalfontzDriver::new(config("635")).unwrap();
        driver.set_contrast(30).unwrap();
        driver.set_backlight(30).unwrap();
        assert_eq!(driver.engine().queued(), 0);

        let mut driver = CrystalfontzDriver::new(config("633")).unwrap();
        driver.set_contrast(30).unwrap();
        driver.set_backlight(30).unwrap();
        assert_eq!(driver.engine().queued(), 2);
    }

    #[test]
    fn test_argument_checks() {
        let mut driver = CrystalfontzDriver::new(config("633")).unwrap();
        assert!(driver.ping(&[0u8; 17], None).is_err());
        assert!(driver.set_special_char(8, [0; 8]).is_err());
        assert!(driver.set_fan_power(4, 10).is_err());
        assert!(driver.send_data(2, 0, b"x").is_err());
        assert!(driver.set_gpio(4, 10).is_err());

        driver.set_cursor_style(5).unwrap();
        driver.set_cursor_style(-1).unwrap();
        assert_eq!(driver.engine().queued(), 0);
    }

    #[test]
    fn test_fan_levels_are_remembered() {
        let mut driver = CrystalfontzDriver::new(config("633")).unwrap();
        driver.set_fan_power(1, 150).unwrap();
        driver.set_fan_power(3, -5).unwrap();
        assert_eq!(driver.fans(), [0, 100, 0, 0]);
    }

    #[test]
    fn test_take_down_without_link() {
        let mut driver = CrystalfontzDriver::new(config("635")).unwrap();
        driver.take_down();
        assert_eq!(driver.state(), DeviceState::Disconnected);
        assert!(driver.status().connected_at.is_none());
    }
}
