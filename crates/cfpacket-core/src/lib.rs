//! # cfpacket Core Library
//!
//! Protocol engine and driver for Crystalfontz packet-mode character LCDs.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - Frame encoding, CRC-16 and stream resynchronisation
//! - A prioritised command queue with response tracking and resends
//! - The CFA533/633 and CFA631/635 command sets
//! - A tokio task that drives a display in the background
//!
//! ## Supported displays
//!
//! - CFA533, CFA633 (contrast and backlight control)
//! - CFA631, CFA635
//!
//! ## Example
//!
//! ```rust,ignore
//! use cfpacket_core::prelude::*;
//!
//! let config = DriverConfig::load(Path::new("cfpacket.json"), Some("display"))?;
//! let mut driver = CrystalfontzDriver::new(config)?;
//! driver.start()?;
//!
//! let (handle, task) = driver::spawn(driver);
//! handle.call(|d| d.send_data(0, 0, b"Hello")).await??;
//! ```

pub mod config;
pub mod driver;
pub mod protocol;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::{ConfigError, DriverConfig};
    pub use crate::driver::{
        Capabilities, CrystalfontzDriver, DeviceState, DeviceVersion, DriverHandle, DriverStatus,
        Model, ProtocolVariant,
    };
    pub use crate::protocol::{
        Command, EngineStats, Packet, PacketEngine, PacketListener, Priority, ProtocolError,
        SerialLink,
    };
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
