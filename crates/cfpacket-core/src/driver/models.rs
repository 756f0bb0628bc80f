//! Supported display models
//!
//! Each model maps to a protocol generation. Only the packet-mode
//! generations (2 and 3) are driven by this crate.

use serde::{Deserialize, Serialize};

use crate::protocol::{ProtocolError, MAX_DATA_SIZE};

/// Protocol generation spoken by a model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolVariant {
    /// Legacy byte-stream protocol, no framing or responses
    Protocol1,
    /// Packet protocol with contrast and backlight control
    Protocol2,
    /// Packet protocol without contrast or backlight commands
    Protocol3,
}

/// What a model can do
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Accepts the contrast command
    pub has_contrast: bool,
    /// Accepts the backlight command
    pub has_backlight: bool,
    /// Largest payload the model accepts in one frame
    pub payload_limit: usize,
    /// SCAB sub-variant (model key ended in `+`)
    pub scab: bool,
}

/// A display model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Model {
    /// Marketing name, as reported by the version command
    pub name: String,
    /// Text rows
    pub rows: u8,
    /// Text columns
    pub cols: u8,
    /// General purpose inputs
    pub gpis: u8,
    /// General purpose outputs
    pub gpos: u8,
    /// Protocol generation
    pub protocol: ProtocolVariant,
    /// Maximum payload for data commands
    pub payload: usize,
    /// SCAB sub-variant
    pub scab: bool,
}

const MODELS: &[(&str, &str, u8, u8, u8, u8, ProtocolVariant, usize)] = &[
    ("533", "CFA533", 2, 16, 4, 4, ProtocolVariant::Protocol2, 18),
    ("626", "CFA626", 2, 16, 0, 0, ProtocolVariant::Protocol1, 0),
    ("631", "CFA631", 2, 20, 4, 0, ProtocolVariant::Protocol3, 22),
    ("632", "CFA632", 2, 16, 0, 0, ProtocolVariant::Protocol1, 0),
    ("633", "CFA633", 2, 16, 4, 4, ProtocolVariant::Protocol2, 18),
    ("634", "CFA634", 4, 20, 0, 0, ProtocolVariant::Protocol1, 0),
    ("635", "CFA635", 4, 20, 4, 12, ProtocolVariant::Protocol3, 22),
    ("636", "CFA636", 2, 16, 0, 0, ProtocolVariant::Protocol1, 0),
];

impl Model {
    /// Look up a model by key such as `"635"`; a trailing `+` selects the SCAB variant
    pub fn lookup(key: &str) -> Result<Self, ProtocolError> {
        let key = key.trim();
        let (base, scab) = match key.strip_suffix('+') {
            Some(base) => (base, true),
            None => (key, false),
        };
        let base = base.strip_prefix("CFA").unwrap_or(base);

        MODELS
            .iter()
            .find(|m| m.0 == base)
            .map(|&(_, name, rows, cols, gpis, gpos, protocol, payload)| Self {
                name: name.to_string(),
                rows,
                cols,
                gpis,
                gpos,
                protocol,
                payload,
                scab,
            })
            .ok_or_else(|| ProtocolError::UnsupportedModel(key.to_string()))
    }

    /// Look up a model and require that it speaks the packet protocol
    pub fn lookup_packet(key: &str) -> Result<Self, ProtocolError> {
        let model = Self::lookup(key)?;
        if model.protocol == ProtocolVariant::Protocol1 {
            return Err(ProtocolError::UnsupportedModel(format!(
                "{} does not use the packet protocol",
                model.name
            )));
        }
        Ok(model)
    }

    /// Capability table for this model
    pub fn capabilities(&self) -> Capabilities {
        let packet = self.protocol == ProtocolVariant::Protocol2;
        Capabilities {
            has_contrast: packet,
            has_backlight: packet,
            payload_limit: self.payload.min(MAX_DATA_SIZE),
            scab: self.scab,
        }
    }
}
