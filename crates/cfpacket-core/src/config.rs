//! Driver configuration
//!
//! Stored as JSON, either as a standalone object or as a named section of a
//! larger document:
//!
//! ```json
//! {
//!   "display_cf635": {
//!     "port": "/dev/ttyUSB0",
//!     "model": "635",
//!     "contrast": 120,
//!     "backlight": 80
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::protocol::{
    EngineConfig, DEFAULT_BAUD_RATE, DEFAULT_MAX_RETRIES, DEFAULT_RESPONSE_TIMEOUT_MS,
};

/// Errors loading a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid JSON for a driver config
    #[error("Invalid config JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// The named section is absent
    #[error("Config section not found: {0}")]
    MissingSection(String),
}

/// Settings for one packet-mode display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverConfig {
    /// Serial port name (e.g. "/dev/ttyUSB0" or "COM3")
    pub port: String,

    /// Baud rate
    pub baud: u32,

    /// Model key, e.g. "633" or "635+"
    pub model: String,

    /// Contrast applied at startup (clamped by the model's range)
    pub contrast: i32,

    /// Backlight applied at startup, 0-100
    pub backlight: i32,

    /// Time to wait for a response before resending, in milliseconds
    pub response_timeout_ms: u64,

    /// Resends before a command is abandoned (0 = never)
    pub max_retries: u32,

    /// Commands allowed on the wire without a response
    pub command_limit: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud: DEFAULT_BAUD_RATE,
            model: "635".to_string(),
            contrast: 120,
            backlight: 100,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            max_retries: DEFAULT_MAX_RETRIES,
            command_limit: 1,
        }
    }
}

impl DriverConfig {
    /// Parse a standalone JSON object
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse the section `name` of a JSON document
    pub fn from_json_section(json: &str, name: &str) -> Result<Self, ConfigError> {
        let root: serde_json::Value = serde_json::from_str(json)?;
        let section = root
            .get(name)
            .cloned()
            .ok_or_else(|| ConfigError::MissingSection(name.to_string()))?;
        Ok(serde_json::from_value(section)?)
    }

    /// Load from a file, optionally picking a named section
    pub fn load(path: &Path, section: Option<&str>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        match section {
            Some(name) => Self::from_json_section(&text, name),
            None => Self::from_json_str(&text),
        }
    }

    /// Engine settings derived from this config
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            response_timeout: Duration::from_millis(self.response_timeout_ms.max(1)),
            command_limit: self.command_limit.max(1),
            max_retries: self.max_retries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = DriverConfig::from_json_str("{}").unwrap();
        assert_eq!(config, DriverConfig::default());
        assert_eq!(config.baud, 115200);
        assert_eq!(config.contrast, 120);
        assert_eq!(config.backlight, 100);
        assert_eq!(config.response_timeout_ms, 250);
        assert_eq!(config.command_limit, 1);
    }

    #[test]
    fn test_partial_override() {
        let config =
            DriverConfig::from_json_str(r#"{"port": "/dev/ttyUSB1", "model": "633+", "backlight": 40}"#)
                .unwrap();
        assert_eq!(config.port, "/dev/ttyUSB1");
        assert_eq!(config.model, "633+");
        assert_eq!(config.backlight, 40);
        assert_eq!(config.baud, 115200);
    }

    #[test]
    fn test_named_section() {
        let json = r#"{"other": {}, "lcd": {"port": "COM3", "response_timeout_ms": 400}}"#;
        let config = DriverConfig::from_json_section(json, "lcd").unwrap();
        assert_eq!(config.port, "COM3");
        assert_eq!(config.engine_config().response_timeout, Duration::from_millis(400));

        assert!(matches!(
            DriverConfig::from_json_section(json, "missing"),
            Err(ConfigError::MissingSection(_))
        ));
    }

    #[test]
    fn test_engine_config_floors() {
        let config = DriverConfig {
            command_limit: 0,
            response_timeout_ms: 0,
            ..Default::default()
        };
        let engine = config.engine_config();
        assert_eq!(engine.command_limit, 1);
        assert_eq!(engine.response_timeout, Duration::from_millis(1));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"lcd": {{"port": "/dev/ttyACM0", "max_retries": 3}}}}"#).unwrap();

        let config = DriverConfig::load(file.path(), Some("lcd")).unwrap();
        assert_eq!(config.port, "/dev/ttyACM0");
        assert_eq!(config.max_retries, 3);

        assert!(matches!(
            DriverConfig::load(file.path(), None),
            Ok(DriverConfig { .. })
        ));
        assert!(DriverConfig::load(Path::new("/nonexistent/cfpacket.json"), None).is_err());
    }
}
