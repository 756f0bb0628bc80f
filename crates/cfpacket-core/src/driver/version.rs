//! Hardware/firmware version reported by the display

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Parsed reply to the version command, e.g. `CFA635:h1.4,v1.9`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceVersion {
    /// Model name as reported
    pub model: String,
    /// Hardware revision
    pub hardware: String,
    /// Firmware revision
    pub firmware: String,
}

fn version_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(CFA.*?):h(.*?),v(.*?)$").expect("valid version regex"))
}

impl DeviceVersion {
    /// Parse the payload of a version response
    pub fn parse(payload: &[u8]) -> Option<Self> {
        let text = String::from_utf8_lossy(payload);
        let caps = version_re().captures(text.trim_end_matches(['\0', ' ']))?;
        Some(Self {
            model: caps[1].to_string(),
            hardware: caps[2].to_string(),
            firmware: caps[3].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        let v = DeviceVersion::parse(b"CFA635:h1.4,v1.9").unwrap();
        assert_eq!(v.model, "CFA635");
        assert_eq!(v.hardware, "1.4");
        assert_eq!(v.firmware, "1.9");
    }

    #[test]
    fn test_parse_padded_version() {
        let v = DeviceVersion::parse(b"CFA633:h1.5c,v1.0 ").unwrap();
        assert_eq!(v.model, "CFA633");
        assert_eq!(v.firmware, "1.0");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(DeviceVersion::parse(b"hello").is_none());
        assert!(DeviceVersion::parse(b"").is_none());
    }
}
