//! Broker profiles selecting which replies the autopilot synthesizes.

use crate::error::FuzzError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Behavioral profile that gates which replies the autopilot synthesizes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FuzzMode {
    #[default]
    Handshake,
    Connected,
    Subscribe,
    Qos,
    Mqtt5,
    /// Resolved from the low nibble of the first input byte when a transport is created.
    Dynamic,
}

impl FuzzMode {
    pub const ALL: [Self; 6] = [
        Self::Handshake,
        Self::Connected,
        Self::Subscribe,
        Self::Qos,
        Self::Mqtt5,
        Self::Dynamic,
    ];

    /// Maps the integer run parameter; unknown values fall back to `Handshake`.
    #[must_use]
    pub fn from_raw(raw: i32) -> Self {
        match raw {
            1 => Self::Connected,
            2 => Self::Subscribe,
            3 => Self::Qos,
            4 => Self::Mqtt5,
            5 => Self::Dynamic,
            _ => Self::Handshake,
        }
    }

    #[must_use]
    pub fn as_raw(self) -> i32 {
        match self {
            Self::Handshake => 0,
            Self::Connected => 1,
            Self::Subscribe => 2,
            Self::Qos => 3,
            Self::Mqtt5 => 4,
            Self::Dynamic => 5,
        }
    }

    /// Maps a DYNAMIC selector byte. Only the low nibble counts and
    /// selectors above 4 mean `Handshake`.
    #[must_use]
    pub fn from_selector(byte: u8) -> Self {
        match byte & 0x0F {
            0x01 => Self::Connected,
            0x02 => Self::Subscribe,
            0x03 => Self::Qos,
            0x04 => Self::Mqtt5,
            _ => Self::Handshake,
        }
    }

    #[must_use]
    pub fn selector(self) -> Option<u8> {
        match self {
            Self::Dynamic => None,
            other => u8::try_from(other.as_raw()).ok(),
        }
    }

    /// Resolves `Dynamic` against the raw input.
    ///
    /// Returns the effective mode and how many leading input bytes were
    /// consumed by the selector. Concrete modes and empty inputs consume nothing.
    #[must_use]
    pub fn resolve(self, input: &[u8]) -> (Self, usize) {
        match (self, input.first()) {
            (Self::Dynamic, Some(&selector)) => (Self::from_selector(selector), 1),
            (mode, _) => (mode, 0),
        }
    }

    /// Name lookup that keeps the permissive fallback to `Handshake`.
    #[must_use]
    pub fn from_name_lossy(name: &str) -> Self {
        name.parse().unwrap_or_default()
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Handshake => "handshake",
            Self::Connected => "connected",
            Self::Subscribe => "subscribe",
            Self::Qos => "qos",
            Self::Mqtt5 => "mqtt5",
            Self::Dynamic => "dynamic",
        }
    }

    #[must_use]
    pub fn answers_connect(self) -> bool {
        matches!(self, Self::Connected | Self::Mqtt5)
    }

    #[must_use]
    pub fn answers_subscribe(self) -> bool {
        matches!(self, Self::Subscribe | Self::Connected | Self::Mqtt5)
    }

    #[must_use]
    pub fn answers_pubrel(self) -> bool {
        matches!(self, Self::Qos | Self::Connected)
    }

    #[must_use]
    pub fn is_v5(self) -> bool {
        self == Self::Mqtt5
    }
}

impl FromStr for FuzzMode {
    type Err = FuzzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                FuzzError::Configuration(format!(
                    "unknown mode '{s}', expected one of handshake, connected, subscribe, qos, mqtt5, dynamic"
                ))
            })
    }
}

impl fmt::Display for FuzzMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_mapping() {
        for mode in FuzzMode::ALL {
            assert_eq!(FuzzMode::from_raw(mode.as_raw()), mode);
        }
        assert_eq!(FuzzMode::from_raw(-1), FuzzMode::Handshake);
        assert_eq!(FuzzMode::from_raw(6), FuzzMode::Handshake);
    }

    #[test]
    fn test_selector_uses_low_nibble() {
        assert_eq!(FuzzMode::from_selector(0x02), FuzzMode::Subscribe);
        assert_eq!(FuzzMode::from_selector(0xF2), FuzzMode::Subscribe);
        assert_eq!(FuzzMode::from_selector(0x34), FuzzMode::Mqtt5);
        assert_eq!(FuzzMode::from_selector(0x05), FuzzMode::Handshake);
        assert_eq!(FuzzMode::from_selector(0x0F), FuzzMode::Handshake);
    }

    #[test]
    fn test_selector_never_resolves_to_dynamic() {
        for byte in 0..=u8::MAX {
            assert_ne!(FuzzMode::from_selector(byte), FuzzMode::Dynamic);
        }
    }

    #[test]
    fn test_resolve_dynamic() {
        assert_eq!(
            FuzzMode::Dynamic.resolve(&[0x01, 0x20]),
            (FuzzMode::Connected, 1)
        );
        assert_eq!(FuzzMode::Dynamic.resolve(&[]), (FuzzMode::Dynamic, 0));
        assert_eq!(FuzzMode::Qos.resolve(&[0x01]), (FuzzMode::Qos, 0));
    }

    #[test]
    fn test_selector_round_trip() {
        for mode in FuzzMode::ALL {
            if let Some(selector) = mode.selector() {
                assert_eq!(FuzzMode::from_selector(selector), mode);
            }
        }
        assert_eq!(FuzzMode::Dynamic.selector(), None);
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("connected".parse::<FuzzMode>().unwrap(), FuzzMode::Connected);
        assert_eq!("MQTT5".parse::<FuzzMode>().unwrap(), FuzzMode::Mqtt5);
        assert!("broker".parse::<FuzzMode>().is_err());
        assert_eq!(FuzzMode::from_name_lossy("broker"), FuzzMode::Handshake);
    }

    #[test]
    fn test_reply_gates() {
        assert!(!FuzzMode::Handshake.answers_connect());
        assert!(FuzzMode::Connected.answers_connect());
        assert!(FuzzMode::Mqtt5.answers_subscribe());
        assert!(!FuzzMode::Qos.answers_subscribe());
        assert!(FuzzMode::Qos.answers_pubrel());
        assert!(!FuzzMode::Mqtt5.answers_pubrel());
    }
}
