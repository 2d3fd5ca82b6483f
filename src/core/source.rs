//! Record types shared with the backend
//!
//! The backend owns discovery and protocol decoding; these types only mirror
//! what it reports. Field names follow the backend's snake_case output, with
//! camelCase aliases accepted for payloads relayed through a frontend.

use serde::{Deserialize, Serialize};

/// DMX universe number as reported by the backend
pub type Universe = u16;

/// 1-based channel number within a universe (1..=512)
pub type Channel = u16;

/// Milliseconds on the caller's clock
pub type Millis = u64;

/// Number of channels in one DMX universe
pub const CHANNELS_PER_UNIVERSE: usize = 512;

/// Wire protocol a source was discovered on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    #[serde(alias = "artNet", alias = "ArtNet")]
    ArtNet,
    #[serde(rename = "sACN", alias = "sacn")]
    Sacn,
}

/// Backend-side classification of a source by time since its last packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Active,
    Idle,
    Stale,
}

/// An upstream device or application advertising one or more universes.
///
/// Read-only reference data: the engine joins universes to sources for
/// display but never mutates them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub ip: String,
    #[serde(default)]
    pub hostname: Option<String>,
    pub protocol: Protocol,
    #[serde(default)]
    pub universes: Vec<Universe>,
    #[serde(default)]
    pub status: Option<SourceStatus>,
    #[serde(default)]
    pub fps: f32,
    #[serde(default, alias = "packetCount")]
    pub packet_count: u64,
    #[serde(default, alias = "duplicateUniverses")]
    pub duplicate_universes: Vec<Universe>,
    #[serde(default, alias = "firstSeen")]
    pub first_seen: Option<u64>,
    #[serde(default, alias = "lastSeen")]
    pub last_seen: Option<u64>,

    // Art-Net specific
    #[serde(default, alias = "artnetShortName", skip_serializing_if = "Option::is_none")]
    pub artnet_short_name: Option<String>,
    #[serde(default, alias = "artnetLongName", skip_serializing_if = "Option::is_none")]
    pub artnet_long_name: Option<String>,
    #[serde(default, alias = "macAddress", skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,

    // sACN specific
    #[serde(default, alias = "sacnCid", skip_serializing_if = "Option::is_none")]
    pub sacn_cid: Option<String>,
    #[serde(default, alias = "sacnPriority", skip_serializing_if = "Option::is_none")]
    pub sacn_priority: Option<u8>,
}

impl Source {
    /// Minimal source record, mostly useful for tests and fixtures
    pub fn new(id: impl Into<String>, ip: impl Into<String>, protocol: Protocol) -> Self {
        Self {
            id: id.into(),
            name: None,
            ip: ip.into(),
            hostname: None,
            protocol,
            universes: Vec::new(),
            status: None,
            fps: 0.0,
            packet_count: 0,
            duplicate_universes: Vec::new(),
            first_seen: None,
            last_seen: None,
            artnet_short_name: None,
            artnet_long_name: None,
            mac_address: None,
            sacn_cid: None,
            sacn_priority: None,
        }
    }

    /// Builder-style universe list
    pub fn with_universes(mut self, universes: impl IntoIterator<Item = Universe>) -> Self {
        self.universes = universes.into_iter().collect();
        self
    }

    /// Name to show in views: explicit name, else the IP
    pub fn display_name(&self) -> &str {
        match self.name.as_deref() {
            Some(name) if !name.is_empty() => name,
            _ => &self.ip,
        }
    }

    pub fn advertises(&self, universe: Universe) -> bool {
        self.universes.contains(&universe)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_backend_source() {
        let json = r#"{
            "id": "artnet-10.0.0.5",
            "ip": "10.0.0.5",
            "hostname": null,
            "name": "Console",
            "protocol": "artnet",
            "universes": [1, 2],
            "status": "active",
            "fps": 44.0,
            "packet_count": 1200,
            "first_seen": 1,
            "last_seen": 2,
            "mac_address": "00:11:22:33:44:55"
        }"#;

        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.protocol, Protocol::ArtNet);
        assert_eq!(source.universes, vec![1, 2]);
        assert_eq!(source.packet_count, 1200);
        assert_eq!(source.status, Some(SourceStatus::Active));
        assert_eq!(source.mac_address.as_deref(), Some("00:11:22:33:44:55"));
        assert!(source.sacn_priority.is_none());
        assert_eq!(source.display_name(), "Console");
    }

    #[test]
    fn test_parse_camel_case_sacn_source() {
        let json = r#"{
            "id": "sacn-abc",
            "ip": "10.0.0.9",
            "protocol": "sACN",
            "universes": [7],
            "packetCount": 3,
            "duplicateUniverses": [7],
            "sacnPriority": 100
        }"#;

        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.protocol, Protocol::Sacn);
        assert_eq!(source.packet_count, 3);
        assert_eq!(source.duplicate_universes, vec![7]);
        assert_eq!(source.sacn_priority, Some(100));
        assert_eq!(source.display_name(), "10.0.0.9");
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let json = r#"{"id": "x", "protocol": "artnet"}"#;
        assert!(serde_json::from_str::<Source>(json).is_err());
    }
}
