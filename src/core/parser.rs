//! Parser for backend WebSocket messages
//!
//! Two message kinds matter: pushed events (`sources-updated`,
//! `dmx-updated`) and responses to our own requests. Everything else
//! (`connected`, status chatter) is ignored.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, trace, warn};

use super::source::{Source, Universe};

/// Payload of a `dmx-updated` notification. The frame itself is fetched
/// separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DmxNotice {
    pub universe: Universe,
    #[serde(default, alias = "sourceIp")]
    pub source_ip: Option<String>,
    /// Backend receive time (Unix ms)
    #[serde(default)]
    pub timestamp: Option<u64>,
}

/// Event pushed by the backend
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Full replacement of the source list
    SourcesUpdated(Vec<Source>),
    DmxUpdated(DmxNotice),
}

/// A decoded inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(BackendEvent),
    Response {
        id: u64,
        result: Result<Value, String>,
    },
}

/// Parse one text frame from the backend.
///
/// Returns None for malformed or uninteresting messages.
pub fn parse_message(msg: &str) -> Option<Inbound> {
    trace!(len = msg.len(), "Parsing message");

    let json: Value = serde_json::from_str(msg)
        .map_err(|e| {
            warn!(error = %e, "Failed to parse JSON");
        })
        .ok()?;

    match json["type"].as_str()? {
        "event" => parse_event(&json).map(Inbound::Event),
        "response" => parse_response(&json),
        other => {
            trace!(msg_type = other, "Ignoring message");
            None
        }
    }
}

fn parse_event(json: &Value) -> Option<BackendEvent> {
    let name = json["event"].as_str()?;
    let payload = json["payload"].clone();

    match name {
        "sources-updated" => {
            let sources: Vec<Source> = serde_json::from_value(payload)
                .map_err(|e| {
                    warn!(error = %e, "Failed to parse source list");
                })
                .ok()?;
            debug!(count = sources.len(), "Sources updated");
            Some(BackendEvent::SourcesUpdated(sources))
        }
        "dmx-updated" => {
            let notice: DmxNotice = serde_json::from_value(payload)
                .map_err(|e| {
                    warn!(error = %e, "Failed to parse dmx-updated payload");
                })
                .ok()?;
            trace!(universe = notice.universe, "DMX updated");
            Some(BackendEvent::DmxUpdated(notice))
        }
        _ => {
            trace!(event = name, "Ignoring event");
            None
        }
    }
}

fn parse_response(json: &Value) -> Option<Inbound> {
    let id = json["id"].as_u64()?;
    let result = match json.get("error") {
        Some(err) if !err.is_null() => Err(err
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| err.to_string())),
        _ => Ok(json.get("result").cloned().unwrap_or(Value::Null)),
    };
    Some(Inbound::Response { id, result })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dmx_updated() {
        let msg = r#"{
            "type": "event",
            "event": "dmx-updated",
            "payload": {"universe": 3, "sourceIp": "10.0.0.5", "timestamp": 1700000000000}
        }"#;

        let parsed = parse_message(msg);
        assert_eq!(
            parsed,
            Some(Inbound::Event(BackendEvent::DmxUpdated(DmxNotice {
                universe: 3,
                source_ip: Some("10.0.0.5".to_string()),
                timestamp: Some(1_700_000_000_000),
            })))
        );
    }

    #[test]
    fn test_parse_sources_updated() {
        let msg = r#"{
            "type": "event",
            "event": "sources-updated",
            "payload": [
                {"id": "a", "ip": "10.0.0.1", "protocol": "artnet", "universes": [1, 3]},
                {"id": "b", "ip": "10.0.0.2", "protocol": "sACN", "universes": [2, 3]}
            ]
        }"#;

        match parse_message(msg) {
            Some(Inbound::Event(BackendEvent::SourcesUpdated(sources))) => {
                assert_eq!(sources.len(), 2);
                assert_eq!(sources[1].universes, vec![2, 3]);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parse_responses() {
        let ok = r#"{"type": "response", "id": 7, "result": [0, 255]}"#;
        assert_eq!(
            parse_message(ok),
            Some(Inbound::Response { id: 7, result: Ok(serde_json::json!([0, 255])) })
        );

        let err = r#"{"type": "response", "id": 8, "error": "no such universe"}"#;
        assert_eq!(
            parse_message(err),
            Some(Inbound::Response { id: 8, result: Err("no such universe".to_string()) })
        );

        let null_result = r#"{"type": "response", "id": 9, "result": null}"#;
        assert_eq!(
            parse_message(null_result),
            Some(Inbound::Response { id: 9, result: Ok(Value::Null) })
        );
    }

    #[test]
    fn test_ignore_other_messages() {
        assert!(parse_message(r#"{"type": "connected", "data": {}}"#).is_none());
        assert!(parse_message(r#"{"type": "event", "event": "sniffer-status", "payload": {}}"#).is_none());
        assert!(parse_message(r#"{"type": "event", "event": "dmx-updated", "payload": {}}"#).is_none());
        assert!(parse_message("not json").is_none());
    }
}
