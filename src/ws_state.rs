//! Backend connection state
//!
//! Shared between the WebSocket client task and whoever displays status.

/// Backend WebSocket connection state
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WsState {
    Connecting,
    Connected,
    Disconnected,
    Error(String),
}

impl WsState {
    pub fn is_connected(&self) -> bool {
        matches!(self, WsState::Connected)
    }

    pub fn label(&self) -> &str {
        match self {
            WsState::Connecting => "connecting",
            WsState::Connected => "connected",
            WsState::Disconnected => "disconnected",
            WsState::Error(msg) => msg,
        }
    }
}
