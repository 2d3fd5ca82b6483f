//! Native WebSocket client for the monitoring backend
//!
//! A background task owns the socket. Pushed events are forwarded through a
//! bounded channel; requests are correlated with responses by id.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{json, Value};
use tokio::net::TcpStream;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::oneshot;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};

use crate::core::{parse_message, Backend, BackendError, BackendEvent, Inbound, Source, Universe};
use crate::ws_state::WsState;

/// Environment variable overriding the backend URL
pub const WS_URL_ENV: &str = "LXMON_WS";
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:38080/api/ws";

/// Queued events before new ones are dropped
const EVENT_QUEUE: usize = 4096;

type Reply = oneshot::Sender<Result<Value, BackendError>>;

struct Request {
    id: u64,
    method: String,
    params: Value,
    reply: Reply,
}

/// Cloneable handle to the backend connection
#[derive(Clone)]
pub struct WsBackend {
    requests: mpsc::UnboundedSender<Request>,
    state: Arc<Mutex<WsState>>,
    next_id: Arc<AtomicU64>,
}

impl WsBackend {
    /// Connect and spawn the socket task on the current runtime.
    ///
    /// Returns the handle and the stream of pushed events. The stream ends
    /// when the socket closes.
    pub async fn connect(url: &str) -> Result<(Self, mpsc::Receiver<BackendEvent>), BackendError> {
        let state = Arc::new(Mutex::new(WsState::Connecting));

        info!(url, "Connecting to backend");
        let ws_stream = match connect_async(url).await {
            Ok((stream, _)) => {
                info!("Backend connected");
                *state.lock() = WsState::Connected;
                stream
            }
            Err(e) => {
                error!(error = %e, "Failed to connect");
                return Err(BackendError::Connect(e.to_string()));
            }
        };

        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::channel(EVENT_QUEUE);
        tokio::spawn(Self::run_websocket(ws_stream, req_rx, event_tx, state.clone()));

        let backend = Self {
            requests: req_tx,
            state,
            next_id: Arc::new(AtomicU64::new(1)),
        };
        Ok((backend, event_rx))
    }

    pub fn state(&self) -> WsState {
        self.state.lock().clone()
    }

    /// Invoke a backend command and wait for its result
    pub async fn call(&self, method: &str, params: Value) -> Result<Value, BackendError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (reply, rx) = oneshot::channel();
        self.requests
            .send(Request {
                id,
                method: method.to_string(),
                params,
                reply,
            })
            .map_err(|_| BackendError::Closed)?;
        rx.await.map_err(|_| BackendError::Closed)?
    }

    /// Ask the backend to broadcast an Art-Net discovery poll
    pub async fn send_artnet_poll(&self) -> Result<(), BackendError> {
        self.call("send_artnet_poll", Value::Null).await.map(|_| ())
    }

    pub async fn get_network_interfaces(&self) -> Result<Value, BackendError> {
        self.call("get_network_interfaces", Value::Null).await
    }

    async fn run_websocket(
        ws_stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
        mut requests: mpsc::UnboundedReceiver<Request>,
        events: mpsc::Sender<BackendEvent>,
        state: Arc<Mutex<WsState>>,
    ) {
        let (mut write, mut read) = ws_stream.split();
        let mut pending: HashMap<u64, Reply> = HashMap::new();

        loop {
            tokio::select! {
                req = requests.recv() => {
                    let Some(req) = req else {
                        debug!("All backend handles dropped");
                        break;
                    };
                    let msg = json!({
                        "type": "request",
                        "id": req.id,
                        "method": req.method,
                        "params": req.params,
                    });
                    trace!(id = req.id, method = %req.method, "Sending request");
                    if let Err(e) = write.send(Message::Text(msg.to_string().into())).await {
                        error!(error = %e, "Failed to send request");
                        *state.lock() = WsState::Error(e.to_string());
                        let _ = req.reply.send(Err(BackendError::Socket(e.to_string())));
                        break;
                    }
                    pending.insert(req.id, req.reply);
                }
                msg = read.next() => match msg {
                    Some(Ok(Message::Text(text))) => match parse_message(&text) {
                        Some(Inbound::Event(event)) => match events.try_send(event) {
                            Ok(()) => {}
                            Err(TrySendError::Full(_)) => warn!("Event queue full, dropping event"),
                            Err(TrySendError::Closed(_)) => trace!("Event receiver dropped"),
                        },
                        Some(Inbound::Response { id, result }) => match pending.remove(&id) {
                            Some(reply) => {
                                let _ = reply.send(result.map_err(BackendError::Remote));
                            }
                            None => trace!(id, "Response for unknown request"),
                        },
                        None => {}
                    },
                    Some(Ok(Message::Close(_))) => {
                        warn!("WebSocket closed by server");
                        *state.lock() = WsState::Disconnected;
                        break;
                    }
                    Some(Err(e)) => {
                        error!(error = %e, "WebSocket error");
                        *state.lock() = WsState::Error(e.to_string());
                        break;
                    }
                    None => break,
                    _ => {}
                },
            }
        }

        warn!(pending = pending.len(), "WebSocket stream ended");
        for (_, reply) in pending.drain() {
            let _ = reply.send(Err(BackendError::Closed));
        }
        let mut state = state.lock();
        if state.is_connected() {
            *state = WsState::Disconnected;
        }
    }
}

impl Backend for WsBackend {
    async fn get_sources(&self) -> Result<Vec<Source>, BackendError> {
        let result = self.call("get_sources", Value::Null).await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn get_dmx_data(&self, universe: Universe) -> Result<Option<Vec<u8>>, BackendError> {
        let result = self.call("get_dmx_data", json!({ "universe": universe })).await?;
        Ok(serde_json::from_value(result)?)
    }
}
