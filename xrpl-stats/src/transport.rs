//! WebSocket transport multiplexing concurrent calls over one connection.
//!
//! Outbound calls are tagged with a monotonically increasing correlation id
//! and resolved from the matching tagged response; untagged push events are
//! forwarded to the registered event stream. One receive failure ends the
//! read loop — reconnection is the caller's responsibility via a fresh
//! [`WsClient::connect`].

use crate::{error::Error, protocol};
use futures::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use parking_lot::Mutex;
use serde_json::Value;
use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    task::JoinHandle,
};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};
use tracing::{debug, trace, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value, Error>>>>>;
type EventSlot = Arc<Mutex<Option<mpsc::UnboundedSender<u32>>>>;

/// Transport configuration.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Bound on connection establishment, handshake included.
    pub connect_timeout: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// How one inbound frame is routed. Every frame is classified exactly once.
#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    /// Resolves the pending call registered under this correlation id.
    /// `Err` carries the message of an embedded server error object, which
    /// takes precedence over any success payload.
    Response {
        id: u64,
        outcome: Result<Value, String>,
    },
    /// A ledger-closed push event carrying the closed ledger's index.
    LedgerClosed(u32),
    /// Unrecognized frame, silently dropped.
    Ignore,
}

/// Classify one inbound message.
pub fn classify(message: Value) -> Dispatch {
    if let Some(id) = message.get("id").and_then(Value::as_u64) {
        let outcome = match server_error_message(&message) {
            Some(reason) => Err(reason),
            None => Ok(message),
        };
        return Dispatch::Response { id, outcome };
    }

    if message.get("type").and_then(Value::as_str) == Some("ledgerClosed") {
        if let Some(index) = event_ledger_index(&message) {
            return Dispatch::LedgerClosed(index);
        }
    }

    Dispatch::Ignore
}

fn server_error_message(message: &Value) -> Option<String> {
    let error = message.get("error")?;

    // Servers disagree on the error shape: an object with an error_message,
    // a sibling error_message string, or a bare error code string.
    if let Some(text) = error.get("error_message").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    if let Some(text) = message.get("error_message").and_then(Value::as_str) {
        return Some(text.to_string());
    }
    if let Some(text) = error.as_str() {
        return Some(text.to_string());
    }

    Some("unknown server error".to_string())
}

/// The event's ledger index may arrive as a native integer or a numeric
/// string; both are accepted.
fn event_ledger_index(message: &Value) -> Option<u32> {
    match message.get("ledger_index")? {
        Value::Number(number) => number.as_u64().and_then(|index| u32::try_from(index).ok()),
        Value::String(text) => text.parse().ok(),
        _ => None,
    }
}

/// One multiplexing connection to one network endpoint.
pub struct WsClient {
    writer: tokio::sync::Mutex<SplitSink<WsStream, Message>>,
    pending: PendingMap,
    events: EventSlot,
    next_id: AtomicU64,
    reader: JoinHandle<()>,
}

impl WsClient {
    /// Open a WebSocket connection to `url`.
    ///
    /// Resolves once the handshake has completed; a handshake that does not
    /// complete within the configured timeout fails with
    /// [`Error::Connection`].
    pub async fn connect(url: &str, config: WsConfig) -> Result<Self, Error> {
        let handshake = tokio::time::timeout(config.connect_timeout, connect_async(url))
            .await
            .map_err(|_| {
                Error::Connection(format!(
                    "handshake timed out after {:?}",
                    config.connect_timeout
                ))
            })?;

        let (stream, _response) = handshake.map_err(|err| Error::Connection(err.to_string()))?;
        debug!(url, "WebSocket connected");

        let (writer, reader) = stream.split();
        let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
        let events: EventSlot = Arc::new(Mutex::new(None));

        let reader = tokio::spawn(read_loop(
            reader,
            Arc::clone(&pending),
            Arc::clone(&events),
        ));

        Ok(Self {
            writer: tokio::sync::Mutex::new(writer),
            pending,
            events,
            next_id: AtomicU64::new(0),
            reader,
        })
    }

    /// Issue one call and await the response carrying the same correlation
    /// id.
    ///
    /// A send failure resolves to [`Error::Transport`]; a connection closed
    /// with the call still in flight resolves to [`Error::Cancelled`] — the
    /// caller always terminates.
    pub async fn call(&self, mut request: Value) -> Result<Value, Error> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        request["id"] = Value::from(id);

        let (response_tx, response_rx) = oneshot::channel();
        self.pending.lock().insert(id, response_tx);

        let frame = Message::Text(request.to_string().into());
        if let Err(err) = self.writer.lock().await.send(frame).await {
            self.pending.lock().remove(&id);
            return Err(Error::Transport(err.to_string()));
        }

        match response_rx.await {
            Ok(outcome) => outcome,
            // Sender dropped without resolving: the connection died between
            // registration and cancellation.
            Err(_) => Err(Error::Cancelled),
        }
    }

    /// Enable ledger-closed push events on this connection and return their
    /// stream.
    ///
    /// A single handler is supported; registering again replaces the
    /// previous receiver.
    pub async fn subscribe_ledger_closed(&self) -> Result<mpsc::UnboundedReceiver<u32>, Error> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        *self.events.lock() = Some(event_tx);

        self.call(protocol::subscribe_ledger_request()).await?;
        Ok(event_rx)
    }

    /// Close the connection, cancelling every in-flight call.
    pub async fn disconnect(&self) {
        self.reader.abort();
        let _ = self.writer.lock().await.close().await;
        cancel_pending(&self.pending);
        debug!("WebSocket disconnected");
    }
}

impl Drop for WsClient {
    fn drop(&mut self) {
        // Dropping the pending map resolves awaiting callers as cancelled.
        self.reader.abort();
    }
}

fn cancel_pending(pending: &PendingMap) {
    let cancelled: Vec<_> = pending.lock().drain().collect();
    for (id, response_tx) in cancelled {
        trace!(id, "cancelling pending call");
        let _ = response_tx.send(Err(Error::Cancelled));
    }
}

/// Continuous receive loop for the life of the connection.
async fn read_loop(mut reader: SplitStream<WsStream>, pending: PendingMap, events: EventSlot) {
    while let Some(frame) = reader.next().await {
        match frame {
            Ok(Message::Text(text)) => handle_text(text.as_str(), &pending, &events),
            Ok(Message::Binary(bytes)) => {
                if let Ok(text) = std::str::from_utf8(&bytes) {
                    handle_text(text, &pending, &events);
                }
            }
            Ok(Message::Close(_)) => {
                debug!("server closed connection");
                break;
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {
                // Tungstenite answers pings itself.
            }
            Ok(_) => {}
            Err(err) => {
                warn!(%err, "WebSocket receive failed");
                break;
            }
        }
    }

    // Callers awaiting responses on a dead connection must observe
    // cancellation, not hang.
    cancel_pending(&pending);
}

fn handle_text(text: &str, pending: &PendingMap, events: &EventSlot) {
    let Ok(message) = serde_json::from_str::<Value>(text) else {
        trace!("dropping non-JSON frame");
        return;
    };

    match classify(message) {
        Dispatch::Response { id, outcome } => {
            let Some(response_tx) = pending.lock().remove(&id) else {
                trace!(id, "response for unknown correlation id");
                return;
            };
            let _ = response_tx.send(outcome.map_err(Error::Server));
        }
        Dispatch::LedgerClosed(index) => {
            let events = events.lock();
            match events.as_ref() {
                Some(event_tx) => {
                    let _ = event_tx.send(index);
                }
                None => trace!(index, "ledger-closed event with no registered handler"),
            }
        }
        Dispatch::Ignore => trace!("dropping unrecognized frame"),
    }
}
