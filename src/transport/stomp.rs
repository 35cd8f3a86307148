//! A STOMP client for RabbitMQ's web-STOMP endpoint.
//!
//! The client is an ordinary value: build it with [`StompClient::connect`],
//! pass it by reference to whatever needs it and end it with
//! [`StompClient::disconnect`]. Two background tasks own the socket halves;
//! the client only holds channels to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio_tungstenite::connect_async;
use tracing::{debug, error, info, warn};
use tungstenite::protocol::Message as WsMessage;

use super::frame::{Command, Frame};
use crate::config::StompSettings;
use crate::utils::{RelayError, Result};

type Routes = Arc<Mutex<HashMap<String, UnboundedSender<Value>>>>;

/// Messages delivered to one subscription, already parsed as JSON.
#[derive(Debug)]
pub struct Subscription {
    pub id: String,
    pub destination: String,
    receiver: UnboundedReceiver<Value>,
}

impl Subscription {
    /// Waits for the next message. `None` once the session has ended.
    pub async fn next(&mut self) -> Option<Value> {
        self.receiver.recv().await
    }
}

pub struct StompClient {
    outbound: UnboundedSender<WsMessage>,
    routes: Routes,
    connected: Arc<AtomicBool>,
    next_id: AtomicU64,
    writer: JoinHandle<()>,
    reader: JoinHandle<()>,
}

impl StompClient {
    /// Opens the WebSocket, performs the CONNECT handshake and starts the
    /// reader and writer tasks.
    pub async fn connect(settings: &StompSettings) -> Result<Self> {
        let (ws_stream, _) = connect_async(settings.url.as_str()).await?;
        let (mut ws_sender, mut ws_receiver) = ws_stream.split();

        let connect = Frame::new(Command::Connect)
            .header("accept-version", "1.2")
            .header("host", settings.vhost.as_str())
            .header("login", settings.login.as_str())
            .header("passcode", settings.passcode.as_str())
            .header("heart-beat", "0,0");
        ws_sender.send(WsMessage::text(connect.encode())).await?;

        loop {
            let msg = match ws_receiver.next().await {
                Some(msg) => msg?,
                None => return Err(RelayError::NotConnected),
            };
            if msg.is_close() {
                return Err(RelayError::NotConnected);
            }
            let Some(frame) = decode_message(msg)? else {
                continue;
            };
            match frame.command {
                Command::Connected => {
                    info!(
                        url = %settings.url,
                        version = frame.get("version").unwrap_or("1.0"),
                        "connected to STOMP broker"
                    );
                    break;
                }
                Command::Error => {
                    return Err(RelayError::Stomp(broker_message(&frame)));
                }
                other => debug!(command = other.as_str(), "ignoring frame before CONNECTED"),
            }
        }

        let connected = Arc::new(AtomicBool::new(true));
        let routes: Routes = Arc::new(Mutex::new(HashMap::new()));

        // Spawn a task to forward frames from client → broker
        let (outbound, mut rx) = mpsc::unbounded_channel::<WsMessage>();
        let writer = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = ws_sender.send(msg).await {
                    error!(error = %e, "failed to send STOMP frame");
                    break;
                }
            }
            let _ = ws_sender.close().await;
        });

        let reader_routes = routes.clone();
        let reader_connected = connected.clone();
        let reader = tokio::spawn(async move {
            while let Some(Ok(msg)) = ws_receiver.next().await {
                if msg.is_close() {
                    break;
                }
                match decode_message(msg) {
                    Ok(Some(frame)) => dispatch(frame, &reader_routes),
                    Ok(None) => {}
                    Err(e) => warn!(error = %e, "dropping unreadable frame"),
                }
            }
            reader_connected.store(false, Ordering::SeqCst);
            // dropping the senders ends every open subscription
            reader_routes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear();
            info!("STOMP session closed");
        });

        Ok(Self {
            outbound,
            routes,
            connected,
            next_id: AtomicU64::new(0),
            writer,
            reader,
        })
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Subscribes to a named queue (`/queue/<queue>`).
    pub fn subscribe_to_queue(&self, queue: &str) -> Result<Subscription> {
        self.subscribe(format!("/queue/{queue}"))
    }

    /// Subscribes to an exchange through a server-named queue bound with `binding_key`.
    pub fn subscribe_to_exchange(&self, exchange: &str, binding_key: &str) -> Result<Subscription> {
        self.subscribe(format!("/exchange/{exchange}/{binding_key}"))
    }

    fn subscribe(&self, destination: String) -> Result<Subscription> {
        let id = format!("sub-{}", self.next_id.fetch_add(1, Ordering::SeqCst));
        let (tx, receiver) = mpsc::unbounded_channel();
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), tx);

        let frame = Frame::new(Command::Subscribe)
            .header("id", id.as_str())
            .header("destination", destination.as_str())
            .header("ack", "auto");
        if let Err(e) = self.send_frame(&frame) {
            self.routes
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&id);
            return Err(e);
        }

        debug!(%id, %destination, "subscribed");
        Ok(Subscription {
            id,
            destination,
            receiver,
        })
    }

    pub fn unsubscribe(&self, subscription: &Subscription) -> Result<()> {
        self.routes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&subscription.id);
        self.send_frame(&Frame::new(Command::Unsubscribe).header("id", subscription.id.as_str()))
    }

    /// Publishes `payload` as JSON to `exchange` under `routing_key`.
    pub fn send(&self, exchange: &str, routing_key: &str, payload: &Value) -> Result<()> {
        let body = serde_json::to_string(payload)?;
        let frame = Frame::new(Command::Send)
            .header("destination", format!("/exchange/{exchange}/{routing_key}"))
            .header("content-type", "application/json")
            .with_body(body);
        self.send_frame(&frame)
    }

    fn send_frame(&self, frame: &Frame) -> Result<()> {
        if !self.is_connected() {
            return Err(RelayError::NotConnected);
        }
        self.outbound
            .send(WsMessage::text(frame.encode()))
            .map_err(|_| RelayError::NotConnected)
    }

    /// Sends DISCONNECT, flushes pending frames and stops both tasks.
    pub async fn disconnect(self) -> Result<()> {
        let result = self.send_frame(&Frame::new(Command::Disconnect));
        self.connected.store(false, Ordering::SeqCst);
        drop(self.outbound);
        let _ = self.writer.await;
        self.reader.abort();
        info!("disconnected from STOMP broker");
        result
    }
}

fn decode_message(msg: WsMessage) -> Result<Option<Frame>> {
    if !(msg.is_text() || msg.is_binary()) {
        return Ok(None);
    }
    let data = msg.into_data();
    let text = std::str::from_utf8(&data).map_err(|e| RelayError::Frame(e.to_string()))?;
    Frame::decode(text)
}

fn broker_message(frame: &Frame) -> String {
    frame
        .get("message")
        .map(str::to_string)
        .unwrap_or_else(|| frame.body.clone())
}

fn dispatch(frame: Frame, routes: &Routes) {
    match frame.command {
        Command::Message => {
            let Some(id) = frame.get("subscription") else {
                warn!("MESSAGE without subscription header");
                return;
            };
            let payload: Value = match serde_json::from_str(&frame.body) {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(subscription = id, error = %e, "skipping non-JSON message");
                    return;
                }
            };
            let routes = routes.lock().unwrap_or_else(PoisonError::into_inner);
            match routes.get(id) {
                Some(tx) => {
                    let _ = tx.send(payload);
                }
                None => debug!(subscription = id, "message for unknown subscription"),
            }
        }
        Command::Error => error!(message = %broker_message(&frame), "broker error"),
        Command::Receipt => debug!(receipt = frame.get("receipt-id"), "receipt"),
        other => debug!(command = other.as_str(), "unexpected frame"),
    }
}
