//! The `error` module defines the error type used across `inform_relay`.
//!
//! Every fallible operation returns [`RelayError`], so callers can tell a
//! broker failure from a downstream rejection without matching on strings.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("amqp error: {0}")]
    Amqp(#[from] lapin::Error),

    /// The broker negatively confirmed a publish.
    #[error("publish to {0} was not confirmed")]
    Nacked(String),

    /// A declaration or routing step was refused by the broker.
    #[error("broker topology error: {0}")]
    Topology(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered, but not with a 2xx status.
    #[error("downstream responded {status}: {body}")]
    Downstream { status: u16, body: String },

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("malformed stomp frame: {0}")]
    Frame(String),

    /// The STOMP broker sent an ERROR frame.
    #[error("stomp broker error: {0}")]
    Stomp(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("not connected")]
    NotConnected,
}
