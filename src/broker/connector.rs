//! Broker connection handling.
//!
//! Connecting is retried forever with a fixed delay. The attempt counter only
//! feeds the logs; nothing caps it.

use std::future::Future;
use std::time::Duration;

use lapin::{Channel, Connection, ConnectionProperties};
use tracing::{info, warn};

use crate::utils::Result;

/// An open AMQP connection together with the channel all work happens on.
pub struct AmqpLink {
    pub connection: Connection,
    pub channel: Channel,
}

impl AmqpLink {
    /// Connects to `url` and opens a channel.
    pub async fn open(url: &str) -> Result<Self> {
        let connection = Connection::connect(url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;
        Ok(Self {
            connection,
            channel,
        })
    }

    /// Closes the channel and then the connection, ignoring failures of an
    /// already broken link.
    pub async fn close(&self) {
        let _ = self.channel.close(200, "bye").await;
        let _ = self.connection.close(200, "bye").await;
    }
}

/// Runs `attempt_fn` until it succeeds, sleeping `delay` between failures.
///
/// The closure receives the 1-based attempt number. Errors are logged and
/// never returned.
pub async fn retry_forever<T, F, Fut>(delay: Duration, mut attempt_fn: F) -> T
where
    F: FnMut(u64) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u64 = 1;
    loop {
        info!(attempt, "trying broker connection");
        match attempt_fn(attempt).await {
            Ok(value) => return value,
            Err(e) => {
                warn!(
                    attempt,
                    error = %e,
                    retry_in_ms = delay.as_millis() as u64,
                    "broker connection failed"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
