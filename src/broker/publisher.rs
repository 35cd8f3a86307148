use lapin::options::{BasicPublishOptions, ConfirmSelectOptions};
use lapin::{BasicProperties, Channel};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::utils::{RelayError, Result};

const PERSISTENT: u8 = 2;

/// Publishes JSON notifications onto a topic exchange.
pub struct Publisher {
    channel: Channel,
    exchange: String,
}

impl Publisher {
    /// Puts `channel` into confirm mode so every publish is acknowledged by the broker.
    pub async fn new(channel: Channel, exchange: &str) -> Result<Self> {
        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;
        Ok(Self {
            channel,
            exchange: exchange.to_string(),
        })
    }

    /// Publishes `payload` under `routing_key` and waits for the broker's confirm.
    pub async fn publish(&self, routing_key: &str, payload: &Value) -> Result<()> {
        let body = serde_json::to_vec(payload)?;
        let confirmation = self
            .channel
            .basic_publish(
                &self.exchange,
                routing_key,
                BasicPublishOptions::default(),
                &body,
                message_properties(),
            )
            .await?
            .await?;

        if confirmation.is_nack() {
            return Err(RelayError::Nacked(format!("{}/{}", self.exchange, routing_key)));
        }

        info!(exchange = %self.exchange, routing_key, bytes = body.len(), "published");
        Ok(())
    }
}

/// Properties for a persistent JSON message with a fresh id and the current time.
pub fn message_properties() -> BasicProperties {
    BasicProperties::default()
        .with_content_type("application/json".into())
        .with_delivery_mode(PERSISTENT)
        .with_message_id(Uuid::new_v4().to_string().into())
        .with_timestamp(chrono::Utc::now().timestamp() as u64)
}
