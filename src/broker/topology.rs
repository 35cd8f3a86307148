use async_trait::async_trait;
use lapin::options::{ExchangeDeclareOptions, QueueBindOptions, QueueDeclareOptions};
use lapin::types::FieldTable;
use lapin::{Channel, ExchangeKind};
use tracing::debug;

use crate::config::BrokerSettings;
use crate::utils::Result;

/// The declarations a topology needs from a broker channel.
///
/// Every call must be idempotent: declaring something that already exists
/// with the same properties is a no-op.
#[async_trait]
pub trait Declare: Send + Sync {
    /// Declares a durable topic exchange.
    async fn declare_exchange(&self, exchange: &str) -> Result<()>;
    /// Declares a durable queue.
    async fn declare_queue(&self, queue: &str) -> Result<()>;
    async fn bind_queue(&self, queue: &str, exchange: &str, binding_key: &str) -> Result<()>;
}

#[async_trait]
impl Declare for Channel {
    async fn declare_exchange(&self, exchange: &str) -> Result<()> {
        self.exchange_declare(
            exchange,
            ExchangeKind::Topic,
            ExchangeDeclareOptions {
                durable: true,
                ..ExchangeDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
        Ok(())
    }

    async fn declare_queue(&self, queue: &str) -> Result<()> {
        self.queue_declare(
            queue,
            QueueDeclareOptions {
                durable: true,
                ..QueueDeclareOptions::default()
            },
            FieldTable::default(),
        )
        .await?;
        Ok(())
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, binding_key: &str) -> Result<()> {
        self.queue_bind(
            queue,
            exchange,
            binding_key,
            QueueBindOptions::default(),
            FieldTable::default(),
        )
        .await?;
        Ok(())
    }
}

/// A topic exchange, a queue, and the binding that connects them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    pub exchange: String,
    pub queue: String,
    pub binding_key: String,
}

impl Topology {
    pub fn new(exchange: &str, queue: &str, binding_key: &str) -> Self {
        Self {
            exchange: exchange.to_string(),
            queue: queue.to_string(),
            binding_key: binding_key.to_string(),
        }
    }

    pub fn from_settings(settings: &BrokerSettings) -> Self {
        Self::new(&settings.exchange, &settings.queue, &settings.binding_key)
    }

    /// Ensures the exchange, the queue and the binding exist.
    /// Safe to call again after every reconnect.
    pub async fn declare<D: Declare + ?Sized>(&self, channel: &D) -> Result<()> {
        channel.declare_exchange(&self.exchange).await?;
        channel.declare_queue(&self.queue).await?;
        channel
            .bind_queue(&self.queue, &self.exchange, &self.binding_key)
            .await?;
        debug!(
            exchange = %self.exchange,
            queue = %self.queue,
            binding_key = %self.binding_key,
            "topology declared"
        );
        Ok(())
    }
}
