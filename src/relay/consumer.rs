use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use lapin::options::{BasicConsumeOptions, BasicQosOptions};
use lapin::types::FieldTable;
use tracing::{error, info, warn};

use super::forwarder::Forward;
use super::handler::spawn_handler;
use super::outcome::Settle;
use crate::broker::{AmqpLink, Declare, Topology, retry_forever};
use crate::config::BrokerSettings;
use crate::utils::{RelayError, Result};

/// One delivery as the relay sees it: the body plus a way to settle it.
pub struct Incoming {
    pub body: Vec<u8>,
    pub settle: Box<dyn Settle>,
    pub routing_key: String,
    pub delivery_tag: u64,
}

pub type Deliveries = BoxStream<'static, Result<Incoming>>;

/// An open broker session the relay can declare on and consume from.
#[async_trait]
pub trait Session: Declare {
    async fn set_prefetch(&self, count: u16) -> Result<()>;
    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Deliveries>;
    async fn close(&self);
}

/// Opens a fresh [`Session`] per connection attempt.
#[async_trait]
pub trait Connect: Send + Sync {
    type Session: Session + 'static;

    async fn connect(&self) -> Result<Self::Session>;
}

/// Connects to RabbitMQ with `lapin`.
#[derive(Debug, Clone)]
pub struct AmqpConnector {
    url: String,
}

impl AmqpConnector {
    pub fn new(url: &str) -> Self {
        Self {
            url: url.to_string(),
        }
    }
}

#[async_trait]
impl Connect for AmqpConnector {
    type Session = AmqpLink;

    async fn connect(&self) -> Result<AmqpLink> {
        AmqpLink::open(&self.url).await
    }
}

#[async_trait]
impl Declare for AmqpLink {
    async fn declare_exchange(&self, exchange: &str) -> Result<()> {
        self.channel.declare_exchange(exchange).await
    }

    async fn declare_queue(&self, queue: &str) -> Result<()> {
        self.channel.declare_queue(queue).await
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, binding_key: &str) -> Result<()> {
        self.channel.bind_queue(queue, exchange, binding_key).await
    }
}

#[async_trait]
impl Session for AmqpLink {
    async fn set_prefetch(&self, count: u16) -> Result<()> {
        self.channel
            .basic_qos(count, BasicQosOptions::default())
            .await?;
        Ok(())
    }

    async fn consume(&self, queue: &str, consumer_tag: &str) -> Result<Deliveries> {
        let consumer = self
            .channel
            .basic_consume(
                queue,
                consumer_tag,
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        Ok(consumer
            .map(|delivery| -> Result<Incoming> {
                let delivery = delivery.map_err(RelayError::from)?;
                Ok(Incoming {
                    routing_key: delivery.routing_key.to_string(),
                    delivery_tag: delivery.delivery_tag,
                    body: delivery.data,
                    settle: Box::new(delivery.acker),
                })
            })
            .boxed())
    }

    async fn close(&self) {
        AmqpLink::close(self).await;
    }
}

/// Consumes the bound queue and forwards every delivery.
pub struct Relay<F: ?Sized, C = AmqpConnector> {
    settings: BrokerSettings,
    topology: Topology,
    connector: C,
    forwarder: Arc<F>,
}

impl<F: Forward + ?Sized + 'static> Relay<F, AmqpConnector> {
    pub fn new(settings: BrokerSettings, forwarder: Arc<F>) -> Self {
        let connector = AmqpConnector::new(&settings.url);
        Self::with_connector(settings, connector, forwarder)
    }
}

impl<F: Forward + ?Sized + 'static, C: Connect> Relay<F, C> {
    pub fn with_connector(settings: BrokerSettings, connector: C, forwarder: Arc<F>) -> Self {
        let topology = Topology::from_settings(&settings);
        Self {
            settings,
            topology,
            connector,
            forwarder,
        }
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.settings.retry_delay_ms)
    }

    /// Connects, consumes until the stream ends, then starts over. Never returns.
    pub async fn run(&self) {
        loop {
            let (session, deliveries) =
                retry_forever(self.retry_delay(), |attempt| self.start(attempt)).await;

            self.drain(deliveries).await;
            warn!(queue = %self.topology.queue, "delivery stream ended; reconnecting");
            session.close().await;
            tokio::time::sleep(self.retry_delay()).await;
        }
    }

    /// Connect, declare, apply prefetch and begin consuming: any failure here
    /// counts as a failed attempt.
    async fn start(&self, attempt: u64) -> Result<(C::Session, Deliveries)> {
        let session = self.connector.connect().await?;
        match self.prepare(&session).await {
            Ok(deliveries) => {
                info!(
                    attempt,
                    queue = %self.topology.queue,
                    binding_key = %self.topology.binding_key,
                    "connected; listening"
                );
                Ok((session, deliveries))
            }
            Err(e) => {
                session.close().await;
                Err(e)
            }
        }
    }

    async fn prepare(&self, session: &C::Session) -> Result<Deliveries> {
        self.topology.declare(session).await?;
        if self.settings.prefetch > 0 {
            session.set_prefetch(self.settings.prefetch).await?;
        }
        session
            .consume(&self.topology.queue, &self.settings.consumer_tag)
            .await
    }

    async fn drain(&self, mut deliveries: Deliveries) {
        while let Some(incoming) = deliveries.next().await {
            let incoming = match incoming {
                Ok(incoming) => incoming,
                Err(e) => {
                    error!(error = %e, "consumer error");
                    break;
                }
            };
            spawn_handler(
                self.forwarder.clone(),
                incoming.body,
                incoming.settle,
                incoming.routing_key,
                incoming.delivery_tag,
            );
        }
    }
}
