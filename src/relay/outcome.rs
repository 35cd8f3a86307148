use async_trait::async_trait;
use lapin::acker::Acker;
use lapin::options::{BasicAckOptions, BasicRejectOptions};

use crate::utils::Result;

/// What happens to a delivery once it has been handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Forwarded; remove from the queue for good.
    Ack,
    /// Not forwarded; drop without requeue.
    Reject,
}

/// Settles a single delivery with the broker.
#[async_trait]
pub trait Settle: Send + Sync {
    async fn ack(&self) -> Result<()>;
    /// Rejects without requeue.
    async fn reject(&self) -> Result<()>;
}

#[async_trait]
impl Settle for Acker {
    async fn ack(&self) -> Result<()> {
        Acker::ack(self, BasicAckOptions::default()).await?;
        Ok(())
    }

    async fn reject(&self) -> Result<()> {
        Acker::reject(self, BasicRejectOptions { requeue: false }).await?;
        Ok(())
    }
}

#[async_trait]
impl<S: Settle + ?Sized> Settle for Box<S> {
    async fn ack(&self) -> Result<()> {
        self.as_ref().ack().await
    }

    async fn reject(&self) -> Result<()> {
        self.as_ref().reject().await
    }
}
