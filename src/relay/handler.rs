use std::sync::Arc;

use serde_json::Value;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::forwarder::Forward;
use super::outcome::{Outcome, Settle};
use crate::utils::Result;

/// Decides the fate of one delivery body without touching the broker.
///
/// A body that is not JSON is rejected here instead of escaping the handler.
pub async fn process<F: Forward + ?Sized>(forwarder: &F, body: &[u8]) -> Outcome {
    let payload: Value = match serde_json::from_slice(body) {
        Ok(payload) => payload,
        Err(e) => {
            warn!(error = %e, bytes = body.len(), "malformed payload; rejecting");
            return Outcome::Reject;
        }
    };
    debug!(%payload, "incoming message");

    match forwarder.forward(&payload).await {
        Ok(status) => {
            info!(status, "forwarded");
            Outcome::Ack
        }
        Err(e) => {
            error!(error = %e, "failed to forward");
            Outcome::Reject
        }
    }
}

/// Processes `body` and then settles it exactly once.
pub async fn handle_delivery<F, S>(forwarder: &F, body: &[u8], settle: &S) -> Result<Outcome>
where
    F: Forward + ?Sized,
    S: Settle + ?Sized,
{
    let outcome = process(forwarder, body).await;
    match outcome {
        Outcome::Ack => settle.ack().await?,
        Outcome::Reject => settle.reject().await?,
    }
    Ok(outcome)
}

/// Runs [`handle_delivery`] on its own task so slow deliveries overlap.
pub fn spawn_handler<F, S>(
    forwarder: Arc<F>,
    body: Vec<u8>,
    settle: S,
    routing_key: String,
    delivery_tag: u64,
) -> JoinHandle<Option<Outcome>>
where
    F: Forward + ?Sized + 'static,
    S: Settle + 'static,
{
    tokio::spawn(async move {
        match handle_delivery(forwarder.as_ref(), &body, &settle).await {
            Ok(outcome) => {
                debug!(%routing_key, delivery_tag, ?outcome, "delivery settled");
                Some(outcome)
            }
            Err(e) => {
                error!(%routing_key, delivery_tag, error = %e, "failed to settle delivery");
                None
            }
        }
    })
}
