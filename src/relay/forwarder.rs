use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use crate::config::ForwardSettings;
use crate::utils::{RelayError, Result};

/// Sends a payload to the downstream system.
#[async_trait]
pub trait Forward: Send + Sync {
    /// Returns the 2xx status on success. Anything else is an error.
    async fn forward(&self, payload: &Value) -> Result<u16>;
}

/// POSTs each payload as a JSON body to a fixed endpoint.
#[derive(Debug, Clone)]
pub struct HttpForwarder {
    client: Client,
    endpoint: String,
}

impl HttpForwarder {
    pub fn new(settings: &ForwardSettings) -> Result<Self> {
        let mut builder = Client::builder();
        if settings.timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(settings.timeout_secs));
        }
        Ok(Self {
            client: builder.build()?,
            endpoint: settings.endpoint.clone(),
        })
    }

    /// Same as [`HttpForwarder::new`] with a sub-second timeout.
    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Forward for HttpForwarder {
    async fn forward(&self, payload: &Value) -> Result<u16> {
        let response = self.client.post(&self.endpoint).json(payload).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(status.as_u16());
        }
        let body = response.text().await.unwrap_or_default();
        Err(RelayError::Downstream {
            status: status.as_u16(),
            body,
        })
    }
}
