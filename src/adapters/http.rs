use crate::core::{Batch, ForgetRequest, Transport};
use crate::utils::error::{Result, TrackerError};
use reqwest::{Client, Response};
use serde::Serialize;
use std::time::Duration;

/// Posts batches and forget requests to the collector as JSON.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("o2mc-tracker/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    async fn post_json<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<()> {
        tracing::debug!("POST {}", url);
        let response = self.client.post(url).json(body).send().await?;
        tracing::debug!("Collector response status: {}", response.status());
        Self::check_status(response).await
    }

    async fn check_status(response: Response) -> Result<()> {
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(TrackerError::DispatchError {
            status: status.as_u16(),
            message,
        })
    }
}

pub fn forget_url(endpoint: &str) -> String {
    format!("{}/forget", endpoint.trim_end_matches('/'))
}

#[async_trait::async_trait]
impl Transport for HttpTransport {
    async fn send_batch(&self, endpoint: &str, batch: &Batch) -> Result<()> {
        self.post_json(endpoint, batch).await
    }

    async fn forget(&self, endpoint: &str, request: &ForgetRequest) -> Result<()> {
        self.post_json(&forget_url(endpoint), request).await
    }
}
