use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("Request error: {0}")]
    Request(#[source] reqwest::Error),
    #[error("HTTP error: {body}")]
    Upstream { status: u16, body: String },
    #[error("Request timed out")]
    Timeout,
    #[error("Unexpected error occurred")]
    Unexpected(#[source] reqwest::Error),
}

#[derive(Debug, Clone)]
pub struct MetadataClient {
    client: reqwest::Client,
    url: String,
}

impl MetadataClient {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    pub async fn fetch(&self) -> Result<Value, MetadataError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(classify)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.map_err(classify)?;
            return Err(MetadataError::Upstream {
                status: status.as_u16(),
                body,
            });
        }

        let data = response.json::<Value>().await.map_err(classify)?;
        tracing::info!(url = %self.url, "fetched charger metadata from third-party api");

        Ok(data)
    }
}

fn classify(error: reqwest::Error) -> MetadataError {
    if error.is_timeout() {
        MetadataError::Timeout
    } else if error.is_decode() {
        MetadataError::Unexpected(error)
    } else {
        MetadataError::Request(error)
    }
}
