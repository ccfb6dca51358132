use async_trait::async_trait;
use reqwest_middleware::{ClientBuilder, ClientWithMiddleware};
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("target responded with status {0}")]
    Status(u16),
}

/// Retrieves the text of a single import target. The production
/// implementation goes over HTTP; tests substitute an in-memory map.
#[async_trait]
pub trait ImportFetcher: Send + Sync {
    async fn fetch(&self, target: &Url) -> Result<String, FetchError>;
}

pub struct HttpImportFetcher {
    client: ClientWithMiddleware,
}

impl HttpImportFetcher {
    pub fn new(request_timeout: u64) -> Result<Self, reqwest::Error> {
        let retry_policy = ExponentialBackoff::builder().build_with_max_retries(3);
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()?;
        let client = ClientBuilder::new(client)
            .with(RetryTransientMiddleware::new_with_policy(retry_policy))
            .build();

        Ok(Self { client })
    }
}

#[async_trait]
impl ImportFetcher for HttpImportFetcher {
    async fn fetch(&self, target: &Url) -> Result<String, FetchError> {
        let response = self
            .client
            .get(target.clone())
            .send()
            .await
            .map_err(|err| FetchError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(FetchError::Status(response.status().as_u16()));
        }

        response
            .text()
            .await
            .map_err(|err| FetchError::Request(err.to_string()))
    }
}
