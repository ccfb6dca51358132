//! Content-addressed artifact storage through a Pinata-compatible
//! pinning endpoint. Failures here are a distinct, non-fatal error
//! class: a confirmed on-chain deployment is never voided because its
//! artifact could not be pinned.

use crate::settings::IpfsSettings;
use reqwest::multipart;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum Error {
    #[error("artifact store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("artifact store rejected the upload with status {0}")]
    Rejected(reqwest::StatusCode),
}

#[derive(Debug, Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

#[derive(Clone)]
pub struct IpfsClient {
    api_url: Url,
    api_key: String,
    secret_api_key: String,
    client: reqwest::Client,
}

impl IpfsClient {
    pub fn new(settings: &IpfsSettings) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.request_timeout))
            .build()?;

        Ok(Self {
            api_url: settings.api_url.clone(),
            api_key: remove_quotes(&settings.api_key),
            secret_api_key: remove_quotes(&settings.secret_api_key),
            client,
        })
    }

    /// Pins a single file and returns its CID.
    pub async fn pin_file(&self, file_name: &str, content: String) -> Result<String, Error> {
        let part = multipart::Part::text(content)
            .file_name(file_name.to_string())
            .mime_str("text/plain")?;
        let form = multipart::Form::new().part("file", part);

        let response = self
            .client
            .post(self.api_url.clone())
            .header("pinata_api_key", &self.api_key)
            .header("pinata_secret_api_key", &self.secret_api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Rejected(status));
        }

        let body: PinResponse = response.json().await?;
        tracing::debug!(cid = body.ipfs_hash, file_name, "pinned artifact");
        Ok(body.ipfs_hash)
    }
}

pub fn ipfs_uri(cid: &str) -> String {
    format!("ipfs://{cid}")
}

// Keys pasted into env files sometimes keep their surrounding quotes.
fn remove_quotes(input: &str) -> String {
    input.trim_matches('"').to_string()
}
