//! Publishes a TokenScript XML for the most recent deployment: pins the
//! XML to the content-addressed store, writes the resulting URI list
//! on-chain via `setScriptURI(string[])` and returns the viewer URL for
//! the contract instance.

use crate::{
    chain::{SendError, TransactionSender},
    consts::{SET_SCRIPT_URI_SIGNATURE, TOKENSCRIPT_VIEWER_URL},
    ipfs::{self, ipfs_uri, IpfsClient},
    settings::Settings,
    store::DeploymentStore,
};
use ethabi::Token;
use ethers::utils::keccak256;
use std::{sync::Arc, time::Duration};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PublishError {
    /// Precondition: a deployment with a known address must exist.
    #[error("no deployed contract to attach a token script to")]
    NoActiveDeployment,
    #[error(transparent)]
    Artifact(#[from] ipfs::Error),
    #[error(transparent)]
    Send(#[from] SendError),
}

pub struct TokenScriptPublisher {
    store: Arc<DeploymentStore>,
    sender: Arc<dyn TransactionSender>,
    ipfs: IpfsClient,
    patience: Duration,
}

impl TokenScriptPublisher {
    pub fn new(
        settings: &Settings,
        sender: Arc<dyn TransactionSender>,
        store: Arc<DeploymentStore>,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            store,
            sender,
            ipfs: IpfsClient::new(&settings.ipfs)?,
            patience: Duration::from_secs(settings.confirmation.patience),
        })
    }

    pub async fn publish(&self, token_script_source: &str) -> Result<String, PublishError> {
        let address = self
            .store
            .record()
            .and_then(|record| record.address)
            .ok_or(PublishError::NoActiveDeployment)?;

        let cid = self
            .ipfs
            .pin_file("tokenscript.xml", token_script_source.to_string())
            .await?;
        let script_uris = vec![ipfs_uri(&cid)];
        tracing::info!(?address, uri = script_uris[0], "writing script uri on-chain");

        let data = encode_set_script_uri(&script_uris);
        let tx_hash = self.sender.send_call(address, data.into()).await?;
        self.sender.await_receipt(tx_hash, self.patience).await?;

        let viewer_url = format!(
            "{}/?chain={}&contract={:?}",
            TOKENSCRIPT_VIEWER_URL,
            self.sender.chain_id(),
            address
        );
        self.store.set_tokenscript_viewer_url(viewer_url.clone());
        Ok(viewer_url)
    }
}

fn encode_set_script_uri(uris: &[String]) -> Vec<u8> {
    let mut data = keccak256(SET_SCRIPT_URI_SIGNATURE.as_bytes())[..4].to_vec();
    let uris = uris.iter().map(|uri| Token::String(uri.clone())).collect();
    data.extend(ethabi::encode(&[Token::Array(uris)]));
    data
}
