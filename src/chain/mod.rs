//! The signing seam between the pipeline and the connected wallet/node.
//! `TransactionSender` is a trait so the executor can be driven without
//! a live chain; the production implementation wraps an ethers
//! `SignerMiddleware` over HTTP JSON-RPC.

use crate::settings::{ChainSettings, WalletSettings};
use async_trait::async_trait;
use ethers::{
    middleware::SignerMiddleware,
    providers::{Http, Middleware, Provider},
    signers::{LocalWallet, Signer},
    types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256},
};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::time::sleep;

#[derive(Debug, Error)]
pub enum SendError {
    /// No wallet or chain context to sign with.
    #[error("signer unavailable: {0}")]
    Unavailable(String),
    /// Signing or broadcast was declined; the attempt is over.
    #[error("transaction rejected: {0}")]
    Rejected(String),
    /// No receipt arrived within the patience window. Recorded, not
    /// hard-fatal: the transaction may still mine later.
    #[error("no receipt for {0:?} within the patience window")]
    ConfirmationTimeout(H256),
    #[error("rpc error: {0}")]
    Rpc(String),
}

#[async_trait]
pub trait TransactionSender: Send + Sync {
    fn chain_id(&self) -> u64;

    /// Signs and broadcasts a contract-creation transaction carrying
    /// `data` (creation bytecode plus encoded constructor arguments).
    async fn send_deployment(&self, data: Bytes) -> Result<H256, SendError>;

    /// Signs and broadcasts a call to an existing contract.
    async fn send_call(&self, to: Address, data: Bytes) -> Result<H256, SendError>;

    async fn await_receipt(
        &self,
        tx_hash: H256,
        patience: Duration,
    ) -> Result<TransactionReceipt, SendError>;
}

pub struct EthersSender {
    inner: SignerMiddleware<Provider<Http>, LocalWallet>,
    chain_id: u64,
    poll_interval: Duration,
}

impl EthersSender {
    pub fn new(
        chain_id: u64,
        chain: &ChainSettings,
        wallet: &WalletSettings,
        poll_interval: Duration,
    ) -> Result<Self, SendError> {
        let private_key = wallet
            .private_key
            .as_deref()
            .ok_or_else(|| SendError::Unavailable("no private key configured".to_string()))?;

        let signer: LocalWallet = private_key
            .parse()
            .map_err(|_| SendError::Unavailable("private key is not valid".to_string()))?;
        let signer = signer.with_chain_id(chain_id);

        let provider = Provider::<Http>::try_from(chain.rpc_url.as_str())
            .map_err(|err| SendError::Unavailable(format!("invalid rpc url: {err}")))?;

        Ok(Self {
            inner: SignerMiddleware::new(provider, signer),
            chain_id,
            poll_interval,
        })
    }

    async fn send(&self, tx: TransactionRequest) -> Result<H256, SendError> {
        let pending = self
            .inner
            .send_transaction(tx, None)
            .await
            .map_err(|err| SendError::Rejected(err.to_string()))?;
        Ok(pending.tx_hash())
    }
}

#[async_trait]
impl TransactionSender for EthersSender {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn send_deployment(&self, data: Bytes) -> Result<H256, SendError> {
        // A transaction without `to` creates a contract.
        self.send(TransactionRequest::new().data(data)).await
    }

    async fn send_call(&self, to: Address, data: Bytes) -> Result<H256, SendError> {
        self.send(TransactionRequest::new().to(to).data(data)).await
    }

    async fn await_receipt(
        &self,
        tx_hash: H256,
        patience: Duration,
    ) -> Result<TransactionReceipt, SendError> {
        let deadline = Instant::now() + patience;
        loop {
            let receipt = self
                .inner
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|err| SendError::Rpc(err.to_string()))?;
            if let Some(receipt) = receipt {
                return Ok(receipt);
            }
            if Instant::now() >= deadline {
                return Err(SendError::ConfirmationTimeout(tx_hash));
            }
            sleep(self.poll_interval).await;
        }
    }
}
