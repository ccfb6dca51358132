//! Orchestrates a full deployment attempt:
//! resolve -> compile -> encode -> sign -> confirm, publishing progress
//! and the resulting record through the deployment store and handing
//! every submitted transaction to the verification service.

use crate::{
    chain::{SendError, TransactionSender},
    compiler::{self, CompilerClient},
    ipfs::{ipfs_uri, IpfsClient},
    settings::{ChainSettings, Settings},
    solidity::{
        constructor_args::{encode_constructor_args, EncodeError},
        signature::{self, ParseError},
        standard_json::StandardJsonInput,
    },
    sources::{HttpImportFetcher, ImportResolver, ResolveError},
    store::DeploymentStore,
    types::{DeployRequest, DeploymentRecord, DeploymentStage, VerificationStatus},
    verification::{
        ExplorerClient, VerificationPolicy, VerificationTask, VerifyContractConfig,
    },
};
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("unknown chain id {0}")]
    UnknownChain(u64),
    #[error("contract name is missing and could not be derived from the source")]
    MissingContractName,
    #[error(transparent)]
    ImportResolution(#[from] ResolveError),
    #[error(transparent)]
    Compilation(#[from] compiler::Error),
    #[error(transparent)]
    Signature(#[from] ParseError),
    #[error(transparent)]
    ArgumentEncoding(#[from] EncodeError),
    #[error(transparent)]
    Send(#[from] SendError),
}

/// One executor serves one connected signer; a second deployment request
/// supersedes the active record and its verification loop instead of
/// fanning out in parallel.
pub struct DeploymentExecutor {
    settings: Arc<Settings>,
    store: Arc<DeploymentStore>,
    sender: Arc<dyn TransactionSender>,
    resolver: ImportResolver,
    compiler: CompilerClient,
    ipfs: IpfsClient,
    explorer: Arc<ExplorerClient>,
    active_verification: Mutex<Option<CancellationToken>>,
}

impl DeploymentExecutor {
    pub fn new(
        settings: Arc<Settings>,
        sender: Arc<dyn TransactionSender>,
        store: Arc<DeploymentStore>,
    ) -> anyhow::Result<Self> {
        let fetcher = HttpImportFetcher::new(settings.sources.request_timeout)?;
        let resolver = ImportResolver::new(
            Arc::new(fetcher),
            settings.sources.registry_url.clone(),
            settings.sources.max_depth,
        );
        let compiler = CompilerClient::new(
            settings.compiler.url.clone(),
            settings.compiler.request_timeout,
        )?;
        let ipfs = IpfsClient::new(&settings.ipfs)?;
        let explorer = Arc::new(ExplorerClient::new(settings.verification.request_timeout)?);

        Ok(Self {
            settings,
            store,
            sender,
            resolver,
            compiler,
            ipfs,
            explorer,
            active_verification: Mutex::new(None),
        })
    }

    pub fn store(&self) -> Arc<DeploymentStore> {
        self.store.clone()
    }

    /// Runs a full deployment attempt. A failure anywhere before
    /// submission aborts synchronously and leaves the store ready for a
    /// fresh attempt; once a transaction hash exists a record is always
    /// published, address or not.
    pub async fn deploy(&self, request: DeployRequest) -> Result<DeploymentRecord, DeployError> {
        // The new attempt owns the active slot from here on.
        self.cancel_active_verification();

        let result = self.run(request).await;
        if result.is_err() {
            self.store.set_stage(DeploymentStage::Idle);
        }
        result
    }

    async fn run(&self, request: DeployRequest) -> Result<DeploymentRecord, DeployError> {
        let chain_id = request.chain_id.unwrap_or(self.settings.default_chain_id);
        let chain = self
            .settings
            .chain(chain_id)
            .ok_or(DeployError::UnknownChain(chain_id))?
            .clone();
        if self.sender.chain_id() != chain_id {
            return Err(SendError::Unavailable(format!(
                "signer is connected to chain {}, request targets chain {}",
                self.sender.chain_id(),
                chain_id
            ))
            .into());
        }

        let contract_name = if request.contract_name.trim().is_empty() {
            signature::contract_name(&request.source_code)
                .ok_or(DeployError::MissingContractName)?
        } else {
            request.contract_name.clone()
        };
        let file_name = source_file_name(&contract_name);
        tracing::info!(chain_id, contract_name, "starting deployment");

        self.store.set_stage(DeploymentStage::PreparingSources);
        let sources = self
            .resolver
            .resolve(&request.source_code, &file_name)
            .await?;

        self.store.set_stage(DeploymentStage::Compiling);
        let standard_json_input =
            StandardJsonInput::solidity(sources, &self.settings.compiler).to_json();
        let compilation = self
            .compiler
            .compile(&standard_json_input, &contract_name)
            .await?;

        let params = signature::constructor_params(&request.source_code)?;
        let encoded_args = encode_constructor_args(&params, &request.constructor_args)?;
        self.store.set_stage(DeploymentStage::ArgsEncoded);

        let mut deploy_data = compilation.bytecode_bytes()?;
        deploy_data.extend_from_slice(&encoded_args.encoded);

        self.store.set_stage(DeploymentStage::AwaitingSignature);
        let deploy_hash = self.sender.send_deployment(deploy_data.into()).await?;

        self.store.set_stage(DeploymentStage::Submitted);
        let explorer_url = format!(
            "{}/tx/{:?}",
            chain.explorer_url.as_str().trim_end_matches('/'),
            deploy_hash
        );
        tracing::info!(?deploy_hash, explorer_url, "deployment submitted");

        let verify_config = VerifyContractConfig {
            deploy_hash,
            standard_json_input: standard_json_input.clone(),
            encoded_constructor_args: encoded_args.to_hex(),
            file_name,
            contract_name: contract_name.clone(),
            chain_id,
            compiler_version: self.settings.compiler.version.clone(),
            evm_version: self.settings.compiler.evm_version.clone(),
            optimizer_runs: self.settings.compiler.optimizer_runs,
        };

        let artifact_uri = match self
            .ipfs
            .pin_file("standardJsonInput.json", standard_json_input.clone())
            .await
        {
            Ok(cid) => Some(ipfs_uri(&cid)),
            Err(err) => {
                tracing::warn!(error = %err, "artifact publication failed, record will carry no artifact uri");
                None
            }
        };

        let patience = Duration::from_secs(self.settings.confirmation.patience);
        let address = match self.sender.await_receipt(deploy_hash, patience).await {
            Ok(receipt) => {
                self.store.set_stage(DeploymentStage::Confirmed);
                receipt.contract_address
            }
            Err(err) => {
                tracing::warn!(
                    ?deploy_hash,
                    error = %err,
                    "confirmation not received, recording the attempt without an address"
                );
                self.store.set_stage(DeploymentStage::ConfirmationFailed);
                None
            }
        };

        let record = DeploymentRecord {
            address,
            transaction_hash: deploy_hash,
            explorer_url,
            artifact_uri,
            verification_status: VerificationStatus::Pending,
            standard_json_input,
            abi: compilation.abi.clone(),
            source_code: request.source_code,
        };
        self.store.publish_record(record.clone());

        // Verification starts whether or not a receipt arrived; the
        // transaction may still mine within the polling horizon.
        self.spawn_verification(chain, verify_config);

        Ok(record)
    }

    fn verification_policy(&self) -> VerificationPolicy {
        VerificationPolicy {
            interval: Duration::from_secs(self.settings.verification.interval),
            max_attempts: self.settings.verification.max_attempts,
        }
    }

    fn spawn_verification(&self, chain: ChainSettings, config: VerifyContractConfig) {
        let token = CancellationToken::new();
        let task_token = token.clone();
        *self.active_verification.lock() = Some(token);
        VerificationTask::spawn(
            self.explorer.clone(),
            chain,
            self.store.clone(),
            config,
            self.verification_policy(),
            task_token,
        );
    }

    fn cancel_active_verification(&self) {
        if let Some(token) = self.active_verification.lock().take() {
            token.cancel();
        }
    }
}

/// `<contract name>.sol`, with a trailing run of filesystem-hostile
/// characters collapsed to `_`.
fn source_file_name(contract_name: &str) -> String {
    let trimmed = contract_name.trim_end_matches(|c: char| {
        c.is_whitespace() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '.')
    });
    if trimmed.len() == contract_name.len() {
        format!("{contract_name}.sol")
    } else {
        format!("{trimmed}_.sol")
    }
}
