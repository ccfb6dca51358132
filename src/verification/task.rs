use super::{is_success_marker, ExplorerClient, VerificationPolicy, VerifyContractConfig};
use crate::{settings::ChainSettings, store::DeploymentStore, types::VerificationStatus};
use std::sync::Arc;
use tokio::{task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

/// Polls the explorer until it accepts the source, the attempt cap is
/// hit, or the token is cancelled by a superseding deployment. Status
/// writes go through the store and are guarded by the deploy hash, so a
/// superseded task can never touch a newer record.
pub struct VerificationTask {
    client: Arc<ExplorerClient>,
    chain: ChainSettings,
    store: Arc<DeploymentStore>,
    config: VerifyContractConfig,
    policy: VerificationPolicy,
    token: CancellationToken,
}

impl VerificationTask {
    pub fn spawn(
        client: Arc<ExplorerClient>,
        chain: ChainSettings,
        store: Arc<DeploymentStore>,
        config: VerifyContractConfig,
        policy: VerificationPolicy,
        token: CancellationToken,
    ) -> JoinHandle<()> {
        let task = Self {
            client,
            chain,
            store,
            config,
            policy,
            token,
        };
        tokio::spawn(task.run())
    }

    async fn run(self) {
        let deploy_hash = self.config.deploy_hash;

        // Already verified: nothing to poll for.
        if self.store.verification_status_of(deploy_hash) == Some(VerificationStatus::Success) {
            tracing::debug!(?deploy_hash, "contract already verified");
            return;
        }

        let mut attempt = 0u32;
        loop {
            if self.token.is_cancelled() {
                tracing::debug!(?deploy_hash, "verification superseded");
                return;
            }
            attempt += 1;

            if self.attempt_once(attempt).await {
                return;
            }

            if let Some(max_attempts) = self.policy.max_attempts {
                if attempt >= max_attempts.get() {
                    tracing::warn!(
                        ?deploy_hash,
                        attempts = attempt,
                        "verification attempts exhausted"
                    );
                    self.store
                        .set_verification_status(deploy_hash, VerificationStatus::Failed);
                    return;
                }
            }

            tokio::select! {
                _ = self.token.cancelled() => {
                    tracing::debug!(?deploy_hash, "verification superseded");
                    return;
                }
                _ = sleep(self.policy.interval) => {}
            }
        }
    }

    /// One verification attempt; `true` when polling should stop.
    async fn attempt_once(&self, attempt: u32) -> bool {
        let deploy_hash = self.config.deploy_hash;

        // The record may still lack an address (confirmation timed out
        // but the transaction can mine later); retry until it shows up.
        let address = self
            .store
            .record()
            .filter(|record| record.transaction_hash == deploy_hash)
            .and_then(|record| record.address);
        let Some(address) = address else {
            tracing::debug!(?deploy_hash, attempt, "no contract address yet");
            return false;
        };

        match self
            .client
            .verify_source(&self.chain, &self.config, address)
            .await
        {
            Ok(result) if is_success_marker(&result) => {
                let applied = self
                    .store
                    .set_verification_status(deploy_hash, VerificationStatus::Success);
                if applied {
                    tracing::info!(?deploy_hash, ?address, "contract verified");
                }
                true
            }
            Ok(result) => {
                tracing::debug!(?deploy_hash, attempt, result, "verification not accepted yet");
                false
            }
            Err(err) => {
                tracing::debug!(?deploy_hash, attempt, error = %err, "verification attempt failed");
                false
            }
        }
    }
}
