use ethers::types::{Address, H256};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deployment request as received from the upstream collaborator
/// (chat/agent orchestration). `constructor_args` is ordered and maps 1:1
/// to the constructor parameters declared in the source.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployRequest {
    pub chain_id: Option<u64>,
    pub contract_name: String,
    pub source_code: String,
    #[serde(default)]
    pub constructor_args: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationStatus::Pending => f.write_str("pending"),
            VerificationStatus::Success => f.write_str("success"),
            VerificationStatus::Failed => f.write_str("failed"),
        }
    }
}

/// Stages a single deployment attempt moves through. The path is
/// monotonic per attempt; a terminal failure resets to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStage {
    Idle,
    PreparingSources,
    Compiling,
    ArgsEncoded,
    AwaitingSignature,
    Submitted,
    Confirmed,
    ConfirmationFailed,
}

/// The durable outcome of a deployment attempt. Created as soon as a
/// transaction hash exists; `address` may be absent until (or if ever) a
/// receipt arrives. `verification_status` is mutated through the store by
/// the verification task only, `address` by the executor only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeploymentRecord {
    pub address: Option<Address>,
    pub transaction_hash: H256,
    pub explorer_url: String,
    pub artifact_uri: Option<String>,
    pub verification_status: VerificationStatus,
    pub standard_json_input: String,
    pub abi: serde_json::Value,
    pub source_code: String,
}
