//! Explorer verification of a deployed contract against its
//! standard-json source. Verification runs asynchronously after
//! confirmation: a spawned task polls the Etherscan-compatible endpoint
//! under an explicit policy until the endpoint returns its definitive
//! success marker, the attempt cap is hit, or the task is cancelled by
//! a superseding deployment.

mod client;
mod task;

pub use client::{Error, ExplorerClient};
pub use task::VerificationTask;

use ethers::types::H256;
use std::{num::NonZeroU32, time::Duration};

/// Write-once input to verification, assembled by the executor at
/// submission time.
#[derive(Debug, Clone)]
pub struct VerifyContractConfig {
    pub deploy_hash: H256,
    pub standard_json_input: String,
    /// Hex without `0x`; empty when the constructor takes no arguments.
    pub encoded_constructor_args: String,
    pub file_name: String,
    pub contract_name: String,
    pub chain_id: u64,
    pub compiler_version: String,
    pub evm_version: String,
    pub optimizer_runs: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerificationPolicy {
    pub interval: Duration,
    /// `None` polls until success or cancellation.
    pub max_attempts: Option<NonZeroU32>,
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(15),
            max_attempts: NonZeroU32::new(40),
        }
    }
}

/// The endpoint signals acceptance with a 66-character `0x`-prefixed
/// hex string; everything else means "not verified yet".
pub(crate) fn is_success_marker(result: &str) -> bool {
    let Some(hex) = result.strip_prefix("0x") else {
        return false;
    };
    hex.len() == 64 && hex.chars().all(|c| c.is_ascii_hexdigit())
}
