use super::VerifyContractConfig;
use crate::settings::ChainSettings;
use ethers::types::Address;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("verification request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("verification endpoint responded with status {0}")]
    Status(reqwest::StatusCode),
}

#[derive(Debug, Deserialize)]
struct VerifyResponse {
    result: serde_json::Value,
}

/// Etherscan-compatible `verifysourcecode` client. One instance serves
/// every chain; the per-network endpoint and key come from the chain
/// settings passed per call.
pub struct ExplorerClient {
    client: reqwest::Client,
}

impl ExplorerClient {
    pub fn new(request_timeout: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()?;
        Ok(Self { client })
    }

    /// Submits the source for verification and returns the endpoint's
    /// `result` string verbatim; the caller decides whether it is the
    /// success marker.
    pub async fn verify_source(
        &self,
        chain: &ChainSettings,
        config: &VerifyContractConfig,
        contract_address: Address,
    ) -> Result<String, Error> {
        let mut params = vec![
            ("apikey", remove_quotes(&chain.api_key)),
            ("module", "contract".to_string()),
            ("action", "verifysourcecode".to_string()),
            ("contractaddress", format!("{contract_address:?}")),
            ("sourceCode", config.standard_json_input.clone()),
            (
                "contractname",
                format!("{}:{}", config.file_name, config.contract_name),
            ),
            (
                "codeformat",
                "solidity-standard-json-input".to_string(),
            ),
            ("compilerversion", config.compiler_version.clone()),
            ("evmversion", config.evm_version.clone()),
            ("optimizationUsed", "1".to_string()),
            ("runs", config.optimizer_runs.to_string()),
        ];
        if !config.encoded_constructor_args.is_empty() {
            // The misspelling is the API's actual parameter name.
            params.push((
                "constructorArguements",
                config.encoded_constructor_args.clone(),
            ));
        }

        let response = self
            .client
            .post(chain.api_url.clone())
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status(status));
        }

        let body: VerifyResponse = response.json().await?;
        let result = match body.result {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        };
        Ok(result)
    }
}

fn remove_quotes(input: &str) -> String {
    input.trim_matches('"').to_string()
}
