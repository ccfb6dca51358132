use super::{CompilationResult, Error};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CompileRequest<'a> {
    standard_json_input: &'a str,
    contract_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct CompileResponse {
    abi: serde_json::Value,
    bytecode: String,
}

#[derive(Debug, Deserialize)]
struct CompileErrorResponse {
    error: String,
}

#[derive(Clone)]
pub struct CompilerClient {
    url: Url,
    client: reqwest::Client,
}

impl CompilerClient {
    pub fn new(url: Url, request_timeout: u64) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(request_timeout))
            .build()?;

        Ok(Self { url, client })
    }

    /// Submits a standard-json compilation request for `contract_name`.
    /// Any compiler rejection comes back as [`Error::Compilation`].
    pub async fn compile(
        &self,
        standard_json_input: &str,
        contract_name: &str,
    ) -> Result<CompilationResult, Error> {
        let request = CompileRequest {
            standard_json_input,
            contract_name,
        };

        let response = self
            .client
            .post(self.url.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<CompileErrorResponse>(&body)
                .map(|parsed| parsed.error)
                .unwrap_or(body);
            return Err(Error::Compilation(message));
        }

        let body: CompileResponse = response
            .json()
            .await
            .map_err(|err| Error::BadResponse(err.to_string()))?;

        if body.bytecode.trim_start_matches("0x").is_empty() {
            return Err(Error::BadResponse(format!(
                "no bytecode produced for contract {contract_name}"
            )));
        }

        Ok(CompilationResult {
            abi: body.abi,
            bytecode: body.bytecode,
        })
    }
}
