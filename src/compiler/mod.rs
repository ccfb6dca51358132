mod client;

pub use client::CompilerClient;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The compiler rejected the source. Terminal and never retried;
    /// the caller is expected to request a corrected source.
    #[error("compilation failed: {0}")]
    Compilation(String),
    #[error("compiler request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("unexpected compiler response: {0}")]
    BadResponse(String),
}

/// Output of one compilation attempt; produced once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct CompilationResult {
    /// Ordered ABI entries, kept as raw JSON for the record and the
    /// artifact bundle.
    pub abi: serde_json::Value,
    /// Creation bytecode as a hex string.
    pub bytecode: String,
}

impl CompilationResult {
    pub fn bytecode_bytes(&self) -> Result<Vec<u8>, Error> {
        let stripped = self.bytecode.strip_prefix("0x").unwrap_or(&self.bytecode);
        hex::decode(stripped)
            .map_err(|err| Error::BadResponse(format!("bytecode is not valid hex: {err}")))
    }
}
