use crate::consts::{
    DEFAULT_COMPILER_VERSION, DEFAULT_EVM_VERSION, DEFAULT_IMPORT_REGISTRY, DEFAULT_IPFS_API_URL,
    DEFAULT_OPTIMIZER_RUNS,
};
use anyhow::anyhow;
use config::{Config, File};
use serde::{de::IgnoredAny, Deserialize};
use std::{collections::BTreeMap, num::NonZeroU32, str::FromStr};
use url::Url;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// Chain used when a deployment request does not name one.
    pub default_chain_id: u64,
    pub compiler: CompilerSettings,
    pub ipfs: IpfsSettings,
    pub verification: VerificationSettings,
    pub confirmation: ConfirmationSettings,
    pub sources: SourcesSettings,
    pub wallet: WalletSettings,
    /// Per-network configuration table, keyed by decimal chain id.
    pub chains: BTreeMap<String, ChainSettings>,

    // Is required as we deny unknown fields, but allow users provide
    // path to config through PREFIX__CONFIG env variable. If removed,
    // the setup would fail with `unknown field `config`, expected one of...`
    #[serde(rename = "config")]
    pub config_path: IgnoredAny,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_chain_id: 11155111,
            compiler: Default::default(),
            ipfs: Default::default(),
            verification: Default::default(),
            confirmation: Default::default(),
            sources: Default::default(),
            wallet: Default::default(),
            chains: default_chains(),
            config_path: IgnoredAny,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerSettings {
    pub url: Url,
    pub version: String,
    pub evm_version: String,
    pub optimizer_runs: u32,
    pub request_timeout: u64,
}

impl Default for CompilerSettings {
    fn default() -> Self {
        Self {
            url: Url::try_from("http://localhost:3000/api/compile-contract").expect("valid url"),
            version: DEFAULT_COMPILER_VERSION.to_string(),
            evm_version: DEFAULT_EVM_VERSION.to_string(),
            optimizer_runs: DEFAULT_OPTIMIZER_RUNS,
            request_timeout: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct IpfsSettings {
    pub api_url: Url,
    pub api_key: String,
    pub secret_api_key: String,
    pub request_timeout: u64,
}

impl Default for IpfsSettings {
    fn default() -> Self {
        Self {
            api_url: Url::try_from(DEFAULT_IPFS_API_URL).expect("valid url"),
            api_key: String::new(),
            secret_api_key: String::new(),
            request_timeout: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VerificationSettings {
    /// Seconds between polling attempts.
    pub interval: u64,
    /// Attempt cap; `None` polls until success or cancellation.
    pub max_attempts: Option<NonZeroU32>,
    pub request_timeout: u64,
}

impl Default for VerificationSettings {
    fn default() -> Self {
        Self {
            interval: 15,
            max_attempts: NonZeroU32::new(40),
            request_timeout: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfirmationSettings {
    /// Seconds to wait for the deployment receipt before the attempt is
    /// recorded as unconfirmed.
    pub patience: u64,
    /// Seconds between receipt polls.
    pub poll_interval: u64,
}

impl Default for ConfirmationSettings {
    fn default() -> Self {
        Self {
            patience: 180,
            poll_interval: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SourcesSettings {
    /// Base URL against which bare package imports
    /// (e.g. `@openzeppelin/contracts/...`) are resolved.
    pub registry_url: Url,
    pub request_timeout: u64,
    pub max_depth: usize,
}

impl Default for SourcesSettings {
    fn default() -> Self {
        Self {
            registry_url: Url::try_from(DEFAULT_IMPORT_REGISTRY).expect("valid url"),
            request_timeout: 30,
            max_depth: 32,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WalletSettings {
    pub private_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChainSettings {
    pub name: String,
    pub rpc_url: Url,
    pub explorer_url: Url,
    /// Etherscan-compatible verification API endpoint.
    pub api_url: Url,
    #[serde(default)]
    pub api_key: String,
}

fn default_chains() -> BTreeMap<String, ChainSettings> {
    let chain = |name: &str, rpc: &str, explorer: &str, api: &str| ChainSettings {
        name: name.to_string(),
        rpc_url: Url::try_from(rpc).expect("valid url"),
        explorer_url: Url::try_from(explorer).expect("valid url"),
        api_url: Url::try_from(api).expect("valid url"),
        api_key: String::new(),
    };

    BTreeMap::from([
        (
            "11155111".to_string(),
            chain(
                "Sepolia",
                "https://rpc.sepolia.org",
                "https://sepolia.etherscan.io",
                "https://api-sepolia.etherscan.io/api",
            ),
        ),
        (
            "17000".to_string(),
            chain(
                "Holesky",
                "https://ethereum-holesky-rpc.publicnode.com",
                "https://holesky.etherscan.io",
                "https://api-holesky.etherscan.io/api",
            ),
        ),
        (
            "5003".to_string(),
            chain(
                "Mantle Sepolia",
                "https://rpc.sepolia.mantle.xyz",
                "https://explorer.sepolia.mantle.xyz",
                "https://explorer.sepolia.mantle.xyz/api",
            ),
        ),
    ])
}

impl Settings {
    pub fn new() -> anyhow::Result<Self> {
        let config_path = std::env::var("SMART_CONTRACT_DEPLOYER__CONFIG");

        let mut builder = Config::builder();
        if let Ok(config_path) = config_path {
            builder = builder.add_source(File::with_name(&config_path));
        };
        // Use `__` so that it would be possible to address keys with
        // underscores in names (e.g. `api_key`)
        builder = builder
            .add_source(config::Environment::with_prefix("SMART_CONTRACT_DEPLOYER").separator("__"));

        let settings: Settings = builder.build()?.try_deserialize()?;

        settings.validate()?;

        Ok(settings)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.chain(self.default_chain_id).is_none() {
            return Err(anyhow!(
                "default_chain_id {} is missing from the chains table",
                self.default_chain_id
            ));
        }

        Ok(())
    }

    pub fn chain(&self, chain_id: u64) -> Option<&ChainSettings> {
        self.chains.get(&chain_id.to_string())
    }
}

impl FromStr for Settings {
    type Err = anyhow::Error;

    // Convenience for tests and embedders holding a toml snippet.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let settings: Settings = Config::builder()
            .add_source(File::from_str(s, config::FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }
}
