pub mod chain;
pub mod compiler;
pub mod consts;
pub mod deployer;
pub mod ipfs;
pub mod settings;
pub mod solidity;
pub mod sources;
pub mod store;
pub mod tokenscript;
pub mod types;
pub mod verification;

pub use deployer::{DeployError, DeploymentExecutor};
pub use settings::Settings;
pub use store::{DeploymentEvent, DeploymentStore};
pub use tokenscript::TokenScriptPublisher;
pub use types::{DeployRequest, DeploymentRecord, DeploymentStage, VerificationStatus};
