//! Solc standard-json input assembly. The same serialized string is sent
//! to the compiler service, pinned as part of the artifact bundle and
//! submitted to the explorer for verification, so it is built exactly
//! once per attempt.

use crate::{settings::CompilerSettings, sources::SourceSet};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct StandardJsonInput {
    pub language: String,
    pub sources: SourceSet,
    pub settings: Settings,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub evm_version: String,
    pub optimizer: Optimizer,
    pub output_selection: serde_json::Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Optimizer {
    pub enabled: bool,
    pub runs: u32,
}

impl StandardJsonInput {
    pub fn solidity(sources: SourceSet, compiler: &CompilerSettings) -> Self {
        Self {
            language: "Solidity".to_string(),
            sources,
            settings: Settings {
                evm_version: compiler.evm_version.clone(),
                optimizer: Optimizer {
                    enabled: true,
                    runs: compiler.optimizer_runs,
                },
                output_selection: serde_json::json!({ "*": { "*": ["*"] } }),
            },
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("standard json serialization")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::SourceUnit;
    use std::collections::BTreeMap;

    #[test]
    fn serializes_solc_compatible_input() {
        let sources = BTreeMap::from([(
            "Token.sol".to_string(),
            SourceUnit {
                content: "contract Token {}".to_string(),
            },
        )]);
        let input = StandardJsonInput::solidity(sources, &Default::default());
        let value: serde_json::Value = serde_json::from_str(&input.to_json()).unwrap();

        assert_eq!(value["language"], "Solidity");
        assert_eq!(value["sources"]["Token.sol"]["content"], "contract Token {}");
        assert_eq!(value["settings"]["evmVersion"], "paris");
        assert_eq!(value["settings"]["optimizer"]["enabled"], true);
        assert_eq!(value["settings"]["optimizer"]["runs"], 200);
        assert_eq!(value["settings"]["outputSelection"]["*"]["*"][0], "*");
    }
}
