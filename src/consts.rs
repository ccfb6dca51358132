pub const DEFAULT_COMPILER_VERSION: &str = "v0.8.25+commit.b61c2a91";
pub const DEFAULT_EVM_VERSION: &str = "paris";
pub const DEFAULT_OPTIMIZER_RUNS: u32 = 200;

pub const DEFAULT_IMPORT_REGISTRY: &str = "https://unpkg.com/";
pub const DEFAULT_IPFS_API_URL: &str = "https://api.pinata.cloud/pinning/pinFileToIPFS";

pub const TOKENSCRIPT_VIEWER_URL: &str = "https://viewer-staging.tokenscript.org";
pub const SET_SCRIPT_URI_SIGNATURE: &str = "setScriptURI(string[])";
