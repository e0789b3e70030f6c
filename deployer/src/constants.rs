/// Default to a local devnet to favour the common case of testing.
pub const LOCAL_RPC_URL: &str = "http://127.0.0.1:5050/rpc";
pub const GOERLI_RPC_URL: &str = "https://alpha4.starknet.io/rpc";
pub const SEPOLIA_RPC_URL: &str = "https://alpha-sepolia.starknet.io/rpc";
pub const MAINNET_RPC_URL: &str = "https://alpha-mainnet.starknet.io/rpc";

pub const GOERLI_EXPLORER_URL: &str = "https://goerli.voyager.online";
pub const SEPOLIA_EXPLORER_URL: &str = "https://sepolia.voyager.online";
pub const MAINNET_EXPLORER_URL: &str = "https://voyager.online";

/// The maximum time to wait for a transaction to be included in a block by the network.
pub const DEFAULT_CONFIRMATION_TIMEOUT_SECS: u64 = 300;
/// How often the transaction status is polled while waiting for confirmation.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;
/// How many times a submission that failed in transport is sent again.
pub const DEFAULT_SUBMIT_RETRIES: u32 = 2;

/// Attempts at a conflicting registry write before giving up.
pub const DEFAULT_REGISTRY_WRITE_RETRIES: u32 = 8;
/// Backoff unit between conflicting registry writes; attempt `n` waits `n` units.
pub const REGISTRY_WRITE_BACKOFF_MS: u64 = 10;

pub const NETWORK_ENV_VAR: &str = "DEPLOYER_NETWORK";
pub const ACCOUNT_ENV_VAR: &str = "DEPLOYER_ACCOUNT";

pub const RPC_METHOD_CHAIN_ID: &str = "chainId";
pub const RPC_METHOD_ADD_DEPLOY_TRANSACTION: &str = "addDeployTransaction";
pub const RPC_METHOD_ADD_INVOKE_TRANSACTION: &str = "addInvokeTransaction";
pub const RPC_METHOD_GET_TRANSACTION_STATUS: &str = "getTransactionStatus";
pub const RPC_METHOD_FIND_DEPLOYMENT: &str = "findDeployment";
pub const RPC_METHOD_CALL: &str = "call";
