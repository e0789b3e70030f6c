//! The narrow interface through which the clients talk to a network.

pub mod local;
pub mod rpc;

use crate::felt::Felt;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

pub use local::LocalNode;
pub use rpc::RpcProvider;

pub type TxHash = Felt;

/// Reference to deployable code: a declared class hash or a named artifact known to the network.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractRef(pub String);

impl fmt::Display for ContractRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContractRef {
    fn from(s: &str) -> Self {
        ContractRef(s.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployTransaction {
    pub sender: Felt,
    pub contract: ContractRef,
    pub constructor_calldata: Vec<Felt>,
    pub salt: Felt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokeTransaction {
    pub sender: Felt,
    pub contract_address: Felt,
    pub entrypoint: String,
    pub calldata: Vec<Felt>,
}

/// A read-only call. Never becomes a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub contract_address: Felt,
    pub entrypoint: String,
    pub calldata: Vec<Felt>,
}

/// What the network returns when it accepts a creation transaction into its mempool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploySubmission {
    pub transaction_hash: TxHash,
    pub contract_address: Felt,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    /// Known to the network, not yet included.
    Received,
    /// Included in a block.
    Accepted { block_number: u64 },
    /// Dropped by the network without inclusion.
    Rejected { reason: String },
    /// Included, but execution failed.
    Reverted { reason: String },
    /// The network has never seen the transaction, or has forgotten it.
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The request may or may not have reached the network.
    #[error("{0}")]
    Transport(String),
    #[error("transaction rejected: {0}")]
    Rejected(String),
    #[error("entrypoint not found")]
    EntrypointNotFound,
    #[error("RPC error {code}: {message}")]
    Rpc { code: i64, message: String },
}

#[async_trait]
pub trait Provider: Send + Sync {
    async fn chain_id(&self) -> Result<String, ProviderError>;

    async fn add_deploy_transaction(
        &self,
        tx: &DeployTransaction,
    ) -> Result<DeploySubmission, ProviderError>;

    async fn add_invoke_transaction(&self, tx: &InvokeTransaction)
        -> Result<TxHash, ProviderError>;

    async fn transaction_status(&self, tx_hash: &TxHash) -> Result<TxStatus, ProviderError>;

    /// The creation transaction `sender` sent with `salt`, preferring one that was included.
    ///
    /// Finds a submission whose response never arrived.
    async fn find_deployment(
        &self,
        sender: &Felt,
        salt: &Felt,
    ) -> Result<Option<DeploySubmission>, ProviderError>;

    async fn call(&self, call: &FunctionCall) -> Result<Vec<Felt>, ProviderError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_wire_format() {
        let status: TxStatus =
            serde_json::from_str(r#"{"status":"ACCEPTED","block_number":12}"#).unwrap();
        assert_eq!(status, TxStatus::Accepted { block_number: 12 });
        let status: TxStatus = serde_json::from_str(r#"{"status":"UNKNOWN"}"#).unwrap();
        assert_eq!(status, TxStatus::Unknown);
        assert_eq!(
            serde_json::to_string(&TxStatus::Rejected {
                reason: "insufficient funds".into()
            })
            .unwrap(),
            r#"{"status":"REJECTED","reason":"insufficient funds"}"#
        );
    }
}
