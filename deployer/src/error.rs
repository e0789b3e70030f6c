use crate::felt::Felt;
use std::{fmt, time::Duration};
use thiserror::Error;

/// The error kinds an operator sees when a step fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    UnknownContract,
    MissingCredential,
    CalldataEncodingError,
    DeploymentRejected,
    DeploymentTimeout,
    EntrypointNotFound,
    ExecutionReverted,
    ExecutionTimeout,
    RegistryWriteConflict,
    InvalidName,
    Transport,
    Config,
    Io,
    Json,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::UnknownContract => "UnknownContract",
            ErrorKind::MissingCredential => "MissingCredential",
            ErrorKind::CalldataEncodingError => "CalldataEncodingError",
            ErrorKind::DeploymentRejected => "DeploymentRejected",
            ErrorKind::DeploymentTimeout => "DeploymentTimeout",
            ErrorKind::EntrypointNotFound => "EntrypointNotFound",
            ErrorKind::ExecutionReverted => "ExecutionReverted",
            ErrorKind::ExecutionTimeout => "ExecutionTimeout",
            ErrorKind::RegistryWriteConflict => "RegistryWriteConflict",
            ErrorKind::InvalidName => "InvalidName",
            ErrorKind::Transport => "Transport",
            ErrorKind::Config => "Config",
            ErrorKind::Io => "Io",
            ErrorKind::Json => "Json",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("no contract named `{name}` is recorded for network `{network}`")]
    UnknownContract { network: String, name: String },

    #[error("no owner account is configured for network `{network}`")]
    MissingCredential { network: String },

    #[error("cannot encode calldata field `{field}`: {reason}")]
    CalldataEncoding { field: String, reason: String },

    #[error("deployment of `{contract}` was rejected: {reason}")]
    DeploymentRejected { contract: String, reason: String },

    #[error(
        "timed out after {}s waiting for deployment transaction {tx_hash} to be confirmed; \
        the transaction may still be included",
        timeout.as_secs_f64()
    )]
    DeploymentTimeout { tx_hash: Felt, timeout: Duration },

    #[error("contract {address} does not expose entrypoint `{entrypoint}`")]
    EntrypointNotFound { address: Felt, entrypoint: String },

    #[error("call to `{entrypoint}` on {address} reverted: {reason}")]
    ExecutionReverted {
        address: Felt,
        entrypoint: String,
        reason: String,
    },

    #[error(
        "timed out after {}s waiting for transaction {tx_hash} to be confirmed; \
        the transaction may still be included",
        timeout.as_secs_f64()
    )]
    ExecutionTimeout { tx_hash: Felt, timeout: Duration },

    #[error("concurrent writers kept conflicting on `{name}` for network `{network}` after {attempts} attempts")]
    RegistryWriteConflict {
        network: String,
        name: String,
        attempts: u32,
    },

    #[error("{reason}")]
    InvalidName { name: String, reason: String },

    #[error("network transport failed: {0}")]
    Transport(String),

    #[error("{0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DeployError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DeployError::UnknownContract { .. } => ErrorKind::UnknownContract,
            DeployError::MissingCredential { .. } => ErrorKind::MissingCredential,
            DeployError::CalldataEncoding { .. } => ErrorKind::CalldataEncodingError,
            DeployError::DeploymentRejected { .. } => ErrorKind::DeploymentRejected,
            DeployError::DeploymentTimeout { .. } => ErrorKind::DeploymentTimeout,
            DeployError::EntrypointNotFound { .. } => ErrorKind::EntrypointNotFound,
            DeployError::ExecutionReverted { .. } => ErrorKind::ExecutionReverted,
            DeployError::ExecutionTimeout { .. } => ErrorKind::ExecutionTimeout,
            DeployError::RegistryWriteConflict { .. } => ErrorKind::RegistryWriteConflict,
            DeployError::InvalidName { .. } => ErrorKind::InvalidName,
            DeployError::Transport(_) => ErrorKind::Transport,
            DeployError::Config(_) => ErrorKind::Config,
            DeployError::Io(_) => ErrorKind::Io,
            DeployError::Json(_) => ErrorKind::Json,
        }
    }

    /// Whether the error is known to have happened before anything reached the network.
    pub fn is_local(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::UnknownContract
                | ErrorKind::MissingCredential
                | ErrorKind::CalldataEncodingError
                | ErrorKind::InvalidName
                | ErrorKind::Config
        )
    }
}

pub type Result<T> = std::result::Result<T, DeployError>;

/// A failed orchestration step, with enough context to inspect on-chain state by hand.
#[derive(Debug, Error)]
#[error("step `{step}` failed on network `{network}`: {source}")]
pub struct StepError {
    pub step: String,
    pub network: String,
    /// The calldata resolved so far, rendered for the operator.
    pub calldata: Vec<String>,
    #[source]
    pub source: DeployError,
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        self.source.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_print_taxonomy_names() {
        let err = DeployError::UnknownContract {
            network: "goerli".into(),
            name: "Arbiter".into(),
        };
        assert_eq!(err.kind().to_string(), "UnknownContract");
        assert_eq!(
            err.to_string(),
            "no contract named `Arbiter` is recorded for network `goerli`"
        );
        assert!(err.is_local());

        let err = DeployError::CalldataEncoding {
            field: "'this string is far too long to fit one felt'".into(),
            reason: "too long".into(),
        };
        assert_eq!(err.kind().to_string(), "CalldataEncodingError");
    }

    #[test]
    fn step_error_names_step_and_network() {
        let err = StepError {
            step: "ModuleController".into(),
            network: "goerli".into(),
            calldata: vec![],
            source: DeployError::DeploymentTimeout {
                tx_hash: Felt::from(7u64),
                timeout: Duration::from_secs(30),
            },
        };
        assert_eq!(err.kind(), ErrorKind::DeploymentTimeout);
        let msg = err.to_string();
        assert!(msg.starts_with("step `ModuleController` failed on network `goerli`: timed out"));
        assert!(!err.source.is_local());
    }
}
