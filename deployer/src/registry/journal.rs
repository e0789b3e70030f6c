//! Submissions that were sent but not yet recorded.
//!
//! An entry is written with the salt before the first attempt to send a creation transaction,
//! completed with the transaction hash and address once the network answers, and removed once
//! the resulting address is recorded. An entry that survives a run means the outcome of that
//! transaction was never observed.

use super::{check_name, read_json, write_json_atomic, Registry};
use crate::{error::Result, felt::Felt, provider::ContractRef};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{fs, io, path::PathBuf};

const PENDING_DIR: &str = ".pending";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingDeployment {
    /// `None` until the network answered the submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_hash: Option<Felt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<Felt>,
    pub sender: Felt,
    pub salt: Felt,
    pub contract: ContractRef,
    pub constructor_calldata: Vec<Felt>,
    pub submitted_at: DateTime<Utc>,
}

impl Registry {
    pub fn pending(&self, network: &str, name: &str) -> Result<Option<PendingDeployment>> {
        read_json(&self.pending_path(network, name)?)
    }

    pub fn mark_pending(
        &self,
        network: &str,
        name: &str,
        pending: &PendingDeployment,
    ) -> Result<()> {
        write_json_atomic(&self.pending_path(network, name)?, pending)
    }

    pub fn clear_pending(&self, network: &str, name: &str) -> Result<()> {
        match fs::remove_file(self.pending_path(network, name)?) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }

    fn pending_path(&self, network: &str, name: &str) -> Result<PathBuf> {
        check_name(network, "network name")?;
        check_name(name, "logical contract name")?;
        Ok(self
            .root()
            .join(network)
            .join(PENDING_DIR)
            .join(name)
            .with_extension("json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mark_then_clear() {
        let dir = tempfile::tempdir().unwrap();
        let registry = Registry::open(dir.path());
        assert!(registry.pending("goerli", "Arbiter").unwrap().is_none());

        let entry = PendingDeployment {
            transaction_hash: Some(Felt::from(7u64)),
            address: Some(Felt::from(0xaaau64)),
            sender: Felt::from(0x0123u64),
            salt: Felt::from(3u64),
            contract: ContractRef::from("Arbiter"),
            constructor_calldata: vec![Felt::from(0x0123u64)],
            submitted_at: Utc::now(),
        };
        registry.mark_pending("goerli", "Arbiter", &entry).unwrap();
        assert_eq!(registry.pending("goerli", "Arbiter").unwrap(), Some(entry));
        assert!(registry.get("goerli", "Arbiter").unwrap().is_none());

        registry.clear_pending("goerli", "Arbiter").unwrap();
        assert!(registry.pending("goerli", "Arbiter").unwrap().is_none());
        // Clearing twice is fine.
        registry.clear_pending("goerli", "Arbiter").unwrap();
    }
}
