//! The address registry: one active deployment per `(network, logical name)`.
//!
//! Records live at `<root>/<network>/<name>.json` as pretty JSON so they can be inspected and
//! reviewed by hand. Every write goes through a temporary file that is atomically persisted over
//! the record while an advisory lock on `<root>/<network>/.locks/<name>.lock` is held.

mod journal;

pub use journal::PendingDeployment;

use crate::{
    constants,
    error::{DeployError, Result},
    felt::Felt,
    provider::ContractRef,
};
use chrono::{DateTime, Utc};
use deployer_util::fs_locking::PathLock;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    time::Duration,
};
use tempfile::NamedTempFile;

const RECORD_EXTENSION: &str = "json";
const LOCKS_DIR: &str = ".locks";

#[derive(Debug, Clone)]
pub struct Registry {
    root: PathBuf,
    write_retries: u32,
}

/// The active deployment of a logical contract on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentRecord {
    pub network: String,
    pub name: String,
    pub address: Felt,
    pub metadata: DeploymentMetadata,
    /// Incremented on every write that changes the record.
    pub revision: u64,
    /// Earlier deployments under the same name, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<SupersededDeployment>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentMetadata {
    pub contract: ContractRef,
    pub constructor_calldata: Vec<Felt>,
    pub transaction_hash: Felt,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_number: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<Felt>,
    pub deployed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupersededDeployment {
    pub address: Felt,
    pub metadata: DeploymentMetadata,
    pub superseded_at: DateTime<Utc>,
}

enum WriteAttempt {
    Written(DeploymentRecord),
    Conflict,
}

impl Registry {
    /// Opens the registry rooted at `root`. The directory is created lazily on first write.
    pub fn open<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            write_retries: constants::DEFAULT_REGISTRY_WRITE_RETRIES,
        }
    }

    pub fn with_write_retries(mut self, write_retries: u32) -> Self {
        self.write_retries = write_retries.max(1);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The address recorded for `name` on exactly `network`.
    pub fn resolve(&self, network: &str, name: &str) -> Result<Felt> {
        self.get(network, name)?
            .map(|record| record.address)
            .ok_or_else(|| DeployError::UnknownContract {
                network: network.to_string(),
                name: name.to_string(),
            })
    }

    pub fn get(&self, network: &str, name: &str) -> Result<Option<DeploymentRecord>> {
        let path = self.record_path(network, name)?;
        read_json(&path)
    }

    /// Records `address` as the active deployment of `name` on `network`.
    ///
    /// Writing the address and transaction that are already recorded is a no-op. Any other value
    /// replaces the active record and moves the previous one into its history.
    pub fn record(
        &self,
        network: &str,
        name: &str,
        address: Felt,
        metadata: DeploymentMetadata,
    ) -> Result<DeploymentRecord> {
        let path = self.record_path(network, name)?;
        let lock_path = self.lock_path(network, name);
        for attempt in 1..=self.write_retries {
            let seen = read_json::<DeploymentRecord>(&path)?.map(|r| r.revision);
            match self.try_record(&path, &lock_path, seen, network, name, address, &metadata)? {
                WriteAttempt::Written(record) => return Ok(record),
                WriteAttempt::Conflict => {
                    tracing::debug!(network, name, attempt, "registry write conflict, retrying");
                    std::thread::sleep(Duration::from_millis(
                        constants::REGISTRY_WRITE_BACKOFF_MS * u64::from(attempt),
                    ));
                }
            }
        }
        Err(DeployError::RegistryWriteConflict {
            network: network.to_string(),
            name: name.to_string(),
            attempts: self.write_retries,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn try_record(
        &self,
        path: &Path,
        lock_path: &Path,
        seen: Option<u64>,
        network: &str,
        name: &str,
        address: Felt,
        metadata: &DeploymentMetadata,
    ) -> Result<WriteAttempt> {
        let mut lock = PathLock::open(lock_path)?;
        let Some(_guard) = lock.try_lock()? else {
            return Ok(WriteAttempt::Conflict);
        };
        let current = read_json::<DeploymentRecord>(path)?;
        if current.as_ref().map(|r| r.revision) != seen {
            return Ok(WriteAttempt::Conflict);
        }
        let record = match current {
            Some(current)
                if current.address == address
                    && current.metadata.transaction_hash == metadata.transaction_hash =>
            {
                return Ok(WriteAttempt::Written(current));
            }
            Some(mut current) => {
                tracing::info!(
                    network,
                    name,
                    previous = %current.address,
                    %address,
                    "superseding recorded deployment"
                );
                current.history.push(SupersededDeployment {
                    address: current.address,
                    metadata: current.metadata,
                    superseded_at: Utc::now(),
                });
                DeploymentRecord {
                    network: network.to_string(),
                    name: name.to_string(),
                    address,
                    metadata: metadata.clone(),
                    revision: current.revision + 1,
                    history: current.history,
                }
            }
            None => DeploymentRecord {
                network: network.to_string(),
                name: name.to_string(),
                address,
                metadata: metadata.clone(),
                revision: 1,
                history: vec![],
            },
        };
        write_json_atomic(path, &record)?;
        Ok(WriteAttempt::Written(record))
    }

    /// Every active record on `network`, sorted by name.
    pub fn list(&self, network: &str) -> Result<Vec<DeploymentRecord>> {
        let dir = self.network_dir(network)?;
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(e.into()),
        };
        let mut records = vec![];
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == RECORD_EXTENSION) {
                if let Some(record) = read_json::<DeploymentRecord>(&path)? {
                    records.push(record);
                }
            }
        }
        records.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(records)
    }

    /// The deployments `name` superseded on `network`, oldest first.
    pub fn history(&self, network: &str, name: &str) -> Result<Vec<SupersededDeployment>> {
        self.get(network, name)?
            .map(|record| record.history)
            .ok_or_else(|| DeployError::UnknownContract {
                network: network.to_string(),
                name: name.to_string(),
            })
    }

    fn network_dir(&self, network: &str) -> Result<PathBuf> {
        check_name(network, "network name")?;
        Ok(self.root.join(network))
    }

    fn record_path(&self, network: &str, name: &str) -> Result<PathBuf> {
        check_name(name, "logical contract name")?;
        Ok(self
            .network_dir(network)?
            .join(name)
            .with_extension(RECORD_EXTENSION))
    }

    fn lock_path(&self, network: &str, name: &str) -> PathBuf {
        self.root
            .join(network)
            .join(LOCKS_DIR)
            .join(name)
            .with_extension("lock")
    }
}

fn check_name(name: &str, use_case: &str) -> Result<()> {
    deployer_util::validate_name(name, use_case).map_err(|e| DeployError::InvalidName {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Writes `value` next to `path` and renames it into place, so readers never see a torn file.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let dir = path
        .parent()
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "record path has no parent"))?;
    fs::create_dir_all(dir)?;
    let mut file = NamedTempFile::new_in(dir)?;
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
