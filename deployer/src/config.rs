//! The `Deployer.toml` manifest.
//!
//! ```toml
//! default-network = "goerli"
//!
//! [registry]
//! path = "deployments"
//!
//! [network.goerli]
//! target = "goerli"
//! account = "0x0123"
//! timeout = 300
//!
//! [[step]]
//! name = "Arbiter"
//! kind = "deploy"
//! args = ["$owner"]
//! ```

use crate::{
    account::AccountProvider, constants, felt::Felt, orchestrator::Step, util::target::Target,
};
use anyhow::{anyhow, bail, Context, Result};
use deployer_util::{find_manifest_dir, validate_name, MANIFEST_FILE_NAME};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    ops::Deref,
    path::{Path, PathBuf},
    time::Duration,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct DeployerManifest {
    pub default_network: Option<String>,
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub network: BTreeMap<String, NetworkConfig>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct RegistryConfig {
    /// Relative paths are resolved against the manifest directory.
    pub path: Option<PathBuf>,
    pub write_retries: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct NetworkConfig {
    pub target: Option<Target>,
    /// Overrides the URL of `target`.
    pub rpc_url: Option<String>,
    pub chain_id: Option<String>,
    /// The owner account used as sender and as the `$owner` argument.
    pub account: Option<Felt>,
    /// Seconds.
    pub timeout: Option<u64>,
    pub retries: Option<u32>,
    /// Milliseconds.
    pub poll_interval: Option<u64>,
}

impl NetworkConfig {
    /// The preset this network is, named or recognised by its RPC URL.
    pub fn known_target(&self) -> Option<Target> {
        match &self.rpc_url {
            Some(url) => self
                .target
                .or_else(|| Target::from_target_url(url.trim_end_matches('/'))),
            None => Some(self.target.unwrap_or_default()),
        }
    }

    pub fn rpc_url(&self) -> String {
        match &self.rpc_url {
            Some(url) => url.clone(),
            None => self.target.unwrap_or_default().target_url().to_string(),
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(
            self.timeout
                .unwrap_or(constants::DEFAULT_CONFIRMATION_TIMEOUT_SECS),
        )
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval.unwrap_or(constants::DEFAULT_POLL_INTERVAL_MS))
    }

    pub fn retries(&self) -> u32 {
        self.retries.unwrap_or(constants::DEFAULT_SUBMIT_RETRIES)
    }
}

/// A parsed manifest along with the path it was read from.
#[derive(Debug, Clone)]
pub struct ManifestFile {
    path: PathBuf,
    manifest: DeployerManifest,
}

impl DeployerManifest {
    pub fn parse(contents: &str) -> Result<Self> {
        let manifest: Self = toml::from_str(contents)?;
        manifest.validate()?;
        Ok(manifest)
    }

    fn validate(&self) -> Result<()> {
        for name in self.network.keys() {
            validate_name(name, "network name")?;
        }
        if let Some(default) = &self.default_network {
            validate_name(default, "network name")?;
        }
        Ok(())
    }

    /// Picks the network to run against: the explicit choice, else `default-network`.
    pub fn select_network(&self, explicit: Option<&str>) -> Result<String> {
        let network = explicit
            .map(str::to_string)
            .or_else(|| self.default_network.clone())
            .ok_or_else(|| {
                anyhow!(
                    "no network selected: pass `--network`, set `{}` or add \
                    `default-network` to {MANIFEST_FILE_NAME}",
                    constants::NETWORK_ENV_VAR
                )
            })?;
        validate_name(&network, "network name")?;
        Ok(network)
    }

    /// The configuration of `network`. A preset target name with no table of its own gets the
    /// preset defaults.
    pub fn network_config(&self, network: &str) -> Result<NetworkConfig> {
        if let Some(config) = self.network.get(network) {
            return Ok(config.clone());
        }
        match network.parse::<Target>() {
            Ok(target) => Ok(NetworkConfig {
                target: Some(target),
                ..Default::default()
            }),
            Err(_) => bail!("network `{network}` is not configured in {MANIFEST_FILE_NAME}"),
        }
    }

    /// Owner accounts of every configured network, with `account_override` taking the place of
    /// the configured account on `network`.
    pub fn accounts(&self, network: &str, account_override: Option<Felt>) -> AccountProvider {
        let mut accounts = AccountProvider::default();
        for (name, config) in &self.network {
            if let Some(address) = config.account {
                accounts = accounts.with_account(name, address);
            }
        }
        if let Some(address) = account_override {
            accounts = accounts.with_account(network, address);
        }
        accounts
    }
}

impl ManifestFile {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read manifest at {}", path.display()))?;
        let manifest = DeployerManifest::parse(&contents)
            .with_context(|| format!("failed to parse manifest at {}", path.display()))?;
        Ok(Self { path, manifest })
    }

    /// Reads the manifest found in `dir` or the closest of its parents.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let manifest_dir = find_manifest_dir(dir).ok_or_else(|| {
            anyhow!(
                "could not find a {MANIFEST_FILE_NAME} in {} or any parent directory",
                dir.display()
            )
        })?;
        Self::from_file(manifest_dir.join(MANIFEST_FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn dir(&self) -> &Path {
        self.path.parent().unwrap_or_else(|| Path::new("."))
    }

    pub fn registry_path(&self) -> PathBuf {
        match &self.manifest.registry.path {
            Some(path) => self.dir().join(path),
            None => deployer_util::default_registry_directory(self.dir()),
        }
    }
}

impl Deref for ManifestFile {
    type Target = DeployerManifest;

    fn deref(&self) -> &Self::Target {
        &self.manifest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orchestrator::{Arg, StepAction};
    use pretty_assertions::assert_eq;

    const MANIFEST: &str = r#"
default-network = "goerli"

[registry]
path = "deployments"
write-retries = 4

[network.goerli]
target = "goerli"
chain-id = "SN_GOERLI"
account = "0x0123"
timeout = 30
poll-interval = 500

[network.devnet]
rpc-url = "http://127.0.0.1:5050/rpc"
retries = 0

[[step]]
name = "Arbiter"
kind = "deploy"
args = ["$owner"]

[[step]]
name = "ModuleController"
kind = "deploy"
args = ["@Arbiter", "@Lords"]

[[step]]
name = "Arbiter_set_controller"
kind = "invoke"
target = "Arbiter"
entrypoint = "set_address_of_controller"
args = ["@ModuleController"]
"#;

    #[test]
    fn parses_networks_and_steps() {
        let manifest = DeployerManifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.registry.write_retries, Some(4));

        let goerli = manifest.network_config("goerli").unwrap();
        assert_eq!(goerli.rpc_url(), constants::GOERLI_RPC_URL);
        assert_eq!(goerli.timeout(), Duration::from_secs(30));
        assert_eq!(goerli.poll_interval(), Duration::from_millis(500));
        assert_eq!(goerli.retries(), constants::DEFAULT_SUBMIT_RETRIES);
        assert_eq!(goerli.chain_id.as_deref(), Some("SN_GOERLI"));

        let devnet = manifest.network_config("devnet").unwrap();
        assert_eq!(devnet.rpc_url(), "http://127.0.0.1:5050/rpc");
        assert_eq!(devnet.retries(), 0);

        assert_eq!(manifest.steps.len(), 3);
        assert_eq!(
            manifest.steps[1].action,
            StepAction::Deploy {
                contract: None,
                args: vec![
                    Arg::Dependency("Arbiter".into()),
                    Arg::Dependency("Lords".into())
                ],
                redeploy: false,
            }
        );
        assert!(matches!(
            &manifest.steps[2].action,
            StepAction::Invoke { target, .. } if target == "Arbiter"
        ));
    }

    #[test]
    fn network_selection_order() {
        let manifest = DeployerManifest::parse(MANIFEST).unwrap();
        assert_eq!(manifest.select_network(Some("devnet")).unwrap(), "devnet");
        assert_eq!(manifest.select_network(None).unwrap(), "goerli");

        let bare = DeployerManifest::default();
        let err = bare.select_network(None).unwrap_err();
        assert!(err.to_string().contains(constants::NETWORK_ENV_VAR));
    }

    #[test]
    fn preset_targets_need_no_table() {
        let manifest = DeployerManifest::default();
        let mainnet = manifest.network_config("mainnet").unwrap();
        assert_eq!(mainnet.rpc_url(), constants::MAINNET_RPC_URL);
        assert!(manifest.network_config("staging").is_err());
        assert_eq!(mainnet.known_target(), Some(Target::Mainnet));

        let by_url = NetworkConfig {
            rpc_url: Some(format!("{}/", constants::SEPOLIA_RPC_URL)),
            ..Default::default()
        };
        assert_eq!(by_url.known_target(), Some(Target::Sepolia));
        let custom = NetworkConfig {
            rpc_url: Some("http://10.0.0.7:9545/rpc".into()),
            ..Default::default()
        };
        assert_eq!(custom.known_target(), None);
    }

    #[test]
    fn accounts_are_keyed_by_network() {
        let manifest = DeployerManifest::parse(MANIFEST).unwrap();
        let accounts = manifest.accounts("devnet", None);
        assert_eq!(
            accounts.owner_account("goerli").unwrap().address,
            Felt::from(0x0123u64)
        );
        assert!(accounts.owner_account("devnet").is_err());

        let accounts = manifest.accounts("devnet", Some(Felt::from(7u64)));
        assert_eq!(
            accounts.owner_account("devnet").unwrap().address,
            Felt::from(7u64)
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(DeployerManifest::parse("[network.goerli]\nnode-url = \"x\"\n").is_err());
        assert!(DeployerManifest::parse("[network.\"goerli/..\"]\n").is_err());
    }

    #[test]
    fn manifest_file_resolves_registry_path() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MANIFEST_FILE_NAME), MANIFEST).unwrap();
        let nested = dir.path().join("contracts");
        std::fs::create_dir_all(&nested).unwrap();

        let manifest = ManifestFile::from_dir(&nested).unwrap();
        assert_eq!(
            manifest.registry_path(),
            std::fs::canonicalize(dir.path()).unwrap().join("deployments")
        );
        assert_eq!(manifest.default_network.as_deref(), Some("goerli"));
    }
}
