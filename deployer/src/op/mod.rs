mod registry;
mod step;
mod view;

pub use registry::{history, list, resolve};
pub use step::{run, step};
pub use view::view;

use crate::{
    cmd::{Action, Command},
    config::{ManifestFile, NetworkConfig},
    context::NetworkContext,
    felt::Felt,
    orchestrator::{Orchestrator, Plan},
    registry::Registry,
};
use anyhow::{Context, Result};

/// Runs the action of a parsed command line.
pub async fn execute(command: Command) -> Result<()> {
    let session = Session::load(&command)?;
    match command.action {
        Action::Step { name, redeploy } => step(&session, &name, redeploy).await,
        Action::Run { redeploy } => run(&session, redeploy).await,
        Action::Resolve { name } => resolve(&session, &name),
        Action::List => list(&session),
        Action::History { name } => history(&session, &name),
        Action::View {
            name,
            entrypoint,
            args,
        } => view(&session, &name, &entrypoint, &args).await,
    }
}

/// The manifest, the selected network and the orchestrator wired up for one invocation.
pub struct Session {
    manifest: ManifestFile,
    network: String,
    network_config: NetworkConfig,
    orchestrator: Orchestrator,
}

impl Session {
    pub fn load(command: &Command) -> Result<Self> {
        let manifest = match &command.path {
            Some(path) => ManifestFile::from_dir(path)?,
            None => {
                let cwd = std::env::current_dir().context("failed to read current directory")?;
                ManifestFile::from_dir(cwd)?
            }
        };
        Self::from_manifest(manifest, command.network.as_deref(), command.account)
    }

    pub fn from_manifest(
        manifest: ManifestFile,
        network: Option<&str>,
        account: Option<Felt>,
    ) -> Result<Self> {
        let network = manifest.select_network(network)?;
        let network_config = manifest.network_config(&network)?;
        let mut registry = Registry::open(manifest.registry_path());
        if let Some(retries) = manifest.registry.write_retries {
            registry = registry.with_write_retries(retries);
        }
        let accounts = manifest.accounts(&network, account);
        tracing::debug!(
            network,
            registry = %registry.root().display(),
            manifest = %manifest.path().display(),
            "session loaded"
        );
        Ok(Self {
            manifest,
            network,
            network_config,
            orchestrator: Orchestrator::new(registry, accounts),
        })
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn registry(&self) -> &Registry {
        self.orchestrator.registry()
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }

    pub fn plan(&self) -> Result<Plan> {
        Plan::new(self.manifest.steps.clone()).with_context(|| {
            format!("invalid plan in {}", self.manifest.path().display())
        })
    }

    pub async fn connect(&self) -> Result<NetworkContext> {
        Ok(NetworkContext::connect(&self.network, &self.network_config).await?)
    }

    /// A link to `address` on the block explorer of the network, if it has one.
    fn explorer_link(&self, address: &Felt) -> Option<String> {
        self.network_config
            .known_target()
            .and_then(|target| target.explorer_url())
            .map(|url| format!("{url}/contract/{address}"))
    }
}
