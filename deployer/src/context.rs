use crate::{
    config::NetworkConfig,
    constants,
    error::{DeployError, Result},
    provider::{Provider, RpcProvider},
};
use std::{fmt, sync::Arc, time::Duration};

/// Everything a run needs to talk to one network.
///
/// Built once per run from configuration and passed to every orchestrator call. Cloning shares
/// the underlying provider handle.
#[derive(Clone)]
pub struct NetworkContext {
    network: String,
    rpc_url: String,
    timeout: Duration,
    poll_interval: Duration,
    retries: u32,
    provider: Arc<dyn Provider>,
}

impl NetworkContext {
    /// Connects to the network described by `config`.
    ///
    /// When the configuration pins a chain id, the node is asked for its own and a mismatch
    /// refuses the connection.
    pub async fn connect(network: &str, config: &NetworkConfig) -> Result<Self> {
        let rpc_url = config.rpc_url();
        let provider = RpcProvider::new(&rpc_url).map_err(|e| DeployError::Config(e.to_string()))?;
        let ctx = Self {
            network: network.to_string(),
            rpc_url,
            timeout: config.timeout(),
            poll_interval: config.poll_interval(),
            retries: config.retries(),
            provider: Arc::new(provider),
        };
        if let Some(expected) = &config.chain_id {
            ctx.verify_chain_id(expected).await?;
        }
        Ok(ctx)
    }

    /// A context over an existing provider, with default timings.
    pub fn with_provider(network: &str, provider: Arc<dyn Provider>) -> Self {
        Self {
            network: network.to_string(),
            rpc_url: String::new(),
            timeout: Duration::from_secs(constants::DEFAULT_CONFIRMATION_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(constants::DEFAULT_POLL_INTERVAL_MS),
            retries: constants::DEFAULT_SUBMIT_RETRIES,
            provider,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub async fn verify_chain_id(&self, expected: &str) -> Result<()> {
        let actual = self
            .provider
            .chain_id()
            .await
            .map_err(|e| DeployError::Transport(e.to_string()))?;
        if actual != expected {
            return Err(DeployError::Config(format!(
                "network `{}` is configured for chain `{expected}` but the node reports `{actual}`",
                self.network
            )));
        }
        Ok(())
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn rpc_url(&self) -> &str {
        &self.rpc_url
    }

    /// Upper bound on waiting for a transaction to be confirmed.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// How many times a submission failing in transport is sent again.
    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn provider(&self) -> &dyn Provider {
        self.provider.as_ref()
    }
}

impl fmt::Debug for NetworkContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NetworkContext")
            .field("network", &self.network)
            .field("rpc_url", &self.rpc_url)
            .field("timeout", &self.timeout)
            .field("poll_interval", &self.poll_interval)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{error::ErrorKind, provider::LocalNode};

    #[tokio::test]
    async fn chain_id_mismatch_is_refused() {
        let ctx = NetworkContext::with_provider("goerli", Arc::new(LocalNode::new("SN_GOERLI")));
        ctx.verify_chain_id("SN_GOERLI").await.unwrap();
        let err = ctx.verify_chain_id("SN_MAIN").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
        assert!(err.to_string().contains("`SN_MAIN`"));
    }

    #[test]
    fn clones_share_the_provider() {
        let node = Arc::new(LocalNode::new("SN_LOCAL"));
        let ctx = NetworkContext::with_provider("local", node.clone())
            .with_retries(5)
            .with_timeout(Duration::from_secs(1));
        let clone = ctx.clone();
        assert_eq!(clone.retries(), 5);
        assert_eq!(clone.timeout(), Duration::from_secs(1));
        assert_eq!(Arc::strong_count(&node), 3);
    }
}
