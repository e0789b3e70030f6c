use crate::{
    client::{CallSpec, DeploymentClient, DeploymentReceipt, ExecutionClient},
    context::NetworkContext,
    error::{DeployError, Result},
    felt::Felt,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The account owning deployments on one network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountRef {
    pub network: String,
    pub address: Felt,
}

/// Owner accounts keyed by network. Lookups are deterministic and never fall back to
/// another network.
#[derive(Debug, Clone, Default)]
pub struct AccountProvider {
    accounts: BTreeMap<String, Felt>,
}

impl AccountProvider {
    pub fn with_account(mut self, network: &str, address: Felt) -> Self {
        self.accounts.insert(network.to_string(), address);
        self
    }

    pub fn owner_account(&self, network: &str) -> Result<AccountRef> {
        self.accounts
            .get(network)
            .map(|address| AccountRef {
                network: network.to_string(),
                address: *address,
            })
            .ok_or_else(|| DeployError::MissingCredential {
                network: network.to_string(),
            })
    }

    pub fn signer(&self, ctx: &NetworkContext) -> Result<Signer> {
        Ok(Signer {
            account: self.owner_account(ctx.network())?,
            ctx: ctx.clone(),
        })
    }
}

/// Sends transactions from the owner account of one network.
#[derive(Debug, Clone)]
pub struct Signer {
    account: AccountRef,
    ctx: NetworkContext,
}

impl Signer {
    pub fn account(&self) -> &AccountRef {
        &self.account
    }

    /// Encodes the calldata of `call` and executes it, waiting for confirmation.
    pub async fn execute(&self, call: &CallSpec) -> Result<DeploymentReceipt> {
        self.execution_client().call(call, &self.ctx).await
    }

    pub fn execution_client(&self) -> ExecutionClient {
        ExecutionClient::new(self.account.address)
    }

    pub fn deployment_client(&self) -> DeploymentClient {
        DeploymentClient::new(self.account.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{calldata::CalldataField, error::ErrorKind, provider::LocalNode};
    use std::{sync::Arc, time::Duration};

    #[test]
    fn missing_credential() {
        let accounts = AccountProvider::default().with_account("goerli", Felt::from(0x0123u64));
        assert_eq!(
            accounts.owner_account("goerli").unwrap(),
            AccountRef {
                network: "goerli".into(),
                address: Felt::from(0x0123u64)
            }
        );
        let err = accounts.owner_account("mainnet").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MissingCredential);

        let ctx = NetworkContext::with_provider("mainnet", Arc::new(LocalNode::new("SN_MAIN")));
        assert_eq!(
            accounts.signer(&ctx).unwrap_err().kind(),
            ErrorKind::MissingCredential
        );
    }

    #[tokio::test]
    async fn signer_sends_from_owner() {
        let node = Arc::new(LocalNode::new("SN_LOCAL"));
        node.declare("Arbiter", &["set_address_of_controller"]);
        let ctx = NetworkContext::with_provider("local", node.clone())
            .with_poll_interval(Duration::from_millis(1));
        let signer = AccountProvider::default()
            .with_account("local", Felt::from(0x0123u64))
            .signer(&ctx)
            .unwrap();

        let deployed = signer
            .deployment_client()
            .deploy(&"Arbiter".into(), &[CalldataField::from("$owner")], &ctx)
            .await;
        // `$owner` is an orchestrator argument, not a calldata literal.
        assert_eq!(
            deployed.unwrap_err().kind(),
            ErrorKind::CalldataEncodingError
        );
        assert_eq!(node.submissions(), 0);

        let receipt = signer
            .deployment_client()
            .deploy(
                &"Arbiter".into(),
                &[CalldataField::from(Felt::from(0x0123u64))],
                &ctx,
            )
            .await
            .unwrap();
        let address = receipt.address.unwrap();

        signer
            .execute(&CallSpec::new(
                address,
                "set_address_of_controller",
                vec!["0xbbb".into()],
            ))
            .await
            .unwrap();
        let invocations = node.invocations();
        assert_eq!(invocations.len(), 1);
        assert_eq!(invocations[0].sender, Felt::from(0x0123u64));
        assert_eq!(invocations[0].calldata, vec![Felt::from(0xbbbu64)]);
    }
}
