use super::{await_confirmation, Confirmation, DeploymentReceipt};
use crate::{
    calldata::{self, CalldataField},
    context::NetworkContext,
    error::{DeployError, Result},
    felt::Felt,
    provider::{ContractRef, DeployTransaction, ProviderError, TxHash},
};

/// Creates contract instances from the account `sender`.
#[derive(Debug, Clone)]
pub struct DeploymentClient {
    sender: Felt,
}

/// A creation transaction the network accepted into its mempool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submitted {
    pub transaction_hash: TxHash,
    pub address: Felt,
    pub salt: Felt,
    pub calldata: Vec<Felt>,
}

/// A fresh random salt, so that two deployments of the same code get different addresses.
pub fn random_salt() -> Felt {
    Felt::from_be_bytes_truncated(rand::random())
}

impl DeploymentClient {
    pub fn new(sender: Felt) -> Self {
        Self { sender }
    }

    pub fn sender(&self) -> Felt {
        self.sender
    }

    /// Deploys `contract` and waits until the network includes the creation transaction.
    pub async fn deploy(
        &self,
        contract: &ContractRef,
        constructor_args: &[CalldataField],
        ctx: &NetworkContext,
    ) -> Result<DeploymentReceipt> {
        let submitted = self.submit(contract, constructor_args, None, ctx).await?;
        self.confirm(contract, &submitted, ctx).await
    }

    /// Sends the creation transaction. A random salt is drawn unless one is given.
    pub async fn submit(
        &self,
        contract: &ContractRef,
        constructor_args: &[CalldataField],
        salt: Option<Felt>,
        ctx: &NetworkContext,
    ) -> Result<Submitted> {
        let calldata = calldata::encode(constructor_args)?;
        let salt = salt.unwrap_or_else(random_salt);
        let tx = DeployTransaction {
            sender: self.sender,
            contract: contract.clone(),
            constructor_calldata: calldata,
            salt,
        };
        tracing::debug!(%contract, network = ctx.network(), %salt, "submitting deployment");
        let submission = ctx
            .provider()
            .add_deploy_transaction(&tx)
            .await
            .map_err(|e| match e {
                ProviderError::Transport(msg) => DeployError::Transport(msg),
                e => DeployError::DeploymentRejected {
                    contract: contract.to_string(),
                    reason: e.to_string(),
                },
            })?;
        Ok(Submitted {
            transaction_hash: submission.transaction_hash,
            address: submission.contract_address,
            salt,
            calldata: tx.constructor_calldata,
        })
    }

    /// Waits for the creation transaction to be included.
    pub async fn confirm(
        &self,
        contract: &ContractRef,
        submitted: &Submitted,
        ctx: &NetworkContext,
    ) -> Result<DeploymentReceipt> {
        match await_confirmation(ctx, &submitted.transaction_hash).await {
            Confirmation::Accepted { block_number } => Ok(DeploymentReceipt {
                address: Some(submitted.address),
                transaction_hash: submitted.transaction_hash,
                block_number,
            }),
            Confirmation::Failed { reason } => Err(DeployError::DeploymentRejected {
                contract: contract.to_string(),
                reason,
            }),
            Confirmation::TimedOut => Err(DeployError::DeploymentTimeout {
                tx_hash: submitted.transaction_hash,
                timeout: ctx.timeout(),
            }),
        }
    }
}
