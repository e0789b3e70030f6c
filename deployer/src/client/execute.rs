use super::{await_confirmation, Confirmation, DeploymentReceipt};
use crate::{
    calldata::{self, CalldataField},
    context::NetworkContext,
    error::{DeployError, Result},
    felt::Felt,
    provider::{FunctionCall, InvokeTransaction, ProviderError, TxHash},
};

/// A call to an entrypoint of a deployed contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSpec {
    pub target: Felt,
    pub entrypoint: String,
    pub calldata: Vec<CalldataField>,
}

impl CallSpec {
    pub fn new(target: Felt, entrypoint: &str, calldata: Vec<CalldataField>) -> Self {
        Self {
            target,
            entrypoint: entrypoint.to_string(),
            calldata,
        }
    }
}

/// Invokes entrypoints from the account `sender`.
#[derive(Debug, Clone)]
pub struct ExecutionClient {
    sender: Felt,
}

impl ExecutionClient {
    pub fn new(sender: Felt) -> Self {
        Self { sender }
    }

    /// Invokes the entrypoint and waits for the transaction to be included.
    pub async fn call(&self, call: &CallSpec, ctx: &NetworkContext) -> Result<DeploymentReceipt> {
        let tx_hash = self.submit(call, ctx).await?;
        self.confirm(call, &tx_hash, ctx).await
    }

    pub async fn submit(&self, call: &CallSpec, ctx: &NetworkContext) -> Result<TxHash> {
        let tx = InvokeTransaction {
            sender: self.sender,
            contract_address: call.target,
            entrypoint: call.entrypoint.clone(),
            calldata: calldata::encode(&call.calldata)?,
        };
        tracing::debug!(
            target_address = %call.target,
            entrypoint = %call.entrypoint,
            network = ctx.network(),
            "submitting invocation"
        );
        ctx.provider()
            .add_invoke_transaction(&tx)
            .await
            .map_err(|e| map_call_error(call, e))
    }

    pub async fn confirm(
        &self,
        call: &CallSpec,
        tx_hash: &TxHash,
        ctx: &NetworkContext,
    ) -> Result<DeploymentReceipt> {
        match await_confirmation(ctx, tx_hash).await {
            Confirmation::Accepted { block_number } => Ok(DeploymentReceipt {
                address: None,
                transaction_hash: *tx_hash,
                block_number,
            }),
            Confirmation::Failed { reason } => Err(DeployError::ExecutionReverted {
                address: call.target,
                entrypoint: call.entrypoint.clone(),
                reason,
            }),
            Confirmation::TimedOut => Err(DeployError::ExecutionTimeout {
                tx_hash: *tx_hash,
                timeout: ctx.timeout(),
            }),
        }
    }

    /// Reads state through a call that never becomes a transaction.
    pub async fn view(&self, call: &CallSpec, ctx: &NetworkContext) -> Result<Vec<Felt>> {
        let function_call = FunctionCall {
            contract_address: call.target,
            entrypoint: call.entrypoint.clone(),
            calldata: calldata::encode(&call.calldata)?,
        };
        ctx.provider()
            .call(&function_call)
            .await
            .map_err(|e| map_call_error(call, e))
    }
}

fn map_call_error(call: &CallSpec, e: ProviderError) -> DeployError {
    match e {
        ProviderError::Transport(msg) => DeployError::Transport(msg),
        ProviderError::EntrypointNotFound => DeployError::EntrypointNotFound {
            address: call.target,
            entrypoint: call.entrypoint.clone(),
        },
        e @ (ProviderError::Rejected(_) | ProviderError::Rpc { .. }) => {
            DeployError::ExecutionReverted {
                address: call.target,
                entrypoint: call.entrypoint.clone(),
                reason: e.to_string(),
            }
        }
    }
}
