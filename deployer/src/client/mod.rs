//! Clients submitting transactions and waiting for their confirmation.
//!
//! Neither client knows about logical contract names nor retries anything: a failed submission
//! or confirmation is returned as is and the caller decides what to do.

pub mod deploy;
pub mod execute;

pub use deploy::{DeploymentClient, Submitted};
pub use execute::{CallSpec, ExecutionClient};

use crate::{
    context::NetworkContext,
    felt::Felt,
    provider::{TxHash, TxStatus},
};
use serde::{Deserialize, Serialize};

/// Proof that a transaction was included. Failures are reported through the error instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentReceipt {
    /// The created contract. `None` for invocations.
    pub address: Option<Felt>,
    pub transaction_hash: TxHash,
    pub block_number: u64,
}

pub(crate) enum Confirmation {
    Accepted { block_number: u64 },
    Failed { reason: String },
    TimedOut,
}

/// Polls the status of `tx_hash` until it settles or the context's timeout elapses.
///
/// Transport errors while polling are not fatal: the transaction is already submitted, and only
/// the timeout decides when to give up on it.
pub(crate) async fn await_confirmation(ctx: &NetworkContext, tx_hash: &TxHash) -> Confirmation {
    let poll = async {
        loop {
            match ctx.provider().transaction_status(tx_hash).await {
                Ok(TxStatus::Accepted { block_number }) => {
                    return Confirmation::Accepted { block_number }
                }
                Ok(TxStatus::Rejected { reason } | TxStatus::Reverted { reason }) => {
                    return Confirmation::Failed { reason }
                }
                Ok(status) => tracing::trace!(%tx_hash, ?status, "waiting for confirmation"),
                Err(e) => tracing::debug!(%tx_hash, "failed to poll transaction status: {e}"),
            }
            tokio::time::sleep(ctx.poll_interval()).await;
        }
    };
    tokio::time::timeout(ctx.timeout(), poll)
        .await
        .unwrap_or(Confirmation::TimedOut)
}
