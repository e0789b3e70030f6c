//! An in-process network.
//!
//! Addresses and transaction hashes are derived deterministically from the submitted data.
//! Failure modes (rejections, stalled confirmations, reverts, transport errors, lost responses)
//! can be scripted,
//! and every submission is counted, which makes the node a convenient stand-in for a devnet.

use super::{
    ContractRef, DeploySubmission, DeployTransaction, FunctionCall, InvokeTransaction, Provider,
    ProviderError, TxHash, TxStatus,
};
use crate::felt::Felt;
use async_trait::async_trait;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashMap, VecDeque};

#[derive(Debug)]
pub struct LocalNode {
    chain_id: String,
    state: Mutex<State>,
}

#[derive(Debug, Default)]
struct State {
    classes: HashMap<ContractRef, BTreeSet<String>>,
    contracts: HashMap<Felt, ContractRef>,
    transactions: HashMap<TxHash, Transaction>,
    views: HashMap<(Felt, String), Vec<Felt>>,
    reverting: HashMap<String, String>,
    queued_addresses: VecDeque<Felt>,
    reject_next: Option<String>,
    transport_failures: usize,
    lost_responses: usize,
    stalled: bool,
    block_number: u64,
    nonce: u64,
    deployments: Vec<DeployTransaction>,
    invocations: Vec<InvokeTransaction>,
}

#[derive(Debug)]
struct Transaction {
    status: TxStatus,
    effect: Effect,
}

#[derive(Debug)]
enum Effect {
    Deploy {
        address: Felt,
        contract: ContractRef,
        sender: Felt,
        salt: Felt,
    },
    Invoke { revert_reason: Option<String> },
}

impl LocalNode {
    pub fn new(chain_id: &str) -> Self {
        Self {
            chain_id: chain_id.to_string(),
            state: Mutex::new(State::default()),
        }
    }

    /// Makes `contract` deployable, exposing the given entrypoints.
    pub fn declare(&self, contract: &str, entrypoints: &[&str]) {
        self.state.lock().classes.insert(
            ContractRef::from(contract),
            entrypoints.iter().map(|e| e.to_string()).collect(),
        );
    }

    /// The next deployment lands at `address` instead of a derived one.
    pub fn queue_address(&self, address: Felt) {
        self.state.lock().queued_addresses.push_back(address);
    }

    /// The next submission of any kind is rejected with `reason`.
    pub fn reject_next(&self, reason: &str) {
        self.state.lock().reject_next = Some(reason.to_string());
    }

    /// The next `times` submissions fail in transport before reaching the node.
    pub fn fail_transport(&self, times: usize) {
        self.state.lock().transport_failures = times;
    }

    /// The next `times` submissions reach the node, but their responses are lost in transport.
    pub fn lose_responses(&self, times: usize) {
        self.state.lock().lost_responses = times;
    }

    /// While stalled, submitted transactions stay `Received` until [`LocalNode::confirm_pending`].
    pub fn stall_confirmations(&self, stalled: bool) {
        self.state.lock().stalled = stalled;
    }

    /// Includes every transaction that is still waiting.
    pub fn confirm_pending(&self) {
        let mut state = self.state.lock();
        let pending = state
            .transactions
            .iter()
            .filter(|(_, tx)| tx.status == TxStatus::Received)
            .map(|(hash, _)| *hash)
            .collect::<Vec<_>>();
        for hash in pending {
            state.include(&hash);
        }
    }

    /// Invocations of `entrypoint` revert with `reason`.
    pub fn revert_entrypoint(&self, entrypoint: &str, reason: &str) {
        self.state
            .lock()
            .reverting
            .insert(entrypoint.to_string(), reason.to_string());
    }

    pub fn set_view_result(&self, address: Felt, entrypoint: &str, result: Vec<Felt>) {
        self.state
            .lock()
            .views
            .insert((address, entrypoint.to_string()), result);
    }

    /// Number of transactions that reached the node, accepted or rejected.
    pub fn submissions(&self) -> usize {
        let state = self.state.lock();
        state.deployments.len() + state.invocations.len()
    }

    pub fn deployments(&self) -> Vec<DeployTransaction> {
        self.state.lock().deployments.clone()
    }

    pub fn invocations(&self) -> Vec<InvokeTransaction> {
        self.state.lock().invocations.clone()
    }

    pub fn is_deployed(&self, address: &Felt) -> bool {
        self.state.lock().contracts.contains_key(address)
    }

    fn check_transport(state: &mut State) -> Result<(), ProviderError> {
        if state.transport_failures > 0 {
            state.transport_failures -= 1;
            return Err(ProviderError::Transport("connection reset by peer".into()));
        }
        Ok(())
    }

    fn check_response<T>(state: &mut State, response: T) -> Result<T, ProviderError> {
        if state.lost_responses > 0 {
            state.lost_responses -= 1;
            return Err(ProviderError::Transport("response lost".into()));
        }
        Ok(response)
    }
}

impl State {
    fn next_nonce(&mut self) -> u64 {
        self.nonce += 1;
        self.nonce
    }

    fn exposes(&self, address: &Felt, entrypoint: &str) -> bool {
        self.contracts
            .get(address)
            .and_then(|class| self.classes.get(class))
            .is_some_and(|entrypoints| entrypoints.contains(entrypoint))
    }

    fn submit(&mut self, hash: TxHash, effect: Effect) {
        self.transactions.insert(
            hash,
            Transaction {
                status: TxStatus::Received,
                effect,
            },
        );
        if !self.stalled {
            self.include(&hash);
        }
    }

    fn include(&mut self, hash: &TxHash) {
        let Some(tx) = self.transactions.get(hash) else {
            return;
        };
        let status = match &tx.effect {
            Effect::Deploy {
                address, contract, ..
            } => {
                if self.contracts.contains_key(address) {
                    TxStatus::Rejected {
                        reason: format!("contract already deployed at {address}"),
                    }
                } else {
                    self.contracts.insert(*address, contract.clone());
                    self.block_number += 1;
                    TxStatus::Accepted {
                        block_number: self.block_number,
                    }
                }
            }
            Effect::Invoke {
                revert_reason: Some(reason),
            } => {
                self.block_number += 1;
                TxStatus::Reverted {
                    reason: reason.clone(),
                }
            }
            Effect::Invoke {
                revert_reason: None,
            } => {
                self.block_number += 1;
                TxStatus::Accepted {
                    block_number: self.block_number,
                }
            }
        };
        if let Some(tx) = self.transactions.get_mut(hash) {
            tx.status = status;
        }
    }
}

fn derive_felt(domain: &str, parts: &[&[u8]]) -> Felt {
    let mut hasher = Sha256::new();
    hasher.update(domain.as_bytes());
    for part in parts {
        hasher.update((part.len() as u64).to_be_bytes());
        hasher.update(part);
    }
    Felt::from_be_bytes_truncated(hasher.finalize().into())
}

fn felts_bytes(felts: &[Felt]) -> Vec<u8> {
    felts.iter().flat_map(|f| f.to_be_bytes()).collect()
}

#[async_trait]
impl Provider for LocalNode {
    async fn chain_id(&self) -> Result<String, ProviderError> {
        Ok(self.chain_id.clone())
    }

    async fn add_deploy_transaction(
        &self,
        tx: &DeployTransaction,
    ) -> Result<DeploySubmission, ProviderError> {
        let mut state = self.state.lock();
        Self::check_transport(&mut state)?;
        state.deployments.push(tx.clone());
        if let Some(reason) = state.reject_next.take() {
            return Err(ProviderError::Rejected(reason));
        }
        if !state.classes.contains_key(&tx.contract) {
            return Err(ProviderError::Rejected(format!(
                "class `{}` is not declared",
                tx.contract
            )));
        }
        let calldata = felts_bytes(&tx.constructor_calldata);
        let address = match state.queued_addresses.pop_front() {
            Some(address) => address,
            None => derive_felt(
                "address",
                &[
                    tx.contract.0.as_bytes(),
                    &tx.salt.to_be_bytes(),
                    &tx.sender.to_be_bytes(),
                    &calldata,
                ],
            ),
        };
        let nonce = state.next_nonce();
        let transaction_hash = derive_felt(
            "deploy",
            &[&address.to_be_bytes(), &calldata, &nonce.to_be_bytes()],
        );
        state.submit(
            transaction_hash,
            Effect::Deploy {
                address,
                contract: tx.contract.clone(),
                sender: tx.sender,
                salt: tx.salt,
            },
        );
        Self::check_response(
            &mut state,
            DeploySubmission {
                transaction_hash,
                contract_address: address,
            },
        )
    }

    async fn add_invoke_transaction(
        &self,
        tx: &InvokeTransaction,
    ) -> Result<TxHash, ProviderError> {
        let mut state = self.state.lock();
        Self::check_transport(&mut state)?;
        state.invocations.push(tx.clone());
        if let Some(reason) = state.reject_next.take() {
            return Err(ProviderError::Rejected(reason));
        }
        if !state.exposes(&tx.contract_address, &tx.entrypoint) {
            return Err(ProviderError::EntrypointNotFound);
        }
        let revert_reason = state.reverting.get(&tx.entrypoint).cloned();
        let nonce = state.next_nonce();
        let transaction_hash = derive_felt(
            "invoke",
            &[
                &tx.contract_address.to_be_bytes(),
                tx.entrypoint.as_bytes(),
                &felts_bytes(&tx.calldata),
                &nonce.to_be_bytes(),
            ],
        );
        state.submit(transaction_hash, Effect::Invoke { revert_reason });
        Self::check_response(&mut state, transaction_hash)
    }

    async fn transaction_status(&self, tx_hash: &TxHash) -> Result<TxStatus, ProviderError> {
        let state = self.state.lock();
        Ok(state
            .transactions
            .get(tx_hash)
            .map(|tx| tx.status.clone())
            .unwrap_or(TxStatus::Unknown))
    }

    async fn find_deployment(
        &self,
        sender: &Felt,
        salt: &Felt,
    ) -> Result<Option<DeploySubmission>, ProviderError> {
        let state = self.state.lock();
        let found = state
            .transactions
            .iter()
            .filter_map(|(hash, tx)| match &tx.effect {
                Effect::Deploy {
                    address,
                    sender: s,
                    salt: t,
                    ..
                } if s == sender && t == salt => Some((*hash, *address, &tx.status)),
                _ => None,
            })
            .min_by_key(|(_, _, status)| match status {
                TxStatus::Accepted { .. } => 0,
                TxStatus::Received => 1,
                _ => 2,
            });
        Ok(found.map(|(transaction_hash, contract_address, _)| DeploySubmission {
            transaction_hash,
            contract_address,
        }))
    }

    async fn call(&self, call: &FunctionCall) -> Result<Vec<Felt>, ProviderError> {
        let state = self.state.lock();
        if !state.exposes(&call.contract_address, &call.entrypoint) {
            return Err(ProviderError::EntrypointNotFound);
        }
        Ok(state
            .views
            .get(&(call.contract_address, call.entrypoint.clone()))
            .cloned()
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deploy_tx(contract: &str, salt: u64) -> DeployTransaction {
        DeployTransaction {
            sender: Felt::from(1u64),
            contract: ContractRef::from(contract),
            constructor_calldata: vec![Felt::from(2u64)],
            salt: Felt::from(salt),
        }
    }

    #[tokio::test]
    async fn deploy_is_accepted_and_addressed_deterministically() {
        let node = LocalNode::new("SN_LOCAL");
        node.declare("Arbiter", &[]);
        let first = node.add_deploy_transaction(&deploy_tx("Arbiter", 1)).await.unwrap();
        assert!(node.is_deployed(&first.contract_address));
        assert!(matches!(
            node.transaction_status(&first.transaction_hash).await.unwrap(),
            TxStatus::Accepted { block_number: 1 }
        ));

        let other = LocalNode::new("SN_LOCAL");
        other.declare("Arbiter", &[]);
        let again = other.add_deploy_transaction(&deploy_tx("Arbiter", 1)).await.unwrap();
        assert_eq!(first.contract_address, again.contract_address);
    }

    #[tokio::test]
    async fn same_salt_twice_is_rejected_on_inclusion() {
        let node = LocalNode::new("SN_LOCAL");
        node.declare("Arbiter", &[]);
        node.add_deploy_transaction(&deploy_tx("Arbiter", 1)).await.unwrap();
        let dup = node.add_deploy_transaction(&deploy_tx("Arbiter", 1)).await.unwrap();
        assert!(matches!(
            node.transaction_status(&dup.transaction_hash).await.unwrap(),
            TxStatus::Rejected { .. }
        ));
        assert_eq!(node.submissions(), 2);
    }

    #[tokio::test]
    async fn stalled_transactions_wait_for_confirmation() {
        let node = LocalNode::new("SN_LOCAL");
        node.declare("Arbiter", &[]);
        node.stall_confirmations(true);
        let sub = node.add_deploy_transaction(&deploy_tx("Arbiter", 9)).await.unwrap();
        assert_eq!(
            node.transaction_status(&sub.transaction_hash).await.unwrap(),
            TxStatus::Received
        );
        assert!(!node.is_deployed(&sub.contract_address));

        node.confirm_pending();
        assert!(node.is_deployed(&sub.contract_address));
    }

    #[tokio::test]
    async fn undeclared_class_and_unknown_entrypoint() {
        let node = LocalNode::new("SN_LOCAL");
        let err = node
            .add_deploy_transaction(&deploy_tx("Missing", 1))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::Rejected(_)));

        let err = node
            .add_invoke_transaction(&InvokeTransaction {
                sender: Felt::from(1u64),
                contract_address: Felt::from(0xdeadu64),
                entrypoint: "Set_module_access".into(),
                calldata: vec![],
            })
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::EntrypointNotFound);
    }

    #[tokio::test]
    async fn transport_failures_do_not_reach_the_node() {
        let node = LocalNode::new("SN_LOCAL");
        node.declare("Arbiter", &[]);
        node.fail_transport(1);
        assert!(matches!(
            node.add_deploy_transaction(&deploy_tx("Arbiter", 1)).await,
            Err(ProviderError::Transport(_))
        ));
        assert_eq!(node.submissions(), 0);
        assert!(node.add_deploy_transaction(&deploy_tx("Arbiter", 1)).await.is_ok());
    }

    #[tokio::test]
    async fn lost_response_still_deploys_and_is_found_by_salt() {
        let node = LocalNode::new("SN_LOCAL");
        node.declare("Arbiter", &[]);
        node.lose_responses(1);
        assert!(matches!(
            node.add_deploy_transaction(&deploy_tx("Arbiter", 4)).await,
            Err(ProviderError::Transport(_))
        ));
        assert_eq!(node.submissions(), 1);

        let found = node
            .find_deployment(&Felt::from(1u64), &Felt::from(4u64))
            .await
            .unwrap()
            .unwrap();
        assert!(node.is_deployed(&found.contract_address));

        // The refused duplicate does not hide the included one.
        node.add_deploy_transaction(&deploy_tx("Arbiter", 4)).await.unwrap();
        let again = node
            .find_deployment(&Felt::from(1u64), &Felt::from(4u64))
            .await
            .unwrap();
        assert_eq!(again, Some(found));
        assert_eq!(
            node.find_deployment(&Felt::from(1u64), &Felt::from(5u64))
                .await
                .unwrap(),
            None
        );
    }
}
