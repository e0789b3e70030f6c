//! Runs deployment steps against one network.
//!
//! Each step is a small state machine:
//!
//! ```text
//! Pending -> ResolvingDependencies -> Submitting -> Confirming -> Recorded
//!                                \____________\______________\--> Failed
//! ```
//!
//! Dependencies and calldata are fully resolved before anything is sent, so a missing
//! dependency or a literal that does not fit never costs a transaction.

pub mod plan;

pub use plan::{Plan, PlanError, PlanReport};

use crate::{
    account::{AccountProvider, AccountRef},
    calldata::{self, CalldataField},
    client::{
        deploy::random_salt, CallSpec, DeploymentClient, DeploymentReceipt, ExecutionClient,
        Submitted,
    },
    context::NetworkContext,
    error::{DeployError, Result, StepError},
    felt::Felt,
    provider::{ContractRef, DeploySubmission, TxStatus},
    registry::{DeploymentMetadata, DeploymentRecord, PendingDeployment, Registry},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::{fmt, future::Future, io, str::FromStr};

const DEPENDENCY_PREFIX: char = '@';
const OWNER_ARG: &str = "$owner";

/// A constructor or entrypoint argument as written in a step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Arg {
    /// `@Name`: the address recorded for another logical contract.
    Dependency(String),
    /// `$owner`: the owner account of the network.
    Owner,
    /// Anything else, encoded as calldata.
    Literal(String),
}

impl FromStr for Arg {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(name) = s.strip_prefix(DEPENDENCY_PREFIX) {
            if name.is_empty() {
                return Err("`@` must be followed by a logical contract name".to_string());
            }
            return Ok(Arg::Dependency(name.to_string()));
        }
        if s == OWNER_ARG {
            return Ok(Arg::Owner);
        }
        if s.starts_with('$') {
            return Err(format!("unknown variable `{s}`, the only one is `{OWNER_ARG}`"));
        }
        Ok(Arg::Literal(s.to_string()))
    }
}

impl TryFrom<String> for Arg {
    type Error = String;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Arg> for String {
    fn from(arg: Arg) -> Self {
        arg.to_string()
    }
}

impl fmt::Display for Arg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Arg::Dependency(name) => write!(f, "{DEPENDENCY_PREFIX}{name}"),
            Arg::Owner => write!(f, "{OWNER_ARG}"),
            Arg::Literal(literal) => write!(f, "{literal}"),
        }
    }
}

/// One unit of deployment work, named after the logical contract it deploys or labelled for
/// invocations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    #[serde(flatten)]
    pub action: StepAction,
    /// Steps of the same plan that must be recorded first, on top of those named by arguments.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StepAction {
    Deploy {
        /// Defaults to the step name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        contract: Option<ContractRef>,
        #[serde(default)]
        args: Vec<Arg>,
        /// Deploy again even if the name is already recorded.
        #[serde(default)]
        redeploy: bool,
    },
    Invoke {
        /// Logical name of the contract to call.
        target: String,
        entrypoint: String,
        #[serde(default)]
        args: Vec<Arg>,
    },
}

impl Step {
    pub fn deploy(name: &str, args: Vec<Arg>) -> Self {
        Self {
            name: name.to_string(),
            action: StepAction::Deploy {
                contract: None,
                args,
                redeploy: false,
            },
            after: vec![],
        }
    }

    pub fn invoke(name: &str, target: &str, entrypoint: &str, args: Vec<Arg>) -> Self {
        Self {
            name: name.to_string(),
            action: StepAction::Invoke {
                target: target.to_string(),
                entrypoint: entrypoint.to_string(),
                args,
            },
            after: vec![],
        }
    }

    pub fn with_contract(mut self, contract: &str) -> Self {
        if let StepAction::Deploy {
            contract: ref mut c,
            ..
        } = self.action
        {
            *c = Some(ContractRef::from(contract));
        }
        self
    }

    /// Has no effect on invocations.
    pub fn with_redeploy(mut self, redeploy: bool) -> Self {
        if let StepAction::Deploy {
            redeploy: ref mut r,
            ..
        } = self.action
        {
            *r = redeploy;
        }
        self
    }

    pub fn with_after(mut self, after: &[&str]) -> Self {
        self.after = after.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn args(&self) -> &[Arg] {
        match &self.action {
            StepAction::Deploy { args, .. } | StepAction::Invoke { args, .. } => args,
        }
    }

    /// Names this step needs recorded before it can run.
    pub fn dependencies(&self) -> impl Iterator<Item = &str> {
        let target = match &self.action {
            StepAction::Invoke { target, .. } => Some(target.as_str()),
            StepAction::Deploy { .. } => None,
        };
        self.args()
            .iter()
            .filter_map(|arg| match arg {
                Arg::Dependency(name) => Some(name.as_str()),
                _ => None,
            })
            .chain(target)
            .chain(self.after.iter().map(String::as_str))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepState {
    Pending,
    ResolvingDependencies,
    Submitting,
    Confirming,
    Recorded,
    Failed,
}

impl fmt::Display for StepState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepState::Pending => "pending",
            StepState::ResolvingDependencies => "resolving-dependencies",
            StepState::Submitting => "submitting",
            StepState::Confirming => "confirming",
            StepState::Recorded => "recorded",
            StepState::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Deployed and recorded during this run.
    Recorded(DeploymentRecord),
    /// A submission from an earlier run turned out to be accepted and was recorded.
    Reconciled(DeploymentRecord),
    /// Already recorded, nothing was sent.
    AlreadyRecorded(DeploymentRecord),
    /// The invocation was included.
    Executed(DeploymentReceipt),
}

impl StepOutcome {
    pub fn address(&self) -> Option<Felt> {
        match self {
            StepOutcome::Recorded(record)
            | StepOutcome::Reconciled(record)
            | StepOutcome::AlreadyRecorded(record) => Some(record.address),
            StepOutcome::Executed(_) => None,
        }
    }

    pub fn transaction_hash(&self) -> Felt {
        match self {
            StepOutcome::Recorded(record)
            | StepOutcome::Reconciled(record)
            | StepOutcome::AlreadyRecorded(record) => record.metadata.transaction_hash,
            StepOutcome::Executed(receipt) => receipt.transaction_hash,
        }
    }
}

/// Per-run bookkeeping of one step.
struct StepRun<'a> {
    step: &'a str,
    network: &'a str,
    state: StepState,
    calldata: Vec<String>,
}

impl<'a> StepRun<'a> {
    fn new(step: &'a Step, ctx: &'a NetworkContext) -> Self {
        Self {
            step: &step.name,
            network: ctx.network(),
            state: StepState::Pending,
            calldata: step.args().iter().map(ToString::to_string).collect(),
        }
    }

    fn transition(&mut self, next: StepState) {
        tracing::debug!(
            step = self.step,
            network = self.network,
            from = %self.state,
            to = %next,
            "step transition"
        );
        self.state = next;
    }

    fn into_error(self, source: DeployError) -> StepError {
        StepError {
            step: self.step.to_string(),
            network: self.network.to_string(),
            calldata: self.calldata,
            source,
        }
    }
}

/// Mediates between the registry, the owner accounts and the clients.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    registry: Registry,
    accounts: AccountProvider,
}

impl Orchestrator {
    pub fn new(registry: Registry, accounts: AccountProvider) -> Self {
        Self { registry, accounts }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn accounts(&self) -> &AccountProvider {
        &self.accounts
    }

    pub async fn run_step(
        &self,
        step: &Step,
        ctx: &NetworkContext,
    ) -> std::result::Result<StepOutcome, StepError> {
        let mut run = StepRun::new(step, ctx);
        let result = match &step.action {
            StepAction::Deploy {
                contract,
                args,
                redeploy,
            } => {
                let contract = contract
                    .clone()
                    .unwrap_or_else(|| ContractRef(step.name.clone()));
                self.deploy(&mut run, &contract, args, *redeploy, ctx).await
            }
            StepAction::Invoke {
                target,
                entrypoint,
                args,
            } => self.invoke(&mut run, target, entrypoint, args, ctx).await,
        };
        match result {
            Ok(outcome) => {
                run.transition(StepState::Recorded);
                Ok(outcome)
            }
            Err(source) => {
                run.transition(StepState::Failed);
                tracing::debug!(step = %step.name, network = ctx.network(), "step failed: {source}");
                Err(run.into_error(source))
            }
        }
    }

    async fn deploy(
        &self,
        run: &mut StepRun<'_>,
        contract: &ContractRef,
        args: &[Arg],
        redeploy: bool,
        ctx: &NetworkContext,
    ) -> Result<StepOutcome> {
        let (network, name) = (run.network, run.step);
        if !redeploy {
            if let Some(record) = self.registry.get(network, name)? {
                tracing::info!(step = name, network, address = %record.address, "already recorded");
                return Ok(StepOutcome::AlreadyRecorded(record));
            }
        }

        run.transition(StepState::ResolvingDependencies);
        let owner = self.accounts.owner_account(network)?;
        let calldata = self.resolve_args(run, args, &owner)?;
        let client = DeploymentClient::new(owner.address);

        let salt = match self.reconcile_pending(name, contract, &calldata, &client, ctx).await? {
            Reconciliation::Recorded(record) => return Ok(StepOutcome::Reconciled(record)),
            Reconciliation::Submit { salt } => salt,
        };

        run.transition(StepState::Submitting);
        let mut pending = PendingDeployment {
            transaction_hash: None,
            address: None,
            sender: client.sender(),
            salt,
            contract: contract.clone(),
            constructor_calldata: calldata.clone(),
            submitted_at: Utc::now(),
        };
        self.registry.mark_pending(network, name, &pending)?;
        let submission = self
            .submit_deployment(name, &client, contract, calldata, salt, ctx)
            .await;
        let mut submitted = match submission {
            Ok(submitted) => submitted,
            // The outcome is unknown, the journaled salt finds it on the next run.
            Err(e @ DeployError::Transport(_)) => return Err(e),
            Err(e) => {
                self.registry.clear_pending(network, name)?;
                return Err(e);
            }
        };
        pending.transaction_hash = Some(submitted.transaction_hash);
        pending.address = Some(submitted.address);
        self.registry.mark_pending(network, name, &pending)?;

        run.transition(StepState::Confirming);
        let mut confirmed = client.confirm(contract, &submitted, ctx).await;
        if matches!(confirmed, Err(DeployError::DeploymentRejected { .. })) {
            // Refused as a duplicate when another creation with this salt was included first.
            if let Some(other) = find_submission(&client, salt, ctx).await {
                if other.transaction_hash != submitted.transaction_hash {
                    tracing::info!(
                        step = name,
                        network,
                        tx_hash = %other.transaction_hash,
                        "another submission with the same salt reached the network"
                    );
                    submitted = Submitted {
                        transaction_hash: other.transaction_hash,
                        address: other.contract_address,
                        ..submitted
                    };
                    confirmed = client.confirm(contract, &submitted, ctx).await;
                }
            }
        }
        let receipt = match confirmed {
            Ok(receipt) => receipt,
            Err(e @ DeployError::DeploymentRejected { .. }) => {
                self.registry.clear_pending(network, name)?;
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        let record = self
            .record_deployment(
                network,
                name,
                submitted.address,
                DeploymentMetadata {
                    contract: contract.clone(),
                    constructor_calldata: submitted.calldata,
                    transaction_hash: receipt.transaction_hash,
                    block_number: Some(receipt.block_number),
                    salt: Some(submitted.salt),
                    deployed_at: Utc::now(),
                },
            )
            .await?;
        tracing::info!(step = name, network, address = %record.address, "recorded");
        Ok(StepOutcome::Recorded(record))
    }

    /// Sends the creation transaction, retrying transport failures at most `ctx.retries()` times.
    ///
    /// Every attempt uses the same salt. Before an attempt is repeated, and when the network
    /// refuses one, the network is asked whether an earlier attempt with that salt got through.
    async fn submit_deployment(
        &self,
        name: &str,
        client: &DeploymentClient,
        contract: &ContractRef,
        calldata: Vec<Felt>,
        salt: Felt,
        ctx: &NetworkContext,
    ) -> Result<Submitted> {
        let fields = calldata
            .iter()
            .copied()
            .map(CalldataField::from)
            .collect::<Vec<_>>();
        let found = |other: DeploySubmission| Submitted {
            transaction_hash: other.transaction_hash,
            address: other.contract_address,
            salt,
            calldata: calldata.clone(),
        };
        let mut attempt = 0;
        loop {
            match client.submit(contract, &fields, Some(salt), ctx).await {
                Err(DeployError::Transport(msg)) if attempt < ctx.retries() => {
                    attempt += 1;
                    tracing::warn!(
                        step = name,
                        network = ctx.network(),
                        attempt,
                        "submission failed in transport: {msg}"
                    );
                    tokio::time::sleep(ctx.poll_interval()).await;
                    if let Some(other) = find_submission(client, salt, ctx).await {
                        tracing::info!(
                            step = name,
                            network = ctx.network(),
                            tx_hash = %other.transaction_hash,
                            "the failed attempt reached the network"
                        );
                        return Ok(found(other));
                    }
                }
                Err(e @ DeployError::DeploymentRejected { .. }) => {
                    return match find_submission(client, salt, ctx).await {
                        Some(other) => Ok(found(other)),
                        None => Err(e),
                    };
                }
                result => return result,
            }
        }
    }

    /// Records the deployment and drops its journal entry.
    ///
    /// Runs on the blocking pool: a contended key makes the registry back off with sleeps.
    async fn record_deployment(
        &self,
        network: &str,
        name: &str,
        address: Felt,
        metadata: DeploymentMetadata,
    ) -> Result<DeploymentRecord> {
        let registry = self.registry.clone();
        let (network, name) = (network.to_string(), name.to_string());
        tokio::task::spawn_blocking(move || -> Result<DeploymentRecord> {
            let record = registry.record(&network, &name, address, metadata)?;
            registry.clear_pending(&network, &name)?;
            Ok(record)
        })
        .await
        .map_err(|e| DeployError::Io(io::Error::other(e)))?
    }

    async fn invoke(
        &self,
        run: &mut StepRun<'_>,
        target: &str,
        entrypoint: &str,
        args: &[Arg],
        ctx: &NetworkContext,
    ) -> Result<StepOutcome> {
        let (network, name) = (run.network, run.step);
        run.transition(StepState::ResolvingDependencies);
        let owner = self.accounts.owner_account(network)?;
        let target_address = self.registry.resolve(network, target)?;
        let calldata = self.resolve_args(run, args, &owner)?;

        run.transition(StepState::Submitting);
        let call = CallSpec::new(
            target_address,
            entrypoint,
            calldata.into_iter().map(CalldataField::from).collect(),
        );
        let client = ExecutionClient::new(owner.address);
        let tx_hash = retry_transport(name, ctx, || client.submit(&call, ctx)).await?;

        run.transition(StepState::Confirming);
        let receipt = client.confirm(&call, &tx_hash, ctx).await?;
        tracing::info!(step = name, network, tx_hash = %receipt.transaction_hash, "executed");
        Ok(StepOutcome::Executed(receipt))
    }

    /// Turns every argument into a felt, keeping the operator-facing snapshot up to date.
    fn resolve_args(
        &self,
        run: &mut StepRun<'_>,
        args: &[Arg],
        owner: &AccountRef,
    ) -> Result<Vec<Felt>> {
        let mut felts = Vec::with_capacity(args.len());
        for (i, arg) in args.iter().enumerate() {
            let felt = match arg {
                Arg::Dependency(name) => self.registry.resolve(run.network, name)?,
                Arg::Owner => owner.address,
                Arg::Literal(literal) => calldata::encode_literal(literal)?,
            };
            run.calldata[i] = felt.to_string();
            felts.push(felt);
        }
        Ok(felts)
    }

    /// Checks a submission left behind by an earlier run before sending a new one.
    ///
    /// An included one is recorded. Otherwise its salt is reused when the call is unchanged, so
    /// that the new submission cannot create a second instance.
    async fn reconcile_pending(
        &self,
        name: &str,
        contract: &ContractRef,
        calldata: &[Felt],
        client: &DeploymentClient,
        ctx: &NetworkContext,
    ) -> Result<Reconciliation> {
        let network = ctx.network();
        let Some(pending) = self.registry.pending(network, name)? else {
            return Ok(Reconciliation::Submit {
                salt: random_salt(),
            });
        };
        let same_call = pending.sender == client.sender()
            && pending.contract == *contract
            && pending.constructor_calldata == calldata;
        let resubmit = || Reconciliation::Submit {
            salt: if same_call {
                pending.salt
            } else {
                random_salt()
            },
        };

        let submission = match ctx
            .provider()
            .find_deployment(&pending.sender, &pending.salt)
            .await
        {
            Ok(found) => found,
            Err(e) => {
                tracing::debug!(step = name, network, "could not look up earlier submission: {e}");
                pending
                    .transaction_hash
                    .zip(pending.address)
                    .map(|(transaction_hash, contract_address)| DeploySubmission {
                        transaction_hash,
                        contract_address,
                    })
            }
        };
        let Some(submission) = submission else {
            tracing::info!(step = name, network, salt = %pending.salt, "earlier submission never reached the network");
            return Ok(resubmit());
        };

        let tx_hash = submission.transaction_hash;
        match ctx.provider().transaction_status(&tx_hash).await {
            Ok(TxStatus::Accepted { block_number }) => {
                if !same_call {
                    tracing::warn!(
                        step = name,
                        network,
                        %tx_hash,
                        "recording an earlier submission whose constructor arguments differ from the current ones"
                    );
                }
                tracing::info!(step = name, network, %tx_hash, address = %submission.contract_address, "earlier submission was accepted");
                let record = self
                    .record_deployment(
                        network,
                        name,
                        submission.contract_address,
                        DeploymentMetadata {
                            contract: pending.contract.clone(),
                            constructor_calldata: pending.constructor_calldata.clone(),
                            transaction_hash: tx_hash,
                            block_number: Some(block_number),
                            salt: Some(pending.salt),
                            deployed_at: Utc::now(),
                        },
                    )
                    .await?;
                Ok(Reconciliation::Recorded(record))
            }
            Ok(TxStatus::Rejected { reason } | TxStatus::Reverted { reason }) => {
                tracing::info!(step = name, network, %tx_hash, "earlier submission failed: {reason}");
                self.registry.clear_pending(network, name)?;
                Ok(resubmit())
            }
            status => {
                let status = match status {
                    Ok(status) => format!("{status:?}"),
                    Err(e) => e.to_string(),
                };
                if same_call {
                    tracing::warn!(
                        step = name,
                        network,
                        %tx_hash,
                        %status,
                        "earlier submission is unconfirmed, submitting again with the same salt"
                    );
                } else {
                    tracing::warn!(
                        step = name,
                        network,
                        %tx_hash,
                        %status,
                        "earlier submission is unconfirmed and the call changed, submitting again may deploy a duplicate"
                    );
                }
                Ok(resubmit())
            }
        }
    }
}

enum Reconciliation {
    Recorded(DeploymentRecord),
    Submit { salt: Felt },
}

/// The creation transaction sent from the client's account with `salt`, if the network knows it.
async fn find_submission(
    client: &DeploymentClient,
    salt: Felt,
    ctx: &NetworkContext,
) -> Option<DeploySubmission> {
    match ctx.provider().find_deployment(&client.sender(), &salt).await {
        Ok(found) => found,
        Err(e) => {
            tracing::debug!(network = ctx.network(), %salt, "could not look up submission: {e}");
            None
        }
    }
}

/// Sends again while the submission fails in transport, at most `ctx.retries()` times.
async fn retry_transport<T, F, Fut>(step: &str, ctx: &NetworkContext, mut submit: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        match submit().await {
            Err(DeployError::Transport(msg)) if attempt < ctx.retries() => {
                attempt += 1;
                tracing::warn!(
                    step,
                    network = ctx.network(),
                    attempt,
                    "submission failed in transport, retrying: {msg}"
                );
                tokio::time::sleep(ctx.poll_interval()).await;
            }
            result => return result,
        }
    }
}
