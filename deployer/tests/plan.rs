use deployer::{
    orchestrator::{Arg, Plan, StepOutcome},
    provider::LocalNode,
    AccountProvider, ErrorKind, Felt, NetworkContext, Orchestrator, Registry, Step,
};
use pretty_assertions::assert_eq;
use std::{sync::Arc, time::Duration};

const NETWORK: &str = "goerli";

fn setup(dir: &tempfile::TempDir, timeout: Duration) -> (Arc<LocalNode>, NetworkContext, Orchestrator) {
    let node = Arc::new(LocalNode::new("SN_GOERLI"));
    for contract in ["Arbiter", "ModuleController", "Lords", "Realms"] {
        node.declare(contract, &["set_address_of_controller"]);
    }
    let ctx = NetworkContext::with_provider(NETWORK, node.clone())
        .with_poll_interval(Duration::from_millis(1))
        .with_timeout(timeout);
    let orchestrator = Orchestrator::new(
        Registry::open(dir.path()),
        AccountProvider::default().with_account(NETWORK, Felt::from(0x0123u64)),
    );
    (node, ctx, orchestrator)
}

fn dep(name: &str) -> Arg {
    Arg::Dependency(name.into())
}

fn realms_plan() -> Plan {
    Plan::new(vec![
        Step::deploy("Arbiter", vec![Arg::Owner]),
        Step::deploy("Lords", vec![Arg::Literal("'Lords'".into())]),
        Step::deploy("ModuleController", vec![dep("Arbiter"), dep("Lords")]),
        Step::invoke(
            "Arbiter_set_controller",
            "Arbiter",
            "set_address_of_controller",
            vec![dep("ModuleController")],
        ),
    ])
    .unwrap()
}

#[tokio::test]
async fn plan_runs_to_completion_and_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let (node, ctx, orchestrator) = setup(&dir, Duration::from_secs(1));

    let report = orchestrator.run_plan(&realms_plan(), &ctx).await.unwrap();
    assert!(report.is_success());
    assert!(report.not_run.is_empty());
    assert_eq!(report.completed.len(), 4);
    assert_eq!(node.deployments().len(), 3);

    let controller = orchestrator
        .registry()
        .resolve(NETWORK, "ModuleController")
        .unwrap();
    assert_eq!(node.invocations()[0].calldata, vec![controller]);

    // Deploys are skipped on a second run, the invocation is sent again.
    let report = orchestrator.run_plan(&realms_plan(), &ctx).await.unwrap();
    let skipped = report
        .completed
        .iter()
        .filter(|(_, outcome)| matches!(outcome, StepOutcome::AlreadyRecorded(_)))
        .count();
    assert_eq!(skipped, 3);
    assert_eq!(node.deployments().len(), 3);
    assert_eq!(node.invocations().len(), 2);
}

#[tokio::test]
async fn failed_wave_stops_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let (node, ctx, orchestrator) = setup(&dir, Duration::from_secs(1));
    let plan = Plan::new(vec![
        Step::deploy("Arbiter", vec![Arg::Owner]),
        Step::deploy("ModuleController", vec![dep("Arbiter")]),
    ])
    .unwrap();

    node.reject_next("class hash is not declared");
    let report = orchestrator.run_plan(&plan, &ctx).await.unwrap();
    assert!(!report.is_success());
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].kind(), ErrorKind::DeploymentRejected);
    assert_eq!(report.failed[0].step, "Arbiter");
    assert_eq!(report.not_run, vec!["ModuleController".to_string()]);
    assert_eq!(node.submissions(), 1);
}

#[tokio::test]
async fn independent_steps_run_concurrently() {
    let dir = tempfile::tempdir().unwrap();
    let (node, ctx, orchestrator) = setup(&dir, Duration::from_secs(5));
    let plan = Plan::new(vec![
        Step::deploy("Arbiter", vec![Arg::Owner]),
        Step::deploy("Lords", vec![]),
        Step::deploy("Realms", vec![]),
    ])
    .unwrap();

    // Nothing confirms until all three are in flight, which a sequential run never reaches.
    node.stall_confirmations(true);
    let confirmer = {
        let node = node.clone();
        tokio::spawn(async move {
            while node.submissions() < 3 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
            node.confirm_pending();
        })
    };

    let report = orchestrator.run_plan(&plan, &ctx).await.unwrap();
    confirmer.await.unwrap();
    assert!(report.is_success(), "{:?}", report.failed);
    assert_eq!(orchestrator.registry().list(NETWORK).unwrap().len(), 3);
}
