use super::Session;
use crate::{
    context::NetworkContext,
    felt::Felt,
    orchestrator::{PlanReport, StepOutcome},
};
use anyhow::Result;
use deployer_tracing::{
    println_action_green, println_action_red, println_error_kind, println_warning,
};

pub async fn step(session: &Session, name: &str, redeploy: bool) -> Result<()> {
    let plan = session.plan()?;
    let mut step = plan.step(name)?.clone();
    if redeploy {
        step = step.with_redeploy(true);
    }
    let ctx = session.connect().await?;
    print_network(&ctx);
    let outcome = session.orchestrator().run_step(&step, &ctx).await?;
    print_outcome(session, name, &outcome);
    Ok(())
}

pub async fn run(session: &Session, redeploy: bool) -> Result<()> {
    let mut plan = session.plan()?;
    if redeploy {
        plan = plan.with_redeploy();
    }
    let ctx = session.connect().await?;
    print_network(&ctx);
    let report = session.orchestrator().run_plan(&plan, &ctx).await?;
    finish(session, report)
}

fn finish(session: &Session, report: PlanReport) -> Result<()> {
    for (name, outcome) in &report.completed {
        print_outcome(session, name, outcome);
    }
    for name in &report.not_run {
        println_warning(&format!("step `{name}` was not run"));
    }
    let mut failed = report.failed.into_iter();
    match failed.next() {
        None => Ok(()),
        Some(first) => {
            // The first failure is returned, the others are only printed.
            for other in failed {
                println_error_kind(&other.kind().to_string(), &other.to_string());
            }
            Err(first.into())
        }
    }
}

fn print_network(ctx: &NetworkContext) {
    println_action_green("Network", &format!("{} {}", ctx.network(), ctx.rpc_url()));
}

fn print_outcome(session: &Session, name: &str, outcome: &StepOutcome) {
    let located = |address: &Felt| match session.explorer_link(address) {
        Some(link) => format!("{name} at {address} ({link})"),
        None => format!("{name} at {address}"),
    };
    match outcome {
        StepOutcome::Recorded(record) => {
            println_action_green("Deployed", &located(&record.address));
        }
        StepOutcome::Reconciled(record) => {
            println_action_green("Reconciled", &located(&record.address));
        }
        StepOutcome::AlreadyRecorded(record) => {
            println_action_red(
                "Skipped",
                &format!("{}, already recorded", located(&record.address)),
            );
        }
        StepOutcome::Executed(receipt) => println_action_green(
            "Executed",
            &format!(
                "{name} in block {} (transaction {})",
                receipt.block_number, receipt.transaction_hash
            ),
        ),
    }
}
