//! Running a whole plan of steps in dependency order.

use super::{Orchestrator, Step, StepAction, StepOutcome};
use crate::{context::NetworkContext, error::StepError};
use futures::future::join_all;
use petgraph::{graph::DiGraph, Direction};
use std::collections::{HashMap, HashSet};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("step `{0}` appears more than once in the plan")]
    DuplicateStep(String),
    #[error("step `{step}` runs after `{after}`, which is not a step of the plan")]
    UnknownAfter { step: String, after: String },
    #[error("dependency cycle detected involving step `{0}`")]
    Cycle(String),
    #[error("no step named `{0}` in the plan")]
    UnknownStep(String),
}

/// The `[[step]]` entries of a manifest, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Plan {
    steps: Vec<Step>,
}

/// What happened to every step of a plan run.
#[derive(Debug, Default)]
pub struct PlanReport {
    pub completed: Vec<(String, StepOutcome)>,
    pub failed: Vec<StepError>,
    /// Steps skipped because an earlier wave failed.
    pub not_run: Vec<String>,
}

impl PlanReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

impl Plan {
    /// Validates step names and the shape of the dependency graph.
    pub fn new(steps: Vec<Step>) -> Result<Self, PlanError> {
        let plan = Self { steps };
        let mut seen = HashSet::new();
        for step in &plan.steps {
            if !seen.insert(step.name.as_str()) {
                return Err(PlanError::DuplicateStep(step.name.clone()));
            }
        }
        for step in &plan.steps {
            if let Some(after) = step.after.iter().find(|a| !seen.contains(a.as_str())) {
                return Err(PlanError::UnknownAfter {
                    step: step.name.clone(),
                    after: after.clone(),
                });
            }
        }
        plan.waves()?;
        Ok(plan)
    }

    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn step(&self, name: &str) -> Result<&Step, PlanError> {
        self.steps
            .iter()
            .find(|step| step.name == name)
            .ok_or_else(|| PlanError::UnknownStep(name.to_string()))
    }

    /// Forces every deploy step to deploy again.
    pub fn with_redeploy(mut self) -> Self {
        self.steps = self
            .steps
            .into_iter()
            .map(|step| match step.action {
                StepAction::Deploy { .. } => step.with_redeploy(true),
                StepAction::Invoke { .. } => step,
            })
            .collect();
        self
    }

    /// Groups the steps so that every step only depends on steps of earlier groups.
    ///
    /// A step lands in the group matching the length of its longest dependency chain within the
    /// plan. Dependencies on names outside of the plan must already be recorded and do not
    /// constrain the order.
    pub fn waves(&self) -> Result<Vec<Vec<&Step>>, PlanError> {
        let index = self
            .steps
            .iter()
            .enumerate()
            .map(|(i, step)| (step.name.as_str(), i))
            .collect::<HashMap<_, _>>();
        let mut graph = DiGraph::<usize, ()>::new();
        let nodes = (0..self.steps.len())
            .map(|i| graph.add_node(i))
            .collect::<Vec<_>>();
        for (i, step) in self.steps.iter().enumerate() {
            for dep in step.dependencies() {
                match index.get(dep) {
                    Some(&j) if j == i => return Err(PlanError::Cycle(step.name.clone())),
                    Some(&j) => {
                        graph.update_edge(nodes[j], nodes[i], ());
                    }
                    None => {}
                }
            }
        }

        let order = petgraph::algo::toposort(&graph, None)
            .map_err(|cycle| PlanError::Cycle(self.steps[graph[cycle.node_id()]].name.clone()))?;
        let mut depth = vec![0usize; self.steps.len()];
        for node in order {
            depth[graph[node]] = graph
                .neighbors_directed(node, Direction::Incoming)
                .map(|dep| depth[graph[dep]] + 1)
                .max()
                .unwrap_or(0);
        }

        let mut waves = vec![vec![]; depth.iter().max().map_or(0, |d| d + 1)];
        for (i, step) in self.steps.iter().enumerate() {
            waves[depth[i]].push(step);
        }
        Ok(waves)
    }
}

impl Orchestrator {
    /// Runs the plan wave by wave. Steps of one wave run concurrently, and a wave with a failed
    /// step is the last one to run.
    pub async fn run_plan(
        &self,
        plan: &Plan,
        ctx: &NetworkContext,
    ) -> Result<PlanReport, PlanError> {
        let mut report = PlanReport::default();
        let mut waves = plan.waves()?.into_iter();
        for wave in waves.by_ref() {
            tracing::debug!(
                network = ctx.network(),
                steps = ?wave.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
                "running wave"
            );
            let results = join_all(wave.iter().map(|step| self.run_step(step, ctx))).await;
            for (step, result) in wave.iter().zip(results) {
                match result {
                    Ok(outcome) => report.completed.push((step.name.clone(), outcome)),
                    Err(e) => report.failed.push(e),
                }
            }
            if !report.is_success() {
                break;
            }
        }
        report.not_run = waves.flatten().map(|step| step.name.clone()).collect();
        Ok(report)
    }
}
