//! Completion Controller: the top-level plan/execute/observe/critique/adapt
//! loop.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use taskloop_core::scheduler::{is_deadlocked, select_next};
use taskloop_core::{
    ActionResult, CritiqueResult, ErrorType, IterationResult, ObservationResult, Plan, Subtask,
    SubtaskStatus, Task, TaskCompletionResult, TerminationReason,
};
use taskloop_tools::ToolRegistry;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backend::ModelGateway;
use crate::config::LoopLimits;
use crate::executor::Executor;
use crate::observer::Observer;
use crate::{adapter, critic, planner};

/// Per-attempt artefacts gathered while an iteration runs, kept even when
/// a later step fails.
#[derive(Default)]
struct Attempt {
    action: Option<ActionResult>,
    observation: Option<ObservationResult>,
    critique: Option<CritiqueResult>,
}

/// Owns one task run: the gateway, the tool registry and the workspace the
/// tools act on.
pub struct CompletionController {
    gateway: Arc<dyn ModelGateway>,
    registry: ToolRegistry,
    workspace: PathBuf,
    limits: LoopLimits,
}

impl CompletionController {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        registry: ToolRegistry,
        workspace: &Path,
        limits: LoopLimits,
    ) -> Self {
        Self {
            gateway,
            registry,
            workspace: workspace.to_path_buf(),
            limits,
        }
    }

    pub fn limits(&self) -> &LoopLimits {
        &self.limits
    }

    /// Plan `description` and drive the plan until every subtask is
    /// resolved or a stop condition trips. Always returns a report; a
    /// planning failure is the only way to get one with no iterations.
    pub async fn complete_task(
        &self,
        description: &str,
        constraints: &[String],
    ) -> TaskCompletionResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let clock = Instant::now();
        let task = Task::new(description, constraints.to_vec());
        let tool_names = self.registry.names();

        info!(
            "run {run_id}: planning with {} ({}), {} tools available",
            self.gateway.name(),
            self.gateway.model_hint().unwrap_or("default model"),
            tool_names.len()
        );
        let mut plan = match planner::build(self.gateway.as_ref(), &task, &tool_names).await {
            Ok(plan) => plan,
            Err(e) => {
                error!("run {run_id}: planning failed: {e}");
                return TaskCompletionResult {
                    task_description: task.description,
                    constraints: task.constraints,
                    plan: None,
                    iterations: Vec::new(),
                    success: false,
                    error: Some(e.to_string()),
                    termination: TerminationReason::PlanningFailed,
                    started_at,
                    finished_at: Utc::now(),
                    total_iterations: 0,
                };
            }
        };
        for s in plan.subtasks() {
            info!(
                "  [{}] p{} {} {} (deps: {})",
                s.id,
                s.priority,
                s.complexity,
                s.description,
                if s.dependencies.is_empty() {
                    "-".to_string()
                } else {
                    s.dependencies.join(", ")
                }
            );
        }

        let mut iterations: Vec<IterationResult> = Vec::new();
        let termination = loop {
            if plan.all_resolved() {
                break TerminationReason::AllResolved;
            }
            if iterations.len() >= self.limits.max_iterations as usize {
                break TerminationReason::IterationLimit;
            }
            if clock.elapsed() >= self.limits.max_duration {
                break TerminationReason::TimeLimit;
            }
            if plan.count_status(SubtaskStatus::Failed) > self.limits.max_failed_subtasks {
                break TerminationReason::FailureLimit;
            }
            if is_deadlocked(&plan) {
                let blocked = plan.unresolved_ids();
                warn!("run {run_id}: nothing schedulable, blocked: {}", blocked.join(", "));
                break TerminationReason::Deadlock { blocked };
            }
            let Some(selected) = select_next(&plan).cloned() else {
                break TerminationReason::AllResolved;
            };

            let number = iterations.len() as u32 + 1;
            let window = iterations.len().saturating_sub(self.limits.history_window);
            let record = self
                .run_iteration(&mut plan, selected, number, &iterations[window..], &tool_names)
                .await;
            info!(
                "iteration {number}: {} {} | {}",
                record.subtask.id,
                if record.success { "succeeded" } else { "failed" },
                record.progress
            );
            iterations.push(record);
        };

        let success = plan.all_resolved();
        match termination {
            TerminationReason::AllResolved => info!("run {run_id}: all subtasks resolved"),
            ref other => warn!("run {run_id}: stopped: {other}"),
        }

        TaskCompletionResult {
            task_description: task.description,
            constraints: task.constraints,
            plan: Some(plan),
            total_iterations: iterations.len() as u32,
            iterations,
            success,
            error: None,
            termination,
            started_at,
            finished_at: Utc::now(),
        }
    }

    /// One loop turn for `selected`. Errors from any step are recorded on
    /// the result and count as a failed attempt.
    async fn run_iteration(
        &self,
        plan: &mut Plan,
        selected: Subtask,
        iteration: u32,
        history: &[IterationResult],
        tool_names: &[String],
    ) -> IterationResult {
        let started_at = Utc::now();
        let id = selected.id.clone();
        let mut attempt = Attempt::default();

        let outcome = self.attempt(plan, &id, history, &mut attempt).await;
        let error = match outcome {
            Ok(()) => None,
            Err(e) => {
                let message = format!("{e:#}");
                warn!("iteration {iteration} ({id}) raised: {message}");
                if let Some(subtask) = plan.get_mut(&id) {
                    if subtask.status == SubtaskStatus::InProgress {
                        if let Err(e) =
                            critic::settle(subtask, false, self.limits.max_subtask_attempts)
                        {
                            warn!("could not settle {id}: {e}");
                        }
                    }
                }
                Some(message)
            }
        };

        let mut adaptation = None;
        if let Some(failed) = plan.get(&id).filter(|s| s.status == SubtaskStatus::Failed).cloned() {
            let critique = attempt.critique.clone().unwrap_or_else(|| CritiqueResult {
                success: false,
                issues: Vec::new(),
                error_type: ErrorType::Environment,
                feedback: error.clone().unwrap_or_default(),
            });
            info!("subtask {id} exhausted {} attempt(s), adapting plan", failed.attempt_count);
            match adapter::adapt(self.gateway.as_ref(), plan, &failed, &critique, tool_names).await
            {
                Ok(record) => adaptation = Some(record),
                Err(e) => warn!("adaptation of {id} failed, it stays failed: {e}"),
            }
        }

        let success = error.is_none() && attempt.critique.as_ref().is_some_and(|c| c.success);
        IterationResult {
            iteration,
            progress: plan.progress().to_string(),
            subtask: plan.get(&id).cloned().unwrap_or(selected),
            action: attempt.action,
            observation: attempt.observation,
            critique: attempt.critique,
            adaptation,
            success,
            error,
            started_at,
            finished_at: Utc::now(),
        }
    }

    async fn attempt(
        &self,
        plan: &mut Plan,
        id: &str,
        history: &[IterationResult],
        attempt: &mut Attempt,
    ) -> Result<()> {
        let subtask = plan
            .get_mut(id)
            .ok_or_else(|| anyhow!("scheduled subtask {id} is not in the plan"))?;
        subtask.begin_attempt()?;
        let snapshot = subtask.clone();
        info!(
            "subtask {id}: attempt {}/{}: {}",
            snapshot.attempt_count, self.limits.max_subtask_attempts, snapshot.description
        );

        let action = Executor::new(self.gateway.as_ref(), &self.registry)
            .with_max_rounds(self.limits.max_tool_rounds)
            .execute(&snapshot, history)
            .await;
        attempt.action = Some(action.clone());

        let observation = Observer::new(&self.registry, &self.workspace)
            .observe(&action)
            .await
            .context("observation failed")?;
        attempt.observation = Some(observation.clone());

        let subtask = plan
            .get_mut(id)
            .ok_or_else(|| anyhow!("subtask {id} vanished during its attempt"))?;
        let critique = critic::critique(&observation, subtask, self.limits.max_subtask_attempts)?;
        info!("subtask {id}: {} -> {}", critique.feedback, subtask.status);
        attempt.critique = Some(critique);
        Ok(())
    }
}
