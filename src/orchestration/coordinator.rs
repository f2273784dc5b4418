//! # Job Coordinator
//!
//! The surface the Job Controller drives: start jobs, resume automated
//! progress, apply operator overrides and resets, read status.
//!
//! A resume round plans under the job lock (discover the readiness frontier,
//! mark it in progress), releases the lock while the Action Executor calls
//! run concurrently, then re-acquires it to apply results and run the status
//! cascade. Writes to one job are serialized by its lock; cross-job
//! concurrency is unbounded. Cancellation takes effect between rounds:
//! in-flight actions finish and their results are recorded, but no new round
//! starts.

use chrono::Utc;
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, instrument, warn};

use crate::config::OnboardConfig;
use crate::events::{names, EventPublisher};
use crate::models::core::ids::{JobId, SubStepId};
use crate::models::core::job::Job;
use crate::models::core::step::StepBody;
use crate::models::template::JobTemplate;
use crate::orchestration::cascade::{recalculate_job, CascadeReport};
use crate::orchestration::errors::{OrchestrationError, OrchestrationResult};
use crate::orchestration::executor::ActionExecutor;
use crate::orchestration::reset::{self, ResetPlan, ResetReport};
use crate::orchestration::resume_planner::next_eligible;
use crate::orchestration::retry_executor::{
    RetryError, RetryExecutor, RetryPolicy, RetrySuccess,
};
use crate::models::core::workflow::SubStepWorkflow;
use crate::registry::{JobHandle, JobRegistry};
use crate::state_machine::events::SubStepEvent;
use crate::state_machine::guards;
use crate::state_machine::states::{JobStatus, StepStatus, SubStepStatus};

/// Apply a sub-step event to the workflow tree.
///
/// This is the single write path for sub-step status: both automated result
/// application and operator overrides are expressed as events first.
fn apply_sub_step_event(workflow: &mut SubStepWorkflow, id: &SubStepId, event: SubStepEvent) {
    let now = Utc::now();
    match event {
        SubStepEvent::Start => {
            if let Some(sub) = workflow.sub_step_mut(id) {
                sub.status = SubStepStatus::InProgress;
                sub.started_at.get_or_insert(now);
            }
        }
        SubStepEvent::Complete(payload) => {
            if let Some(sub) = workflow.sub_step_mut(id) {
                sub.status = SubStepStatus::Completed;
                sub.error = None;
                sub.finished_at = Some(now);
            }
            if let Some(payload) = payload {
                workflow.merge_result(id, payload);
            }
        }
        SubStepEvent::Fail(message) => {
            if let Some(sub) = workflow.sub_step_mut(id) {
                sub.status = SubStepStatus::Failed;
                sub.error = Some(message);
                sub.last_failure_at = Some(now);
                sub.finished_at = Some(now);
            }
        }
        SubStepEvent::Retry(message) => {
            if let Some(sub) = workflow.sub_step_mut(id) {
                sub.status = SubStepStatus::Retrying;
                sub.error = Some(message);
                sub.last_failure_at = Some(now);
            }
        }
        SubStepEvent::Skip => {
            if let Some(sub) = workflow.sub_step_mut(id) {
                sub.status = SubStepStatus::Skipped;
                sub.finished_at = Some(now);
            }
        }
        SubStepEvent::Reset => {
            workflow.withdraw_context(id);
            if let Some(sub) = workflow.sub_step_mut(id) {
                sub.reset();
            }
        }
    }
}

/// Why a round performed no work
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundHalt {
    /// The job is in a terminal status
    Terminal,
    /// Automated progress requires operator attention first
    NeedsOperator,
    /// No sub-step is currently eligible
    NoEligibleWork,
}

/// Outcome of a single execution round
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoundReport {
    pub executed: Vec<SubStepId>,
    pub completed: Vec<SubStepId>,
    pub failed: Vec<SubStepId>,
    /// Exhausted-transient outcomes: left retrying, service unavailable
    pub unavailable: Vec<SubStepId>,
    pub halt: Option<RoundHalt>,
}

impl RoundReport {
    fn halted(halt: RoundHalt) -> Self {
        Self {
            halt: Some(halt),
            ..Self::default()
        }
    }
}

/// How a resume loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResumeOutcome {
    /// Every step finished
    Completed,
    /// A permanent failure halted automated progress
    ActionRequired,
    /// Transient failures exhausted; retry later
    TemporarilyUnavailable,
    /// The job was cancelled
    Cancelled,
    /// Nothing is eligible but the job is not terminal
    Stalled,
}

/// Summary of a resume loop
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResumeReport {
    pub job_id: JobId,
    pub rounds: u32,
    pub executed: usize,
    pub outcome: ResumeOutcome,
}

/// Work planned for one round, captured under the job lock
enum RoundWork {
    Atomic {
        step_index: usize,
        action: SubStepId,
    },
    SubSteps {
        step_index: usize,
        items: Vec<SubStepId>,
        context: Map<String, Value>,
    },
}

/// Drives jobs through their workflows against an opaque Action Executor.
pub struct JobCoordinator {
    registry: Arc<JobRegistry>,
    executor: Arc<dyn ActionExecutor>,
    retry: RetryExecutor,
    events: EventPublisher,
    config: OnboardConfig,
}

impl JobCoordinator {
    pub fn new(executor: Arc<dyn ActionExecutor>, config: OnboardConfig) -> Self {
        Self::with_event_publisher(executor, config, EventPublisher::default())
    }

    pub fn with_event_publisher(
        executor: Arc<dyn ActionExecutor>,
        config: OnboardConfig,
        events: EventPublisher,
    ) -> Self {
        let retry = RetryExecutor::new(RetryPolicy::from_config(&config.backoff));
        Self {
            registry: Arc::new(JobRegistry::new()),
            executor,
            retry,
            events,
            config,
        }
    }

    /// The registry holding every running job
    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// The publisher observers subscribe to
    pub fn events(&self) -> &EventPublisher {
        &self.events
    }

    /// Build a job from its template, register it and return the initial tree.
    #[instrument(skip(self, template), fields(template = %template.name))]
    pub async fn start_job(&self, template: &JobTemplate) -> OrchestrationResult<Job> {
        let job = template.build(self.config.execution.default_retry_limit)?;
        let snapshot = job.clone();
        self.registry.insert(job);
        info!(job_id = %snapshot.id, "job started");
        self.events
            .publish(
                names::JOB_STARTED,
                json!({"job_id": snapshot.id.to_string(), "name": snapshot.name}),
            )
            .await;
        Ok(snapshot)
    }

    /// Fully expanded tree for display
    pub async fn get_status(&self, job_id: &JobId) -> OrchestrationResult<Job> {
        let handle = self.handle(job_id)?;
        let job = handle.lock().await;
        Ok(job.clone())
    }

    /// Operator override of a sub-step status, validator-gated.
    ///
    /// A transition out of completed/skipped invalidates everything
    /// downstream: dependents that already progressed are reset so the
    /// dependency invariant keeps holding.
    #[instrument(skip(self), fields(job_id = %job_id, sub_step = %sub_step, target = %target))]
    pub async fn request_manual_transition(
        &self,
        job_id: &JobId,
        sub_step: &SubStepId,
        target: SubStepStatus,
    ) -> OrchestrationResult<CascadeReport> {
        let handle = self.handle(job_id)?;
        let mut job = handle.lock().await;
        if job.status == JobStatus::Cancelled {
            return Err(OrchestrationError::InvalidJobState {
                job_id: *job_id,
                status: job.status,
            });
        }

        let step = job
            .step_owning_sub_step_mut(sub_step)
            .ok_or_else(|| OrchestrationError::UnknownSubStep(sub_step.clone()))?;
        let Some(workflow) = step.workflow_mut() else {
            return Err(OrchestrationError::UnknownSubStep(sub_step.clone()));
        };

        guards::validate(sub_step, target, workflow)?;
        let from = workflow
            .status_of(sub_step)
            .ok_or_else(|| OrchestrationError::UnknownSubStep(sub_step.clone()))?;

        let event = match target {
            SubStepStatus::Pending => SubStepEvent::Reset,
            SubStepStatus::InProgress => SubStepEvent::Start,
            SubStepStatus::Retrying => {
                SubStepEvent::Retry("retry requested by operator".to_string())
            }
            SubStepStatus::Completed => SubStepEvent::Complete(None),
            SubStepStatus::Failed => SubStepEvent::fail_with_error("marked failed by operator"),
            SubStepStatus::Skipped => SubStepEvent::Skip,
        };
        let event_type = event.event_type();
        apply_sub_step_event(workflow, sub_step, event);

        // Any move out of completed/skipped withdraws what dependents relied
        // on; progressed dependents must return to pending with it.
        let mut invalidated: Vec<SubStepId> = Vec::new();
        if !target.satisfies_dependencies() {
            for dependent in workflow.graph.transitive_dependents(sub_step) {
                if workflow.status_of(&dependent) != Some(SubStepStatus::Pending) {
                    apply_sub_step_event(workflow, &dependent, SubStepEvent::Reset);
                    invalidated.push(dependent);
                }
            }
        }

        info!(
            from = %from,
            invalidated = invalidated.len(),
            "manual transition applied"
        );

        let report = recalculate_job(&mut job);
        self.check_integrity(&job)?;
        self.events
            .publish(
                names::MANUAL_TRANSITION,
                json!({
                    "job_id": job_id.to_string(),
                    "sub_step": sub_step,
                    "event": event_type,
                    "from": from,
                    "to": target,
                    "invalidated_dependents": invalidated,
                }),
            )
            .await;
        self.publish_cascade(job_id, &report).await;
        Ok(report)
    }

    /// Affected-set preview shown to the operator before a reset is applied.
    pub async fn preview_reset(
        &self,
        job_id: &JobId,
        sub_step: &SubStepId,
    ) -> OrchestrationResult<ResetPlan> {
        let handle = self.handle(job_id)?;
        let job = handle.lock().await;
        let step = job
            .step_owning_sub_step(sub_step)
            .ok_or_else(|| OrchestrationError::UnknownSubStep(sub_step.clone()))?;
        let Some(workflow) = step.workflow() else {
            return Err(OrchestrationError::UnknownSubStep(sub_step.clone()));
        };
        reset::preview(sub_step, workflow)
    }

    /// Reset a sub-step and its transitive dependents, then cascade.
    #[instrument(skip(self), fields(job_id = %job_id, sub_step = %sub_step))]
    pub async fn request_reset(
        &self,
        job_id: &JobId,
        sub_step: &SubStepId,
    ) -> OrchestrationResult<ResetReport> {
        let handle = self.handle(job_id)?;
        let mut job = handle.lock().await;
        if job.status == JobStatus::Cancelled {
            return Err(OrchestrationError::InvalidJobState {
                job_id: *job_id,
                status: job.status,
            });
        }

        let step = job
            .step_owning_sub_step_mut(sub_step)
            .ok_or_else(|| OrchestrationError::UnknownSubStep(sub_step.clone()))?;
        let Some(workflow) = step.workflow_mut() else {
            return Err(OrchestrationError::UnknownSubStep(sub_step.clone()));
        };

        let reset_report = reset::apply(sub_step, workflow)?;
        let cascade = recalculate_job(&mut job);
        self.check_integrity(&job)?;

        self.events
            .publish(
                names::RESET_CASCADE_APPLIED,
                json!({
                    "job_id": job_id.to_string(),
                    "target": reset_report.plan.target,
                    "dependents": reset_report.plan.dependents,
                }),
            )
            .await;
        self.publish_cascade(job_id, &cascade).await;
        Ok(reset_report)
    }

    /// Halt the job. In-flight actions finish and their results are
    /// recorded; no new round starts.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn request_cancel(&self, job_id: &JobId) -> OrchestrationResult<()> {
        let handle = self.handle(job_id)?;
        let mut job = handle.lock().await;
        match job.status {
            JobStatus::Cancelled => Ok(()),
            JobStatus::Completed => Err(OrchestrationError::InvalidJobState {
                job_id: *job_id,
                status: job.status,
            }),
            _ => {
                job.cancel_requested = true;
                job.status = JobStatus::Cancelled;
                job.touch();
                warn!("job cancelled by operator");
                self.events
                    .publish(
                        names::JOB_CANCELLED,
                        json!({"job_id": job_id.to_string()}),
                    )
                    .await;
                Ok(())
            }
        }
    }

    /// Run execution rounds until the job is terminal, needs an operator,
    /// a round surfaces temporarily-unavailable, or nothing is eligible.
    #[instrument(skip(self), fields(job_id = %job_id))]
    pub async fn resume(&self, job_id: &JobId) -> OrchestrationResult<ResumeReport> {
        let mut rounds = 0u32;
        let mut executed = 0usize;
        let mut unavailable = false;

        loop {
            let round = self.resume_round(job_id).await?;
            if !round.executed.is_empty() {
                rounds += 1;
                executed += round.executed.len();
            }
            if !round.unavailable.is_empty() {
                unavailable = true;
                break;
            }
            if round.halt.is_some() {
                break;
            }
        }

        let status = {
            let handle = self.handle(job_id)?;
            let job = handle.lock().await;
            job.status
        };
        let outcome = match status {
            JobStatus::Completed => ResumeOutcome::Completed,
            JobStatus::Cancelled => ResumeOutcome::Cancelled,
            JobStatus::ActionRequired | JobStatus::Failed => ResumeOutcome::ActionRequired,
            _ if unavailable => ResumeOutcome::TemporarilyUnavailable,
            _ => ResumeOutcome::Stalled,
        };

        info!(rounds, executed, outcome = ?outcome, "resume finished");
        Ok(ResumeReport {
            job_id: *job_id,
            rounds,
            executed,
            outcome,
        })
    }

    /// One planner round: discover the frontier, execute it concurrently,
    /// apply results and cascade.
    pub async fn resume_round(&self, job_id: &JobId) -> OrchestrationResult<RoundReport> {
        let handle = self.handle(job_id)?;

        let work = {
            let mut job = handle.lock().await;
            recalculate_job(&mut job);

            if job.status.is_terminal() {
                return Ok(RoundReport::halted(RoundHalt::Terminal));
            }
            if job.status.needs_operator() {
                return Ok(RoundReport::halted(RoundHalt::NeedsOperator));
            }

            let step_index = job.current_step;
            let Some(step) = job.steps.get_mut(step_index) else {
                return Ok(RoundReport::halted(RoundHalt::NoEligibleWork));
            };

            if step.is_composite() {
                let Some(workflow) = step.workflow_mut() else {
                    return Ok(RoundReport::halted(RoundHalt::NoEligibleWork));
                };
                let eligible = next_eligible(workflow);
                if eligible.is_empty() {
                    return Ok(RoundReport::halted(RoundHalt::NoEligibleWork));
                }
                for id in &eligible {
                    apply_sub_step_event(workflow, id, SubStepEvent::Start);
                    if let Some(sub) = workflow.sub_step_mut(id) {
                        sub.attempts += 1;
                    }
                }
                RoundWork::SubSteps {
                    step_index,
                    items: eligible.into_iter().collect(),
                    context: workflow.context.clone(),
                }
            } else {
                if let StepBody::Atomic { attempts, .. } = &mut step.body {
                    *attempts += 1;
                }
                step.status = StepStatus::InProgress;
                RoundWork::Atomic {
                    step_index,
                    action: SubStepId::from(step.name.as_str()),
                }
            }
        };

        match work {
            RoundWork::Atomic { step_index, action } => {
                self.run_atomic_round(&handle, job_id, step_index, action)
                    .await
            }
            RoundWork::SubSteps {
                step_index,
                items,
                context,
            } => {
                self.run_sub_step_round(&handle, job_id, step_index, items, context)
                    .await
            }
        }
    }

    async fn run_atomic_round(
        &self,
        handle: &JobHandle,
        job_id: &JobId,
        step_index: usize,
        action: SubStepId,
    ) -> OrchestrationResult<RoundReport> {
        let context = Map::new();
        let outcome = self
            .retry
            .execute_with_retry(|_| self.executor.execute(&action, &context))
            .await;

        let mut job = handle.lock().await;
        let mut report = RoundReport::default();
        report.executed.push(action.clone());

        if let Some(step) = job.steps.get_mut(step_index) {
            match outcome {
                Ok(RetrySuccess { value, .. }) => {
                    step.status = StepStatus::Completed;
                    if let StepBody::Atomic { result, error, .. } = &mut step.body {
                        *result = value;
                        *error = None;
                    }
                    report.completed.push(action.clone());
                }
                Err(RetryError::Permanent { error, .. }) => {
                    step.status = StepStatus::Failed;
                    if let StepBody::Atomic { error: stored, .. } = &mut step.body {
                        *stored = Some(error.to_string());
                    }
                    report.failed.push(action.clone());
                }
                Err(RetryError::Exhausted { error, .. }) => {
                    // Safe to retry later; do not record a false failure.
                    step.status = StepStatus::Pending;
                    if let StepBody::Atomic { error: stored, .. } = &mut step.body {
                        *stored = Some(error.to_string());
                    }
                    report.unavailable.push(action.clone());
                }
            }
        }

        let cascade = recalculate_job(&mut job);
        self.check_integrity(&job)?;
        drop(job);
        self.publish_round(job_id, &report).await;
        self.publish_cascade(job_id, &cascade).await;
        Ok(report)
    }

    async fn run_sub_step_round(
        &self,
        handle: &JobHandle,
        job_id: &JobId,
        step_index: usize,
        items: Vec<SubStepId>,
        context: Map<String, Value>,
    ) -> OrchestrationResult<RoundReport> {
        self.events
            .publish(
                names::VIABLE_SUB_STEPS_DISCOVERED,
                json!({"job_id": job_id.to_string(), "sub_steps": items}),
            )
            .await;

        let shared_context = Arc::new(context);
        let tasks: Vec<_> = items
            .iter()
            .cloned()
            .map(|id| {
                let executor = Arc::clone(&self.executor);
                let retry = self.retry.clone();
                let context = Arc::clone(&shared_context);
                async move {
                    let outcome = retry
                        .execute_with_retry(|_| executor.execute(&id, context.as_ref()))
                        .await;
                    (id, outcome)
                }
            })
            .collect();

        let results: Vec<(SubStepId, Result<RetrySuccess<Option<Value>>, RetryError>)> =
            stream::iter(tasks)
                .buffer_unordered(self.config.execution.max_concurrent_sub_steps)
                .collect()
                .await;

        let mut job = handle.lock().await;
        let mut report = RoundReport::default();
        let mut transitions: Vec<(SubStepId, SubStepStatus)> = Vec::new();

        {
            let Some(workflow) = job
                .steps
                .get_mut(step_index)
                .and_then(|step| step.workflow_mut())
            else {
                return Err(OrchestrationError::UnknownSubStep(
                    items.first().cloned().unwrap_or_default(),
                ));
            };

            for (id, outcome) in results {
                report.executed.push(id.clone());

                // An operator may have reset the sub-step while the lock was
                // released; a stale result must not overwrite their change.
                if workflow.status_of(&id) != Some(SubStepStatus::InProgress) {
                    warn!(sub_step = %id, "dropping stale execution result");
                    continue;
                }

                let event = match outcome {
                    Ok(RetrySuccess { value, .. }) => SubStepEvent::Complete(value),
                    Err(RetryError::Permanent { error, .. }) => {
                        SubStepEvent::Fail(error.to_string())
                    }
                    // Temporarily unavailable: leave the sub-step retrying
                    // rather than recording a false failure.
                    Err(RetryError::Exhausted { error, .. }) => {
                        SubStepEvent::Retry(error.to_string())
                    }
                };
                let to = event.target_status();
                apply_sub_step_event(workflow, &id, event);
                transitions.push((id.clone(), to));
                match to {
                    SubStepStatus::Completed => report.completed.push(id),
                    SubStepStatus::Failed => report.failed.push(id),
                    _ => report.unavailable.push(id),
                }
            }
        }

        let cascade = recalculate_job(&mut job);
        self.check_integrity(&job)?;
        drop(job);

        for (id, to) in transitions {
            self.events
                .publish(
                    names::SUB_STEP_TRANSITIONED,
                    json!({"job_id": job_id.to_string(), "sub_step": id, "to": to}),
                )
                .await;
        }
        self.publish_round(job_id, &report).await;
        self.publish_cascade(job_id, &cascade).await;
        Ok(report)
    }

    fn check_integrity(&self, job: &Job) -> OrchestrationResult<()> {
        for step in &job.steps {
            if let Some(workflow) = step.workflow() {
                guards::verify_integrity(workflow)?;
            }
        }
        Ok(())
    }

    async fn publish_round(&self, job_id: &JobId, report: &RoundReport) {
        self.events
            .publish(
                names::ROUND_COMPLETED,
                json!({
                    "job_id": job_id.to_string(),
                    "executed": report.executed.len(),
                    "completed": report.completed.len(),
                    "failed": report.failed.len(),
                    "unavailable": report.unavailable.len(),
                }),
            )
            .await;
    }

    async fn publish_cascade(&self, job_id: &JobId, cascade: &CascadeReport) {
        for change in &cascade.step_changes {
            self.events
                .publish(
                    names::STEP_TRANSITIONED,
                    json!({
                        "job_id": job_id.to_string(),
                        "step": change.step,
                        "from": change.from,
                        "to": change.to,
                    }),
                )
                .await;
        }
        if let Some((from, to)) = cascade.job_change {
            self.events
                .publish(
                    names::JOB_TRANSITIONED,
                    json!({"job_id": job_id.to_string(), "from": from, "to": to}),
                )
                .await;
        }
        if cascade.job_reopened {
            self.events
                .publish(
                    names::JOB_REOPENED,
                    json!({"job_id": job_id.to_string()}),
                )
                .await;
        }
    }

    fn handle(&self, job_id: &JobId) -> OrchestrationResult<JobHandle> {
        self.registry
            .get(job_id)
            .ok_or(OrchestrationError::JobNotFound(*job_id))
    }
}
