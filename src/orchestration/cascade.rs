//! # Status Cascade Engine
//!
//! Derives phase status from sub-step statuses, the current-phase pointer
//! from phase statuses, and step/job status from everything below. The
//! derivation is deterministic and idempotent over the in-memory tree; the
//! caller persists the result.
//!
//! The one backward move in an otherwise forward-progressing machine is the
//! reopen path: when an operator pushes a previously completed step back to a
//! non-terminal state, the step and job follow it backward as an explicit,
//! logged transition (`in_progress` in the usual partially-done case).

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::models::core::ids::PhaseId;
use crate::models::core::job::Job;
use crate::models::core::step::StepBody;
use crate::models::core::workflow::{CurrentPhase, Phase, SubStepWorkflow};
use crate::state_machine::states::{JobStatus, PhaseStatus, StepStatus, SubStepStatus};

/// One phase status change recorded during recalculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseChange {
    pub phase: PhaseId,
    pub from: PhaseStatus,
    pub to: PhaseStatus,
}

/// One step status change recorded during recalculation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepChange {
    pub step: String,
    pub from: StepStatus,
    pub to: StepStatus,
}

/// Everything a recalculation pass changed
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CascadeReport {
    pub phase_changes: Vec<PhaseChange>,
    pub step_changes: Vec<StepChange>,
    pub job_change: Option<(JobStatus, JobStatus)>,
    /// Steps that moved backward out of completed (operator reopen)
    pub reopened_steps: Vec<String>,
    /// True when the job itself moved backward out of completed
    pub job_reopened: bool,
}

impl CascadeReport {
    pub fn is_empty(&self) -> bool {
        self.phase_changes.is_empty()
            && self.step_changes.is_empty()
            && self.job_change.is_none()
    }
}

/// Derive a phase's status from its sub-steps.
///
/// Precedence: active beats everything, then fully done, then failed, then
/// untouched; a mix of completed and pending with nothing active and no
/// failures counts as in progress.
pub fn derive_phase_status(phase: &Phase) -> PhaseStatus {
    let sub_steps: Vec<_> = phase.sub_steps.values().collect();
    if sub_steps.iter().any(|s| s.status.is_active()) {
        PhaseStatus::InProgress
    } else if sub_steps
        .iter()
        .all(|s| s.status.satisfies_dependencies())
    {
        PhaseStatus::Completed
    } else if sub_steps.iter().any(|s| s.status.is_failed()) {
        PhaseStatus::Failed
    } else if sub_steps.iter().all(|s| s.status == SubStepStatus::Pending) {
        PhaseStatus::Pending
    } else {
        PhaseStatus::InProgress
    }
}

/// Recalculate every phase status and the current-phase pointer.
pub fn recalculate_workflow(workflow: &mut SubStepWorkflow) -> Vec<PhaseChange> {
    let mut changes = Vec::new();
    for phase in &mut workflow.phases {
        let derived = derive_phase_status(phase);
        if derived != phase.status {
            changes.push(PhaseChange {
                phase: phase.id.clone(),
                from: phase.status,
                to: derived,
            });
            phase.status = derived;
        }
    }

    workflow.current_phase = workflow
        .phases
        .iter()
        .find(|phase| !phase.status.is_complete())
        .map(|phase| CurrentPhase::Phase(phase.id.clone()))
        .unwrap_or(CurrentPhase::Completed);

    changes
}

/// Derive a composite step's status from its recalculated workflow.
pub fn derive_step_status(workflow: &SubStepWorkflow) -> StepStatus {
    if workflow
        .phases
        .iter()
        .all(|phase| phase.status.is_complete())
    {
        StepStatus::Completed
    } else if workflow
        .phases
        .iter()
        .any(|phase| phase.status == PhaseStatus::Failed)
    {
        StepStatus::Failed
    } else if workflow
        .phases
        .iter()
        .all(|phase| phase.status == PhaseStatus::Pending)
    {
        StepStatus::Pending
    } else {
        StepStatus::InProgress
    }
}

/// Recalculate the whole job: phases, composite step statuses, the
/// current-step pointer and the job status.
///
/// Atomic step statuses are owned by the execution path and are read, not
/// derived, here. Operator-terminal job statuses (`cancelled`, `failed`) are
/// never overwritten by derivation.
pub fn recalculate_job(job: &mut Job) -> CascadeReport {
    let mut report = CascadeReport::default();

    for step in &mut job.steps {
        if let StepBody::Composite { workflow } = &mut step.body {
            report.phase_changes.extend(recalculate_workflow(workflow));
            let derived = derive_step_status(workflow);

            if step.status == StepStatus::Completed && derived != StepStatus::Completed {
                // Reopen: the one place the machine moves backward.
                warn!(
                    step = %step.name,
                    from = %step.status,
                    to = %derived,
                    "step reopened: previously completed work moved back"
                );
                report.reopened_steps.push(step.name.clone());
            }

            if derived != step.status {
                report.step_changes.push(StepChange {
                    step: step.name.clone(),
                    from: step.status,
                    to: derived,
                });
                step.status = derived;
            }
        }
    }

    job.current_step = job
        .steps
        .iter()
        .position(|step| step.status != StepStatus::Completed)
        .unwrap_or_else(|| job.steps.len().saturating_sub(1));

    if let Some(derived) = derive_job_status(job) {
        if job.status == JobStatus::Completed && derived != JobStatus::Completed {
            warn!(
                job_id = %job.id,
                from = %job.status,
                to = %derived,
                "job reopened: previously completed job moved back"
            );
            report.job_reopened = true;
        }
        if derived != job.status {
            report.job_change = Some((job.status, derived));
            job.status = derived;
        }
    }

    if !report.is_empty() {
        job.touch();
        debug!(
            job_id = %job.id,
            phase_changes = report.phase_changes.len(),
            step_changes = report.step_changes.len(),
            "status cascade applied"
        );
    }

    report
}

/// Derive the job status from step statuses.
///
/// Returns `None` when the job is in an operator-terminal status that
/// derivation must not touch (`cancelled`, or operator-declared `failed`).
fn derive_job_status(job: &Job) -> Option<JobStatus> {
    match job.status {
        JobStatus::Cancelled | JobStatus::Failed => None,
        _ => {
            let derived = if job.steps.iter().any(|s| s.status.is_failed()) {
                JobStatus::ActionRequired
            } else if !job.steps.is_empty()
                && job.steps.iter().all(|s| s.status.is_complete())
            {
                JobStatus::Completed
            } else if job
                .steps
                .iter()
                .all(|s| s.status == StepStatus::Pending)
            {
                JobStatus::Pending
            } else {
                JobStatus::InProgress
            };
            Some(derived)
        }
    }
}
