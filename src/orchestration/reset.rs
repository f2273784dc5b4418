//! # Reset Cascade
//!
//! Resetting a sub-step invalidates everything downstream of it: results the
//! dependents read from the context are no longer trustworthy, so they are
//! returned to `pending` transitively. Because this can silently undo
//! apparent progress on sub-steps that look done, the full affected list is
//! computed first as a [`ResetPlan`] for the operator to confirm.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::core::ids::SubStepId;
use crate::models::core::workflow::SubStepWorkflow;
use crate::orchestration::cascade::{recalculate_workflow, PhaseChange};
use crate::orchestration::errors::{OrchestrationError, OrchestrationResult};

/// The sub-steps a reset will touch, shown to the operator before applying
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPlan {
    pub target: SubStepId,
    /// Transitive dependents that will also return to pending
    pub dependents: Vec<SubStepId>,
}

impl ResetPlan {
    /// Every sub-step the reset touches, target first
    pub fn affected(&self) -> impl Iterator<Item = &SubStepId> {
        std::iter::once(&self.target).chain(self.dependents.iter())
    }
}

/// Outcome of an applied reset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetReport {
    pub plan: ResetPlan,
    pub phase_changes: Vec<PhaseChange>,
}

/// Compute the affected set without changing anything.
pub fn preview(
    sub_step: &SubStepId,
    workflow: &SubStepWorkflow,
) -> OrchestrationResult<ResetPlan> {
    if workflow.sub_step(sub_step).is_none() {
        return Err(OrchestrationError::UnknownSubStep(sub_step.clone()));
    }
    let dependents = workflow
        .graph
        .transitive_dependents(sub_step)
        .into_iter()
        .collect();
    Ok(ResetPlan {
        target: sub_step.clone(),
        dependents,
    })
}

/// Reset the sub-step and all transitive dependents to pending, withdraw the
/// context entries each of them had written, then recalculate the affected
/// phases once.
pub fn apply(
    sub_step: &SubStepId,
    workflow: &mut SubStepWorkflow,
) -> OrchestrationResult<ResetReport> {
    let plan = preview(sub_step, workflow)?;

    for id in plan.affected().cloned().collect::<Vec<_>>() {
        workflow.withdraw_context(&id);
        if let Some(sub_step) = workflow.sub_step_mut(&id) {
            sub_step.reset();
        }
    }

    let phase_changes = recalculate_workflow(workflow);

    info!(
        target = %plan.target,
        dependents = plan.dependents.len(),
        "reset cascade applied"
    );

    Ok(ResetReport {
        plan,
        phase_changes,
    })
}
