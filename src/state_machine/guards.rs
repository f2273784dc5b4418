//! # Transition Validator
//!
//! Decides whether a requested sub-step status change is legal given the
//! dependency graph and the workflow's current statuses.
//!
//! The one hard invariant the whole engine exists to protect lives here: a
//! sub-step may only become `completed` or `skipped` while every declared
//! dependency is itself `completed` or `skipped`. The graph must never
//! represent "this ran successfully" when something it required has not.

use std::collections::BTreeSet;

use crate::models::core::ids::SubStepId;
use crate::models::core::workflow::SubStepWorkflow;
use crate::orchestration::errors::{OrchestrationError, OrchestrationResult};
use crate::state_machine::states::SubStepStatus;

/// Dependencies of `sub_step` that are not yet completed or skipped.
pub fn unsatisfied_dependencies(
    sub_step: &SubStepId,
    workflow: &SubStepWorkflow,
) -> OrchestrationResult<Vec<SubStepId>> {
    if workflow.sub_step(sub_step).is_none() {
        return Err(OrchestrationError::UnknownSubStep(sub_step.clone()));
    }
    let deps = workflow
        .graph
        .dependencies_of(sub_step)
        .cloned()
        .unwrap_or_default();
    Ok(deps
        .into_iter()
        .filter(|dep| {
            !workflow
                .status_of(dep)
                .is_some_and(|status| status.satisfies_dependencies())
        })
        .collect())
}

/// Statuses the sub-step may legally move to right now.
///
/// `pending` and `failed` are always reachable (an operator can always halt
/// or reset a step). The execution states and the success states require
/// every declared dependency to be satisfied first.
pub fn allowed_transitions(
    sub_step: &SubStepId,
    workflow: &SubStepWorkflow,
) -> OrchestrationResult<BTreeSet<SubStepStatus>> {
    let blocking = unsatisfied_dependencies(sub_step, workflow)?;
    let mut allowed: BTreeSet<SubStepStatus> =
        [SubStepStatus::Pending, SubStepStatus::Failed].into();
    if blocking.is_empty() {
        allowed.insert(SubStepStatus::InProgress);
        allowed.insert(SubStepStatus::Retrying);
        allowed.insert(SubStepStatus::Completed);
        allowed.insert(SubStepStatus::Skipped);
    }
    Ok(allowed)
}

/// Validate a requested status change.
///
/// Rejections identify the specific dependency ids that block the change so
/// callers can explain the block rather than fail opaquely.
pub fn validate(
    sub_step: &SubStepId,
    target: SubStepStatus,
    workflow: &SubStepWorkflow,
) -> OrchestrationResult<()> {
    match target {
        SubStepStatus::Pending | SubStepStatus::Failed => {
            if workflow.sub_step(sub_step).is_none() {
                return Err(OrchestrationError::UnknownSubStep(sub_step.clone()));
            }
            Ok(())
        }
        SubStepStatus::InProgress
        | SubStepStatus::Retrying
        | SubStepStatus::Completed
        | SubStepStatus::Skipped => {
            let blocking = unsatisfied_dependencies(sub_step, workflow)?;
            if blocking.is_empty() {
                Ok(())
            } else {
                Err(OrchestrationError::DependencyNotSatisfied {
                    sub_step: sub_step.clone(),
                    target,
                    blocking,
                })
            }
        }
    }
}

/// Check the core safety invariant over a whole workflow.
///
/// Never fires when `validate` guards every write path; a corrupted
/// persisted tree must still be detectable rather than silently trusted.
pub fn verify_integrity(workflow: &SubStepWorkflow) -> OrchestrationResult<()> {
    for sub_step in workflow.sub_steps() {
        if !sub_step.status.satisfies_dependencies() {
            continue;
        }
        if let Some(deps) = workflow.graph.dependencies_of(&sub_step.id) {
            for dep in deps {
                let dep_status = workflow
                    .status_of(dep)
                    .ok_or_else(|| OrchestrationError::UnknownSubStep(dep.clone()))?;
                if !dep_status.satisfies_dependencies() {
                    return Err(OrchestrationError::WorkflowCorruption {
                        sub_step: sub_step.id.clone(),
                        status: sub_step.status,
                        dependency: dep.clone(),
                        dependency_status: dep_status,
                    });
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::DependencyGraph;
    use crate::models::core::ids::PhaseId;
    use crate::models::core::sub_step::SubStep;
    use crate::models::core::workflow::Phase;

    fn sid(s: &str) -> SubStepId {
        SubStepId::from(s)
    }

    fn workflow() -> SubStepWorkflow {
        let graph = DependencyGraph::builder()
            .sub_step("a1", "setup", [])
            .sub_step("a2", "setup", [])
            .sub_step("b1", "configure", [sid("a1")])
            .sub_step("b2", "configure", [sid("a1"), sid("a2")])
            .build()
            .unwrap();
        let mut setup = Phase::new(PhaseId::from("setup"), 0);
        for id in ["a1", "a2"] {
            setup.sub_steps.insert(sid(id), SubStep::new(sid(id), 3));
        }
        let mut configure = Phase::new(PhaseId::from("configure"), 1);
        for id in ["b1", "b2"] {
            configure.sub_steps.insert(sid(id), SubStep::new(sid(id), 3));
        }
        SubStepWorkflow::new(vec![setup, configure], graph)
    }

    #[test]
    fn test_pending_and_failed_always_reachable() {
        let wf = workflow();
        let allowed = allowed_transitions(&sid("b2"), &wf).unwrap();
        assert!(allowed.contains(&SubStepStatus::Pending));
        assert!(allowed.contains(&SubStepStatus::Failed));
        assert!(!allowed.contains(&SubStepStatus::Completed));
        assert!(!allowed.contains(&SubStepStatus::Skipped));
    }

    #[test]
    fn test_completion_gated_on_dependencies() {
        let mut wf = workflow();
        assert!(validate(&sid("b1"), SubStepStatus::Completed, &wf).is_err());

        wf.sub_step_mut(&sid("a1")).unwrap().status = SubStepStatus::Completed;
        assert!(validate(&sid("b1"), SubStepStatus::Completed, &wf).is_ok());
    }

    #[test]
    fn test_skipped_dependency_satisfies() {
        let mut wf = workflow();
        wf.sub_step_mut(&sid("a1")).unwrap().status = SubStepStatus::Skipped;
        assert!(validate(&sid("b1"), SubStepStatus::InProgress, &wf).is_ok());
    }

    #[test]
    fn test_rejection_names_blocking_dependencies() {
        let mut wf = workflow();
        wf.sub_step_mut(&sid("a1")).unwrap().status = SubStepStatus::Completed;

        let error = validate(&sid("b2"), SubStepStatus::Completed, &wf).unwrap_err();
        match error {
            OrchestrationError::DependencyNotSatisfied { blocking, .. } => {
                assert_eq!(blocking, vec![sid("a2")]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_unknown_sub_step_rejected() {
        let wf = workflow();
        assert!(matches!(
            validate(&sid("ghost"), SubStepStatus::Pending, &wf),
            Err(OrchestrationError::UnknownSubStep(_))
        ));
    }

    #[test]
    fn test_verify_integrity_detects_corruption() {
        let mut wf = workflow();
        assert!(verify_integrity(&wf).is_ok());

        wf.sub_step_mut(&sid("b1")).unwrap().status = SubStepStatus::Completed;
        let error = verify_integrity(&wf).unwrap_err();
        assert!(matches!(
            error,
            OrchestrationError::WorkflowCorruption { .. }
        ));
    }
}
