//! # Resume Planner
//!
//! Determines the readiness frontier: every sub-step whose dependencies are
//! satisfied and whose own status permits execution. The full eligible set is
//! returned at once; members are independent by construction of the graph, so
//! callers may execute them concurrently within resource limits.
//!
//! The planner knows nothing about phases. Phase ordering emerges because
//! later-phase sub-steps declare dependencies on earlier-phase sub-steps,
//! which is exactly what lets a phase-4 sub-step start the instant its
//! phase-2 dependency completes instead of waiting out unrelated phase-3
//! work.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

use crate::models::core::ids::SubStepId;
use crate::models::core::workflow::SubStepWorkflow;
use crate::state_machine::states::SubStepStatus;

/// Sub-steps eligible to execute right now.
pub fn next_eligible(workflow: &SubStepWorkflow) -> BTreeSet<SubStepId> {
    let eligible: BTreeSet<SubStepId> = workflow
        .sub_steps()
        .filter(|sub_step| match sub_step.status {
            SubStepStatus::Pending => true,
            SubStepStatus::Retrying => sub_step.retry_eligible(),
            _ => false,
        })
        .filter(|sub_step| {
            workflow
                .graph
                .dependencies_of(&sub_step.id)
                .map(|deps| {
                    deps.iter().all(|dep| {
                        workflow
                            .status_of(dep)
                            .is_some_and(|status| status.satisfies_dependencies())
                    })
                })
                .unwrap_or(true)
        })
        .map(|sub_step| sub_step.id.clone())
        .collect();

    debug!(eligible = eligible.len(), "computed readiness frontier");
    eligible
}

/// Aggregate readiness counts for status display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessSummary {
    pub total: usize,
    pub ready: usize,
    pub completed: usize,
    pub blocked: usize,
    pub failed: usize,
    pub progress_percentage: u8,
}

/// Summarize how far the workflow has progressed and what is runnable.
pub fn readiness_summary(workflow: &SubStepWorkflow) -> ReadinessSummary {
    let eligible = next_eligible(workflow);
    let total = workflow.sub_steps().count();
    let completed = workflow
        .sub_steps()
        .filter(|s| s.status.satisfies_dependencies())
        .count();
    let failed = workflow.sub_steps().filter(|s| s.status.is_failed()).count();
    let blocked = workflow
        .sub_steps()
        .filter(|s| s.status == SubStepStatus::Pending && !eligible.contains(&s.id))
        .count();

    ReadinessSummary {
        total,
        ready: eligible.len(),
        completed,
        blocked,
        failed,
        progress_percentage: if total > 0 {
            (completed as f64 / total as f64 * 100.0) as u8
        } else {
            0
        },
    }
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

    /// Phase A = {a1, a2} with no deps; phase B = {b1 <- a1, b2 <- a1, a2}.
    fn frontier_workflow() -> SubStepWorkflow {
        let graph = DependencyGraph::builder()
            .sub_step("a1", "phase_a", [])
            .sub_step("a2", "phase_a", [])
            .sub_step("b1", "phase_b", [sid("a1")])
            .sub_step("b2", "phase_b", [sid("a1"), sid("a2")])
            .build()
            .unwrap();
        let mut phase_a = Phase::new(PhaseId::from("phase_a"), 0);
        for id in ["a1", "a2"] {
            phase_a.sub_steps.insert(sid(id), SubStep::new(sid(id), 3));
        }
        let mut phase_b = Phase::new(PhaseId::from("phase_b"), 1);
        for id in ["b1", "b2"] {
            phase_b.sub_steps.insert(sid(id), SubStep::new(sid(id), 3));
        }
        SubStepWorkflow::new(vec![phase_a, phase_b], graph)
    }

    #[test]
    fn test_initial_frontier_is_rootset() {
        let wf = frontier_workflow();
        assert_eq!(next_eligible(&wf), [sid("a1"), sid("a2")].into());
    }

    #[test]
    fn test_frontier_crosses_phase_boundary() {
        let mut wf = frontier_workflow();
        wf.sub_step_mut(&sid("a1")).unwrap().status = SubStepStatus::Completed;

        // b1 is eligible the moment a1 completes, even though phase A is
        // still open; b2 still waits on a2.
        assert_eq!(next_eligible(&wf), [sid("a2"), sid("b1")].into());

        wf.sub_step_mut(&sid("a2")).unwrap().status = SubStepStatus::Completed;
        wf.sub_step_mut(&sid("b1")).unwrap().status = SubStepStatus::Completed;
        assert_eq!(next_eligible(&wf), [sid("b2")].into());
    }

    #[test]
    fn test_never_returns_blocked_sub_steps() {
        let mut wf = frontier_workflow();
        wf.sub_step_mut(&sid("a1")).unwrap().status = SubStepStatus::Failed;

        let eligible = next_eligible(&wf);
        assert!(!eligible.contains(&sid("b1")));
        assert!(!eligible.contains(&sid("b2")));
    }

    #[test]
    fn test_retrying_with_budget_is_eligible() {
        let mut wf = frontier_workflow();
        {
            let sub_step = wf.sub_step_mut(&sid("a1")).unwrap();
            sub_step.status = SubStepStatus::Retrying;
            sub_step.attempts = 2;
        }
        assert!(next_eligible(&wf).contains(&sid("a1")));

        wf.sub_step_mut(&sid("a1")).unwrap().attempts = 3;
        assert!(!next_eligible(&wf).contains(&sid("a1")));
    }

    #[test]
    fn test_in_progress_and_terminal_not_eligible() {
        let mut wf = frontier_workflow();
        wf.sub_step_mut(&sid("a1")).unwrap().status = SubStepStatus::InProgress;
        wf.sub_step_mut(&sid("a2")).unwrap().status = SubStepStatus::Skipped;
        // b1/b2 still wait on a1; a1 is active and a2 terminal.
        assert!(next_eligible(&wf).is_empty());
    }

    #[test]
    fn test_readiness_summary_counts() {
        let mut wf = frontier_workflow();
        wf.sub_step_mut(&sid("a1")).unwrap().status = SubStepStatus::Completed;

        let summary = readiness_summary(&wf);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.ready, 2); // a2 and b1
        assert_eq!(summary.blocked, 1); // b2
        assert_eq!(summary.progress_percentage, 25);
    }
}
