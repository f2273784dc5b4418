//! Property tests for the cascade, planner, reset and validator invariants.

use proptest::prelude::*;

use onboard_core::models::{
    CurrentPhase, Job, JobTemplate, PhaseTemplate, StepTemplate, SubStepId, SubStepTemplate,
};
use onboard_core::orchestration::cascade::recalculate_job;
use onboard_core::orchestration::reset;
use onboard_core::orchestration::resume_planner::next_eligible;
use onboard_core::state_machine::guards;
use onboard_core::state_machine::{JobStatus, SubStepStatus};

const IDS: [&str; 4] = ["a1", "a2", "b1", "b2"];

fn sid(s: &str) -> SubStepId {
    SubStepId::from(s)
}

/// Phase A = {a1, a2}; phase B = {b1 <- a1, b2 <- a1, a2}.
fn diamond_job() -> Job {
    JobTemplate::new(
        "property_job",
        vec![StepTemplate::Composite {
            name: "portal_setup".to_string(),
            phases: vec![
                PhaseTemplate::new(
                    "phase_a",
                    vec![SubStepTemplate::new("a1"), SubStepTemplate::new("a2")],
                ),
                PhaseTemplate::new(
                    "phase_b",
                    vec![
                        SubStepTemplate::new("b1").depends_on([sid("a1")]),
                        SubStepTemplate::new("b2").depends_on([sid("a1"), sid("a2")]),
                    ],
                ),
            ],
        }],
    )
    .build(3)
    .unwrap()
}

fn assign(job: &mut Job, statuses: &[SubStepStatus]) {
    let workflow = job.steps[0].workflow_mut().unwrap();
    for (id, status) in IDS.iter().zip(statuses) {
        workflow.sub_step_mut(&sid(id)).unwrap().status = *status;
    }
}

fn arb_status() -> impl Strategy<Value = SubStepStatus> {
    prop_oneof![
        Just(SubStepStatus::Pending),
        Just(SubStepStatus::InProgress),
        Just(SubStepStatus::Retrying),
        Just(SubStepStatus::Completed),
        Just(SubStepStatus::Failed),
        Just(SubStepStatus::Skipped),
    ]
}

/// Mirror of the coordinator's manual-transition application: set the target
/// status, and on any move out of completed/skipped reset every dependent
/// that has progressed.
fn apply_transition(job: &mut Job, id: &SubStepId, target: SubStepStatus) {
    let workflow = job.steps[0].workflow_mut().unwrap();
    match target {
        SubStepStatus::Pending => {
            workflow.withdraw_context(id);
            workflow.sub_step_mut(id).unwrap().reset();
        }
        other => workflow.sub_step_mut(id).unwrap().status = other,
    }
    if !target.satisfies_dependencies() {
        for dependent in workflow.graph.transitive_dependents(id) {
            if workflow.status_of(&dependent) != Some(SubStepStatus::Pending) {
                workflow.withdraw_context(&dependent);
                workflow.sub_step_mut(&dependent).unwrap().reset();
            }
        }
    }
}

proptest! {
    #[test]
    fn recalculate_is_idempotent(statuses in prop::collection::vec(arb_status(), 4)) {
        let mut job = diamond_job();
        assign(&mut job, &statuses);

        recalculate_job(&mut job);
        let first = serde_json::to_value(&job).unwrap();
        recalculate_job(&mut job);
        let mut second = serde_json::to_value(&job).unwrap();
        second["updated_at"] = first["updated_at"].clone();

        prop_assert_eq!(first, second);
    }

    #[test]
    fn eligible_sub_steps_have_satisfied_dependencies(
        statuses in prop::collection::vec(arb_status(), 4)
    ) {
        let mut job = diamond_job();
        assign(&mut job, &statuses);
        let workflow = job.steps[0].workflow().unwrap();

        for id in next_eligible(workflow) {
            if let Some(deps) = workflow.graph.dependencies_of(&id) {
                for dep in deps {
                    let status = workflow.status_of(dep).unwrap();
                    prop_assert!(
                        status.satisfies_dependencies(),
                        "eligible {} has unsatisfied dependency {} ({})",
                        id, dep, status
                    );
                }
            }
        }
    }

    #[test]
    fn reset_clears_target_and_transitive_dependents(
        statuses in prop::collection::vec(arb_status(), 4),
        target_index in 0usize..4
    ) {
        let mut job = diamond_job();
        assign(&mut job, &statuses);
        let target = sid(IDS[target_index]);

        let workflow = job.steps[0].workflow_mut().unwrap();
        let affected = {
            let mut set = workflow.graph.transitive_dependents(&target);
            set.insert(target.clone());
            set
        };
        reset::apply(&target, workflow).unwrap();

        for id in &affected {
            let status = workflow.status_of(id).unwrap();
            prop_assert_eq!(status, SubStepStatus::Pending);
        }
        // Everything outside the affected set is untouched.
        for (id, original) in IDS.iter().zip(&statuses) {
            if !affected.contains(&sid(id)) {
                prop_assert_eq!(workflow.status_of(&sid(id)).unwrap(), *original);
            }
        }
    }

    #[test]
    fn all_done_means_everything_completed(
        statuses in prop::collection::vec(
            prop_oneof![Just(SubStepStatus::Completed), Just(SubStepStatus::Skipped)],
            4
        )
    ) {
        let mut job = diamond_job();
        assign(&mut job, &statuses);
        recalculate_job(&mut job);

        let workflow = job.steps[0].workflow().unwrap();
        prop_assert_eq!(&workflow.current_phase, &CurrentPhase::Completed);
        prop_assert_eq!(job.status, JobStatus::Completed);
    }

    #[test]
    fn guarded_transition_sequences_preserve_the_invariant(
        ops in prop::collection::vec((0usize..4, arb_status()), 0..16)
    ) {
        let mut job = diamond_job();

        for (index, target) in ops {
            let id = sid(IDS[index]);
            let legal = {
                let workflow = job.steps[0].workflow().unwrap();
                guards::validate(&id, target, workflow).is_ok()
            };
            if legal {
                apply_transition(&mut job, &id, target);
                recalculate_job(&mut job);
                let workflow = job.steps[0].workflow().unwrap();
                prop_assert!(guards::verify_integrity(workflow).is_ok());
            }
        }
    }
}
