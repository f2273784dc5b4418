//! Job templates: the static configuration `start_job` consumes.
//!
//! A template names the ordered steps of a job and, for composite steps, the
//! phases, sub-steps and dependency declarations of the sub-step workflow.
//! Building a job validates the template and constructs the immutable
//! dependency graph exactly once.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::graph::{DependencyGraph, GraphError};
use crate::models::core::ids::{PhaseId, SubStepId};
use crate::models::core::job::Job;
use crate::models::core::step::Step;
use crate::models::core::sub_step::SubStep;
use crate::models::core::workflow::{Phase, SubStepWorkflow};

/// Errors raised while validating a job template
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Job template has no steps")]
    NoSteps,

    #[error("Composite step '{step}' declares no phases")]
    EmptyWorkflow { step: String },

    #[error("Duplicate phase id '{phase}' in step '{step}'")]
    DuplicatePhase { step: String, phase: PhaseId },

    #[error(
        "Sub-step '{sub_step}' in phase '{phase}' depends on '{dependency}' in a later phase"
    )]
    ForwardDependency {
        sub_step: SubStepId,
        phase: PhaseId,
        dependency: SubStepId,
    },

    #[error(transparent)]
    Graph(#[from] GraphError),
}

/// Declaration of one sub-step in a phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubStepTemplate {
    pub id: SubStepId,
    /// Sub-steps that must be completed or skipped before this one runs
    #[serde(default)]
    pub depends_on: Vec<SubStepId>,
    /// Overrides the configured default when present
    #[serde(default)]
    pub retry_limit: Option<u32>,
}

impl SubStepTemplate {
    pub fn new(id: impl Into<SubStepId>) -> Self {
        Self {
            id: id.into(),
            depends_on: Vec::new(),
            retry_limit: None,
        }
    }

    pub fn depends_on(mut self, deps: impl IntoIterator<Item = SubStepId>) -> Self {
        self.depends_on = deps.into_iter().collect();
        self
    }

    pub fn retry_limit(mut self, limit: u32) -> Self {
        self.retry_limit = Some(limit);
        self
    }
}

/// Declaration of one ordinal phase
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PhaseTemplate {
    pub id: PhaseId,
    pub sub_steps: Vec<SubStepTemplate>,
}

impl PhaseTemplate {
    pub fn new(id: impl Into<PhaseId>, sub_steps: Vec<SubStepTemplate>) -> Self {
        Self {
            id: id.into(),
            sub_steps,
        }
    }
}

/// Declaration of one top-level step
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepTemplate {
    /// Single Action Executor call
    Atomic { name: String },
    /// Sub-step workflow with phases and dependencies
    Composite {
        name: String,
        phases: Vec<PhaseTemplate>,
    },
}

impl StepTemplate {
    pub fn name(&self) -> &str {
        match self {
            Self::Atomic { name } | Self::Composite { name, .. } => name,
        }
    }
}

/// Full declaration of a job
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobTemplate {
    pub name: String,
    pub steps: Vec<StepTemplate>,
}

impl JobTemplate {
    pub fn new(name: impl Into<String>, steps: Vec<StepTemplate>) -> Self {
        Self {
            name: name.into(),
            steps,
        }
    }

    /// Validate the template and build a job with every leaf pending.
    pub fn build(&self, default_retry_limit: u32) -> Result<Job, TemplateError> {
        if self.steps.is_empty() {
            return Err(TemplateError::NoSteps);
        }

        let mut steps = Vec::with_capacity(self.steps.len());
        for template in &self.steps {
            match template {
                StepTemplate::Atomic { name } => steps.push(Step::atomic(name.clone())),
                StepTemplate::Composite { name, phases } => {
                    let workflow = build_workflow(name, phases, default_retry_limit)?;
                    steps.push(Step::composite(name.clone(), workflow));
                }
            }
        }

        Ok(Job::new(self.name.clone(), steps))
    }
}

fn build_workflow(
    step_name: &str,
    phases: &[PhaseTemplate],
    default_retry_limit: u32,
) -> Result<SubStepWorkflow, TemplateError> {
    if phases.is_empty() {
        return Err(TemplateError::EmptyWorkflow {
            step: step_name.to_string(),
        });
    }

    let mut seen_phases = std::collections::BTreeSet::new();
    for phase in phases {
        if !seen_phases.insert(phase.id.clone()) {
            return Err(TemplateError::DuplicatePhase {
                step: step_name.to_string(),
                phase: phase.id.clone(),
            });
        }
    }

    let mut builder = DependencyGraph::builder();
    for phase in phases {
        for sub_step in &phase.sub_steps {
            builder = builder.sub_step(
                sub_step.id.clone(),
                phase.id.clone(),
                sub_step.depends_on.iter().cloned(),
            );
        }
    }
    let graph = builder.build()?;

    // Dependencies may only point at the same or an earlier phase; ordering
    // across phases is carried entirely by these edges.
    let mut phase_position = std::collections::BTreeMap::new();
    for (position, phase) in phases.iter().enumerate() {
        for sub_step in &phase.sub_steps {
            phase_position.insert(sub_step.id.clone(), (position, phase.id.clone()));
        }
    }
    for phase in phases {
        for sub_step in &phase.sub_steps {
            let own = phase_position.get(&sub_step.id);
            for dep in &sub_step.depends_on {
                if let (Some((own_pos, own_phase)), Some((dep_pos, _))) =
                    (own, phase_position.get(dep))
                {
                    if dep_pos > own_pos {
                        return Err(TemplateError::ForwardDependency {
                            sub_step: sub_step.id.clone(),
                            phase: own_phase.clone(),
                            dependency: dep.clone(),
                        });
                    }
                }
            }
        }
    }

    let mut built_phases = Vec::with_capacity(phases.len());
    for (position, phase) in phases.iter().enumerate() {
        let mut built = Phase::new(phase.id.clone(), position as u32);
        for sub_step in &phase.sub_steps {
            let retry_limit = sub_step.retry_limit.unwrap_or(default_retry_limit);
            built.sub_steps.insert(
                sub_step.id.clone(),
                SubStep::new(sub_step.id.clone(), retry_limit),
            );
        }
        built_phases.push(built);
    }

    Ok(SubStepWorkflow::new(built_phases, graph))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::workflow::CurrentPhase;
    use crate::state_machine::states::{JobStatus, SubStepStatus};

    fn sid(s: &str) -> SubStepId {
        SubStepId::from(s)
    }

    fn portal_template() -> JobTemplate {
        JobTemplate::new(
            "onboarding",
            vec![
                StepTemplate::Atomic {
                    name: "collect_details".to_string(),
                },
                StepTemplate::Composite {
                    name: "portal_setup".to_string(),
                    phases: vec![
                        PhaseTemplate::new(
                            "account",
                            vec![
                                SubStepTemplate::new("create_account"),
                                SubStepTemplate::new("verify_email").retry_limit(5),
                            ],
                        ),
                        PhaseTemplate::new(
                            "configure",
                            vec![SubStepTemplate::new("configure_portal")
                                .depends_on([sid("create_account")])],
                        ),
                    ],
                },
            ],
        )
    }

    #[test]
    fn test_build_initializes_everything_pending() {
        let job = portal_template().build(3).unwrap();
        assert_eq!(job.status, JobStatus::Pending);
        assert_eq!(job.current_step, 0);
        assert_eq!(job.steps.len(), 2);

        let workflow = job.steps[1].workflow().unwrap();
        assert_eq!(
            workflow.current_phase,
            CurrentPhase::Phase(PhaseId::from("account"))
        );
        for sub_step in workflow.sub_steps() {
            assert_eq!(sub_step.status, SubStepStatus::Pending);
        }
        assert_eq!(
            workflow.sub_step(&sid("verify_email")).unwrap().retry_limit,
            5
        );
        assert_eq!(
            workflow.sub_step(&sid("create_account")).unwrap().retry_limit,
            3
        );
    }

    #[test]
    fn test_empty_template_rejected() {
        let template = JobTemplate::new("empty", vec![]);
        assert!(matches!(template.build(3), Err(TemplateError::NoSteps)));
    }

    #[test]
    fn test_empty_composite_rejected() {
        let template = JobTemplate::new(
            "bad",
            vec![StepTemplate::Composite {
                name: "portal_setup".to_string(),
                phases: vec![],
            }],
        );
        assert!(matches!(
            template.build(3),
            Err(TemplateError::EmptyWorkflow { .. })
        ));
    }

    #[test]
    fn test_forward_dependency_rejected() {
        let template = JobTemplate::new(
            "bad",
            vec![StepTemplate::Composite {
                name: "portal_setup".to_string(),
                phases: vec![
                    PhaseTemplate::new(
                        "account",
                        vec![SubStepTemplate::new("create_account")
                            .depends_on([sid("configure_portal")])],
                    ),
                    PhaseTemplate::new(
                        "configure",
                        vec![SubStepTemplate::new("configure_portal")],
                    ),
                ],
            }],
        );
        assert!(matches!(
            template.build(3),
            Err(TemplateError::ForwardDependency { .. })
        ));
    }
}
