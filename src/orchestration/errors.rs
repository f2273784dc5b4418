//! # Orchestration Errors
//!
//! Typed error taxonomy for the orchestration core. The split between
//! [`OrchestrationError::TransientExecution`] and
//! [`OrchestrationError::PermanentExecution`] propagates all the way to the
//! Job Controller: a temporarily unavailable service must never be recorded
//! as a genuine failure.

use thiserror::Error;

use crate::models::core::ids::{JobId, SubStepId};
use crate::models::template::TemplateError;
use crate::orchestration::executor::ActionError;
use crate::orchestration::retry_executor::RetryError;
use crate::state_machine::states::{JobStatus, SubStepStatus};

fn join_ids(ids: &[SubStepId]) -> String {
    ids.iter()
        .map(|id| id.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Errors surfaced by the orchestration core
#[derive(Debug, Error)]
pub enum OrchestrationError {
    /// Retries exhausted on a transient failure; safe to retry later
    #[error("temporarily unavailable after {attempts} attempt(s): {error}")]
    TransientExecution { error: ActionError, attempts: u32 },

    /// The action genuinely failed; requires a status change to failed
    #[error("permanent execution failure: {error}")]
    PermanentExecution { error: ActionError },

    /// An operator or caller requested an illegal transition
    #[error(
        "cannot move sub-step '{sub_step}' to {target}: blocked by unsatisfied dependencies [{}]",
        join_ids(.blocking)
    )]
    DependencyNotSatisfied {
        sub_step: SubStepId,
        target: SubStepStatus,
        blocking: Vec<SubStepId>,
    },

    /// The safety invariant was violated on a persisted tree
    #[error(
        "workflow corruption: sub-step '{sub_step}' is {status} but dependency '{dependency}' is {dependency_status}"
    )]
    WorkflowCorruption {
        sub_step: SubStepId,
        status: SubStepStatus,
        dependency: SubStepId,
        dependency_status: SubStepStatus,
    },

    /// The named sub-step does not exist in the job's workflows
    #[error("unknown sub-step '{0}'")]
    UnknownSubStep(SubStepId),

    /// The named job is not registered
    #[error("job {0} not found")]
    JobNotFound(JobId),

    /// The job's status does not permit the requested operation
    #[error("job {job_id} is {status} and cannot accept the requested operation")]
    InvalidJobState { job_id: JobId, status: JobStatus },

    /// Template validation failed while starting a job
    #[error(transparent)]
    Template(#[from] TemplateError),
}

impl From<RetryError> for OrchestrationError {
    fn from(err: RetryError) -> Self {
        match err {
            RetryError::Permanent { error, .. } => Self::PermanentExecution { error },
            RetryError::Exhausted { error, attempts } => {
                Self::TransientExecution { error, attempts }
            }
        }
    }
}

pub type OrchestrationResult<T> = Result<T, OrchestrationError>;
