use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::core::ids::{JobId, SubStepId};
use crate::models::core::step::Step;
use crate::state_machine::states::JobStatus;

/// One onboarding run: the full nested tree persisted as a single aggregate.
///
/// Mutated only by the status cascade (automated path) or explicit operator
/// action; the whole tree serializes as one document so callers can store it
/// atomically per recalculation round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    /// Ordered list of top-level stages
    pub steps: Vec<Step>,
    /// Index of the first step that has not completed
    pub current_step: usize,
    pub status: JobStatus,
    /// Set by an operator; honored between execution rounds
    pub cancel_requested: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Create a job over the given steps, everything pending
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            name: name.into(),
            steps,
            current_step: 0,
            status: JobStatus::Pending,
            cancel_requested: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// The step the job is currently working through
    pub fn active_step(&self) -> Option<&Step> {
        self.steps.get(self.current_step)
    }

    /// Find the composite step whose workflow contains the given sub-step
    pub fn step_owning_sub_step(&self, id: &SubStepId) -> Option<&Step> {
        self.steps
            .iter()
            .find(|step| step.workflow().is_some_and(|wf| wf.sub_step(id).is_some()))
    }

    /// Mutable variant of [`Self::step_owning_sub_step`]
    pub fn step_owning_sub_step_mut(&mut self, id: &SubStepId) -> Option<&mut Step> {
        self.steps
            .iter_mut()
            .find(|step| step.workflow().is_some_and(|wf| wf.sub_step(id).is_some()))
    }

    /// Record that the aggregate changed
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
