use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::core::workflow::SubStepWorkflow;
use crate::state_machine::states::StepStatus;

/// Execution body of a step: a single external action, or a sub-step graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepBody {
    /// One Action Executor call, no sub-graph
    Atomic {
        attempts: u32,
        error: Option<String>,
        result: Option<Value>,
    },
    /// Owns a dependency-graph workflow; status is always derived from it
    Composite { workflow: SubStepWorkflow },
}

/// One top-level stage of a job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub status: StepStatus,
    pub body: StepBody,
}

impl Step {
    /// Create an atomic step in its initial state
    pub fn atomic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            body: StepBody::Atomic {
                attempts: 0,
                error: None,
                result: None,
            },
        }
    }

    /// Create a composite step owning the given workflow
    pub fn composite(name: impl Into<String>, workflow: SubStepWorkflow) -> Self {
        Self {
            name: name.into(),
            status: StepStatus::Pending,
            body: StepBody::Composite { workflow },
        }
    }

    pub fn is_composite(&self) -> bool {
        matches!(self.body, StepBody::Composite { .. })
    }

    /// The owned workflow, when this step is composite
    pub fn workflow(&self) -> Option<&SubStepWorkflow> {
        match &self.body {
            StepBody::Composite { workflow } => Some(workflow),
            StepBody::Atomic { .. } => None,
        }
    }

    /// Mutable access to the owned workflow, when this step is composite
    pub fn workflow_mut(&mut self) -> Option<&mut SubStepWorkflow> {
        match &mut self.body {
            StepBody::Composite { workflow } => Some(workflow),
            StepBody::Atomic { .. } => None,
        }
    }
}
