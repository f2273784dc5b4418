use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::graph::DependencyGraph;
use crate::models::core::ids::{PhaseId, SubStepId};
use crate::models::core::sub_step::SubStep;
use crate::state_machine::states::{PhaseStatus, SubStepStatus};

/// Pointer to the first phase still doing work, or the terminal sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "phase", rename_all = "snake_case")]
pub enum CurrentPhase {
    /// The named phase is the first one that is not yet completed
    Phase(PhaseId),
    /// Every phase is completed
    Completed,
}

/// An ordinal grouping of sub-steps within a workflow.
///
/// Status is always derived from the sub-steps by the status cascade; nothing
/// sets it directly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Phase {
    pub id: PhaseId,
    /// Ordinal position within the workflow
    pub position: u32,
    pub status: PhaseStatus,
    pub sub_steps: BTreeMap<SubStepId, SubStep>,
}

impl Phase {
    pub fn new(id: PhaseId, position: u32) -> Self {
        Self {
            id,
            position,
            status: PhaseStatus::Pending,
            sub_steps: BTreeMap::new(),
        }
    }
}

/// The dependency-graph-structured body of a composite step.
///
/// Owns the open key/value context that sub-steps write results into and
/// later sub-steps read, plus an immutable copy of the dependency graph built
/// from configuration when the job was created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubStepWorkflow {
    pub current_phase: CurrentPhase,
    pub context: Map<String, Value>,
    /// Phases ordered by ordinal position
    pub phases: Vec<Phase>,
    pub graph: DependencyGraph,
}

impl SubStepWorkflow {
    /// Create a workflow over the given phases; `phases` must already be in
    /// ordinal order.
    pub fn new(phases: Vec<Phase>, graph: DependencyGraph) -> Self {
        let current_phase = phases
            .first()
            .map(|p| CurrentPhase::Phase(p.id.clone()))
            .unwrap_or(CurrentPhase::Completed);
        Self {
            current_phase,
            context: Map::new(),
            phases,
            graph,
        }
    }

    /// Look up a sub-step anywhere in the workflow
    pub fn sub_step(&self, id: &SubStepId) -> Option<&SubStep> {
        self.phases.iter().find_map(|phase| phase.sub_steps.get(id))
    }

    /// Mutable lookup of a sub-step anywhere in the workflow
    pub fn sub_step_mut(&mut self, id: &SubStepId) -> Option<&mut SubStep> {
        self.phases
            .iter_mut()
            .find_map(|phase| phase.sub_steps.get_mut(id))
    }

    /// Current status of a sub-step, if it exists
    pub fn status_of(&self, id: &SubStepId) -> Option<SubStepStatus> {
        self.sub_step(id).map(|s| s.status)
    }

    /// Iterate over every sub-step across all phases
    pub fn sub_steps(&self) -> impl Iterator<Item = &SubStep> {
        self.phases.iter().flat_map(|phase| phase.sub_steps.values())
    }

    /// Look up a phase by id
    pub fn phase(&self, id: &PhaseId) -> Option<&Phase> {
        self.phases.iter().find(|phase| &phase.id == id)
    }

    /// Record a completion result payload for a sub-step.
    ///
    /// Object payloads are merged key-by-key into the workflow context and
    /// the written keys are remembered on the sub-step so a later reset can
    /// withdraw them. Non-object payloads are stored under the sub-step id.
    pub fn merge_result(&mut self, id: &SubStepId, payload: Value) {
        let mut written = Vec::new();
        match &payload {
            Value::Object(fields) => {
                for (key, value) in fields {
                    self.context.insert(key.clone(), value.clone());
                    written.push(key.clone());
                }
            }
            other => {
                self.context.insert(id.as_str().to_string(), other.clone());
                written.push(id.as_str().to_string());
            }
        }
        if let Some(sub_step) = self
            .phases
            .iter_mut()
            .find_map(|phase| phase.sub_steps.get_mut(id))
        {
            sub_step.result = Some(payload);
            sub_step.context_keys = written;
        }
    }

    /// Remove the context entries a sub-step had written
    pub fn withdraw_context(&mut self, id: &SubStepId) {
        let keys = self
            .sub_step(id)
            .map(|s| s.context_keys.clone())
            .unwrap_or_default();
        for key in keys {
            self.context.remove(&key);
        }
    }
}
