use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::core::ids::SubStepId;
use crate::state_machine::states::SubStepStatus;

/// A leaf unit of work inside a composite step's workflow.
///
/// Sub-steps carry their own attempt counter and error detail so that a
/// partially completed workflow can resume from the correct point. The
/// `context_keys` list records which workflow context entries this sub-step
/// produced, so a reset can withdraw them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubStep {
    /// Identifier, unique within the owning workflow
    pub id: SubStepId,
    /// Current execution status
    pub status: SubStepStatus,
    /// Number of execution attempts so far
    pub attempts: u32,
    /// Maximum automated attempts before the sub-step stops retrying
    pub retry_limit: u32,
    /// Error detail from the most recent failure
    pub error: Option<String>,
    /// Result payload produced on completion
    pub result: Option<Value>,
    /// Workflow context keys written by this sub-step
    pub context_keys: Vec<String>,
    /// When execution first started
    pub started_at: Option<DateTime<Utc>>,
    /// When the sub-step reached completed, failed or skipped
    pub finished_at: Option<DateTime<Utc>>,
    /// When the most recent failure was recorded
    pub last_failure_at: Option<DateTime<Utc>>,
}

impl SubStep {
    /// Create a new pending sub-step
    pub fn new(id: SubStepId, retry_limit: u32) -> Self {
        Self {
            id,
            status: SubStepStatus::Pending,
            attempts: 0,
            retry_limit,
            error: None,
            result: None,
            context_keys: Vec::new(),
            started_at: None,
            finished_at: None,
            last_failure_at: None,
        }
    }

    /// Check if automated retries remain for this sub-step
    pub fn retry_eligible(&self) -> bool {
        self.attempts < self.retry_limit
    }

    /// Return the sub-step to its initial pending state.
    ///
    /// Clears attempts, error detail, result payload and recorded context
    /// keys. Used by the reset cascade; callers are responsible for removing
    /// the recorded keys from the workflow context first.
    pub fn reset(&mut self) {
        self.status = SubStepStatus::Pending;
        self.attempts = 0;
        self.error = None;
        self.result = None;
        self.context_keys.clear();
        self.started_at = None;
        self.finished_at = None;
        self.last_failure_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_sub_step_is_pending() {
        let sub_step = SubStep::new(SubStepId::from("create_account"), 3);
        assert_eq!(sub_step.status, SubStepStatus::Pending);
        assert_eq!(sub_step.attempts, 0);
        assert!(sub_step.retry_eligible());
    }

    #[test]
    fn test_retry_eligibility_bounds() {
        let mut sub_step = SubStep::new(SubStepId::from("import_menu"), 2);
        sub_step.attempts = 1;
        assert!(sub_step.retry_eligible());
        sub_step.attempts = 2;
        assert!(!sub_step.retry_eligible());
    }

    #[test]
    fn test_reset_clears_execution_detail() {
        let mut sub_step = SubStep::new(SubStepId::from("configure_portal"), 3);
        sub_step.status = SubStepStatus::Completed;
        sub_step.attempts = 2;
        sub_step.error = Some("stale".to_string());
        sub_step.result = Some(serde_json::json!({"portal_id": 7}));
        sub_step.context_keys.push("portal_id".to_string());
        sub_step.finished_at = Some(Utc::now());

        sub_step.reset();

        assert_eq!(sub_step.status, SubStepStatus::Pending);
        assert_eq!(sub_step.attempts, 0);
        assert!(sub_step.error.is_none());
        assert!(sub_step.result.is_none());
        assert!(sub_step.context_keys.is_empty());
        assert!(sub_step.finished_at.is_none());
    }
}
