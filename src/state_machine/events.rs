use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::state_machine::states::SubStepStatus;

/// Events that drive sub-step state transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SubStepEvent {
    /// Begin executing the sub-step
    Start,
    /// Mark the sub-step complete with an optional result payload
    Complete(Option<Value>),
    /// Mark the sub-step permanently failed with error detail
    Fail(String),
    /// Record a transient failure and await another attempt
    Retry(String),
    /// Skip the sub-step (operator decision)
    Skip,
    /// Return the sub-step to pending
    Reset,
}

impl SubStepEvent {
    /// String form of the event type for logging
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete(_) => "complete",
            Self::Fail(_) => "fail",
            Self::Retry(_) => "retry",
            Self::Skip => "skip",
            Self::Reset => "reset",
        }
    }

    /// Status this event moves the sub-step into
    pub fn target_status(&self) -> SubStepStatus {
        match self {
            Self::Start => SubStepStatus::InProgress,
            Self::Complete(_) => SubStepStatus::Completed,
            Self::Fail(_) => SubStepStatus::Failed,
            Self::Retry(_) => SubStepStatus::Retrying,
            Self::Skip => SubStepStatus::Skipped,
            Self::Reset => SubStepStatus::Pending,
        }
    }

    /// Extract error detail if this is a failure or retry event
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Fail(msg) | Self::Retry(msg) => Some(msg),
            _ => None,
        }
    }

    /// Extract the result payload if this is a completion event
    pub fn results(&self) -> Option<&Value> {
        match self {
            Self::Complete(results) => results.as_ref(),
            _ => None,
        }
    }

    /// Create a failure event with the given error detail
    pub fn fail_with_error(error: impl Into<String>) -> Self {
        Self::Fail(error.into())
    }

    /// Create a completion event with a result payload
    pub fn complete_with_results(results: Value) -> Self {
        Self::Complete(Some(results))
    }
}
