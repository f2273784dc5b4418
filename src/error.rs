use std::fmt;

use crate::config::ConfigurationError;
use crate::graph::GraphError;
use crate::models::template::TemplateError;
use crate::orchestration::errors::OrchestrationError;

/// Coarse crate-level error for callers that do not need the full typed
/// taxonomy; see `orchestration::errors` for the precise variants.
#[derive(Debug, Clone, PartialEq)]
pub enum OnboardError {
    OrchestrationError(String),
    StateTransitionError(String),
    ValidationError(String),
    ConfigurationError(String),
}

impl fmt::Display for OnboardError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OnboardError::OrchestrationError(msg) => write!(f, "Orchestration error: {msg}"),
            OnboardError::StateTransitionError(msg) => write!(f, "State transition error: {msg}"),
            OnboardError::ValidationError(msg) => write!(f, "Validation error: {msg}"),
            OnboardError::ConfigurationError(msg) => write!(f, "Configuration error: {msg}"),
        }
    }
}

impl std::error::Error for OnboardError {}

impl From<OrchestrationError> for OnboardError {
    fn from(err: OrchestrationError) -> Self {
        match err {
            OrchestrationError::DependencyNotSatisfied { .. }
            | OrchestrationError::WorkflowCorruption { .. } => {
                Self::StateTransitionError(err.to_string())
            }
            OrchestrationError::Template(_) => Self::ValidationError(err.to_string()),
            other => Self::OrchestrationError(other.to_string()),
        }
    }
}

impl From<TemplateError> for OnboardError {
    fn from(err: TemplateError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<GraphError> for OnboardError {
    fn from(err: GraphError) -> Self {
        Self::ValidationError(err.to_string())
    }
}

impl From<ConfigurationError> for OnboardError {
    fn from(err: ConfigurationError) -> Self {
        Self::ConfigurationError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OnboardError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::core::ids::SubStepId;
    use crate::state_machine::states::SubStepStatus;

    #[test]
    fn test_orchestration_error_coarsening() {
        let err: OnboardError = OrchestrationError::DependencyNotSatisfied {
            sub_step: SubStepId::from("configure_portal"),
            target: SubStepStatus::Completed,
            blocking: vec![SubStepId::from("create_account")],
        }
        .into();
        assert!(matches!(err, OnboardError::StateTransitionError(_)));
        assert!(err.to_string().contains("create_account"));
    }

    #[test]
    fn test_template_error_coarsening() {
        let err: OnboardError = TemplateError::NoSteps.into();
        assert!(matches!(err, OnboardError::ValidationError(_)));
    }
}
