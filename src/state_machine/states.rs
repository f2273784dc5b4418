use serde::{Deserialize, Serialize};
use std::fmt;

/// Job state definitions for one onboarding run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Initial state when the job is created
    Pending,
    /// Job is currently being executed
    InProgress,
    /// Job completed successfully
    Completed,
    /// Job was terminated as unrecoverable by an operator
    Failed,
    /// Automated progress halted, needs operator attention
    ActionRequired,
    /// Job was cancelled by an operator
    Cancelled,
}

impl JobStatus {
    /// Check if this is a terminal state (no further transitions allowed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Check if automated progress is halted pending operator action
    pub fn needs_operator(&self) -> bool {
        matches!(self, Self::ActionRequired | Self::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::ActionRequired => write!(f, "action_required"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "action_required" => Ok(Self::ActionRequired),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(format!("Invalid job status: {s}")),
        }
    }
}

/// Step state definitions for one top-level stage of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Initial state when the step is created
    Pending,
    /// Step is currently being executed
    InProgress,
    /// Step completed successfully
    Completed,
    /// Step failed with an error
    Failed,
}

impl StepStatus {
    /// Check if this step has finished successfully
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed)
    }

    /// Check if this step halted on a failure
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for StepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid step status: {s}")),
        }
    }
}

/// Phase state definitions, always derived from sub-step states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseStatus {
    /// No sub-step has started
    Pending,
    /// At least one sub-step is active, or the phase is partially done
    InProgress,
    /// Every sub-step is completed or skipped
    Completed,
    /// At least one sub-step failed and none are active
    Failed,
}

impl PhaseStatus {
    /// Check if this phase no longer blocks the current-phase pointer
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::Completed)
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for PhaseStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            _ => Err(format!("Invalid phase status: {s}")),
        }
    }
}

/// Sub-step state definitions for a leaf unit of work
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubStepStatus {
    /// Initial state when the sub-step is created
    Pending,
    /// Sub-step is currently being executed
    InProgress,
    /// Sub-step hit a transient failure and is awaiting another attempt
    Retrying,
    /// Sub-step completed successfully
    Completed,
    /// Sub-step failed permanently
    Failed,
    /// Sub-step was skipped by an operator
    Skipped,
}

impl SubStepStatus {
    /// Check if this sub-step satisfies dependencies for other sub-steps
    pub fn satisfies_dependencies(&self) -> bool {
        matches!(self, Self::Completed | Self::Skipped)
    }

    /// Check if this is an active state (sub-step is being processed)
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::Retrying)
    }

    /// Check if this sub-step failed permanently
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

impl fmt::Display for SubStepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::InProgress => write!(f, "in_progress"),
            Self::Retrying => write!(f, "retrying"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

impl std::str::FromStr for SubStepStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "in_progress" => Ok(Self::InProgress),
            "retrying" => Ok(Self::Retrying),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            _ => Err(format!("Invalid sub-step status: {s}")),
        }
    }
}

/// Default state for new jobs
impl Default for JobStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Default state for new steps
impl Default for StepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Default state for new phases
impl Default for PhaseStatus {
    fn default() -> Self {
        Self::Pending
    }
}

/// Default state for new sub-steps
impl Default for SubStepStatus {
    fn default() -> Self {
        Self::Pending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_status_terminal_check() {
        assert!(JobStatus::Completed.is_terminal());
        assert!(JobStatus::Cancelled.is_terminal());
        assert!(!JobStatus::Failed.is_terminal());
        assert!(!JobStatus::ActionRequired.is_terminal());
        assert!(!JobStatus::Pending.is_terminal());
        assert!(!JobStatus::InProgress.is_terminal());
    }

    #[test]
    fn test_sub_step_dependency_satisfaction() {
        assert!(SubStepStatus::Completed.satisfies_dependencies());
        assert!(SubStepStatus::Skipped.satisfies_dependencies());
        assert!(!SubStepStatus::Pending.satisfies_dependencies());
        assert!(!SubStepStatus::InProgress.satisfies_dependencies());
        assert!(!SubStepStatus::Retrying.satisfies_dependencies());
        assert!(!SubStepStatus::Failed.satisfies_dependencies());
    }

    #[test]
    fn test_sub_step_active_check() {
        assert!(SubStepStatus::InProgress.is_active());
        assert!(SubStepStatus::Retrying.is_active());
        assert!(!SubStepStatus::Completed.is_active());
        assert!(!SubStepStatus::Pending.is_active());
    }

    #[test]
    fn test_status_string_conversion() {
        assert_eq!(JobStatus::ActionRequired.to_string(), "action_required");
        assert_eq!(
            "action_required".parse::<JobStatus>().unwrap(),
            JobStatus::ActionRequired
        );

        assert_eq!(SubStepStatus::Retrying.to_string(), "retrying");
        assert_eq!(
            "retrying".parse::<SubStepStatus>().unwrap(),
            SubStepStatus::Retrying
        );
    }

    #[test]
    fn test_status_serde() {
        let status = SubStepStatus::InProgress;
        let json = serde_json::to_string(&status).unwrap();
        assert_eq!(json, "\"in_progress\"");

        let parsed: SubStepStatus = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, status);
    }
}
