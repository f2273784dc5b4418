//! # Orchestration Engine
//!
//! The orchestration core: dependency-aware workflow progression plus a
//! resilient execution layer for fallible external actions.
//!
//! ## Core Components
//!
//! - **JobCoordinator**: the surface the Job Controller drives (start,
//!   resume, manual transition, reset, cancel, status)
//! - **Resume Planner**: readiness-frontier discovery over the dependency
//!   graph
//! - **Status Cascade**: derives phase, step and job status from leaf status
//! - **Reset Cascade**: transitive dependent invalidation with operator
//!   preview
//! - **Retry Executor + Error Classifier**: transient/permanent split with
//!   bounded exponential backoff
//!
//! Automated progress flows planner -> retry executor -> cascade; operator
//! correction flows validator -> cascade -> reset cascade. Both converge on
//! the same job aggregate.

pub mod cascade;
pub mod coordinator;
pub mod error_classifier;
pub mod errors;
pub mod executor;
pub mod reset;
pub mod resume_planner;
pub mod retry_executor;

pub use cascade::{
    derive_phase_status, derive_step_status, recalculate_job, recalculate_workflow,
    CascadeReport, PhaseChange, StepChange,
};
pub use coordinator::{
    JobCoordinator, ResumeOutcome, ResumeReport, RoundHalt, RoundReport,
};
pub use error_classifier::{classify, FailureClass};
pub use errors::{OrchestrationError, OrchestrationResult};
pub use executor::{ActionError, ActionErrorKind, ActionExecutor};
pub use reset::{ResetPlan, ResetReport};
pub use resume_planner::{next_eligible, readiness_summary, ReadinessSummary};
pub use retry_executor::{RetryError, RetryExecutor, RetryPolicy, RetrySuccess};
