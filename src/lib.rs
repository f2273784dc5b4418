//! # Onboard Core
//!
//! Workflow orchestration core for long-running onboarding automation.
//!
//! ## Overview
//!
//! An onboarding run is a job composed of many external, fallible actions:
//! browser-driven portal configuration, network calls, data imports. This
//! crate provides the two subsystems that make such a run resumable and
//! trustworthy:
//!
//! 1. A **dependency-aware, multi-phase workflow engine** that tracks a job's
//!    progress as a directed graph of sub-steps, derives phase/step/job
//!    status from leaf status, supports operator override, cascades resets
//!    through dependents, and resumes a partially completed job from the
//!    correct point.
//! 2. A **resilient execution layer** that classifies failures of external
//!    calls as transient or permanent and retries transient failures with
//!    bounded exponential backoff, so a flaky network never corrupts the
//!    workflow's state machine.
//!
//! Everything else (HTTP routes, UI, portal scripts, notifications) lives
//! behind the [`orchestration::ActionExecutor`] seam.
//!
//! ## Module Organization
//!
//! - [`models`] - Job aggregate (steps, workflows, phases, sub-steps) and
//!   the templates jobs are built from
//! - [`graph`] - Immutable sub-step dependency graph
//! - [`state_machine`] - Status definitions, events and the transition
//!   validator
//! - [`orchestration`] - Cascade, planner, reset, retry and the coordinator
//! - [`events`] - Lifecycle event publishing
//! - [`registry`] - Cross-job state store, one lock per job
//! - [`config`] - Layered configuration loading
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use onboard_core::config::OnboardConfig;
//! use onboard_core::models::{JobTemplate, PhaseTemplate, StepTemplate, SubStepTemplate};
//! use onboard_core::orchestration::{ActionExecutor, JobCoordinator};
//! use std::sync::Arc;
//!
//! # async fn example(executor: Arc<dyn ActionExecutor>) -> Result<(), Box<dyn std::error::Error>> {
//! let config = OnboardConfig::load()?;
//! let coordinator = JobCoordinator::new(executor, config);
//!
//! let template = JobTemplate::new(
//!     "merchant_onboarding",
//!     vec![StepTemplate::Composite {
//!         name: "portal_setup".to_string(),
//!         phases: vec![PhaseTemplate::new(
//!             "account",
//!             vec![SubStepTemplate::new("create_account")],
//!         )],
//!     }],
//! );
//!
//! let job = coordinator.start_job(&template).await?;
//! let report = coordinator.resume(&job.id).await?;
//! println!("finished with {:?}", report.outcome);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod events;
pub mod graph;
pub mod models;
pub mod orchestration;
pub mod registry;
pub mod state_machine;

pub use config::{BackoffConfig, ConfigurationError, ExecutionConfig, OnboardConfig, TelemetryConfig};
pub use error::{OnboardError, Result};
pub use events::{EventPublisher, PublishedEvent};
pub use graph::{DependencyGraph, GraphError};
pub use models::{Job, JobId, JobTemplate, PhaseId, SubStepId};
pub use orchestration::{
    ActionError, ActionExecutor, JobCoordinator, OrchestrationError, ResumeOutcome,
};
pub use registry::JobRegistry;
pub use state_machine::{JobStatus, PhaseStatus, StepStatus, SubStepStatus};
