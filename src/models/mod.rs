//! Data model for the orchestration core.
//!
//! The aggregate is one [`core::job::Job`] tree (steps, workflows, phases,
//! sub-steps) that serializes as a single document; templates describe the
//! static configuration the tree is built from.

pub mod core;
pub mod template;

pub use self::core::ids::{JobId, PhaseId, SubStepId};
pub use self::core::job::Job;
pub use self::core::step::{Step, StepBody};
pub use self::core::sub_step::SubStep;
pub use self::core::workflow::{CurrentPhase, Phase, SubStepWorkflow};
pub use template::{JobTemplate, PhaseTemplate, StepTemplate, SubStepTemplate, TemplateError};
