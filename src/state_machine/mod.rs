//! State machine foundations: status definitions, transition events and the
//! transition validator that protects the dependency invariant.

pub mod events;
pub mod guards;
pub mod states;

pub use events::SubStepEvent;
pub use states::{JobStatus, PhaseStatus, StepStatus, SubStepStatus};
