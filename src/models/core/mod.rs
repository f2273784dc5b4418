pub mod ids;
pub mod job;
pub mod step;
pub mod sub_step;
pub mod workflow;
