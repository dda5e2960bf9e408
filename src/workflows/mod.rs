// Workflow orchestration: shared error model plus the read-decide-save
// coordinator that drives both engines against a store

pub mod coordinator;
pub mod errors;

pub use coordinator::{CoordinatorError, DecisionOutcome, WorkflowCoordinator};
pub use errors::{ErrorDisposition, WorkflowError};
