// Expense approval pipeline - three ordered gates
//
// Engine and projection are pure; persistence, identity and rendering live
// with the caller.

pub mod types;
pub mod engine;
pub mod projection;

#[cfg(test)]
pub mod tests;

pub use types::{
    ApprovalGate, DisplayStatus, ExpenseAction, ExpenseWorkflow, GateState, Gates, Role, StatusKind,
};
pub use engine::{apply, edit_locked};
pub use projection::{filter_by_status, project};
