use thiserror::Error;

use crate::approval::{ApprovalGate, GateState, Role};
use crate::ticket::TicketState;

/// Typed rejection from either workflow engine.
///
/// Engine errors are local and pure: nothing was mutated, and re-running the
/// same input yields the same error. None of them is retryable.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WorkflowError {
    #[error("Unknown approval gate: {0}")]
    UnknownGate(String),

    #[error("Unknown workflow state: {0}")]
    UnknownState(String),

    #[error("Unknown role: {0}")]
    UnknownRole(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Role {role} may not decide the {gate} gate (requires {required})")]
    Unauthorized {
        gate: ApprovalGate,
        role: Role,
        required: Role,
    },

    #[error("{gate} gate cannot be decided while the {blocking} gate is {blocking_state}")]
    OutOfOrder {
        gate: ApprovalGate,
        blocking: ApprovalGate,
        blocking_state: GateState,
    },

    #[error("{subject} is already {state}")]
    AlreadyDecided { subject: String, state: String },

    #[error("Ticket in state {state} needs an explicit choice to advance")]
    ChoiceRequired { state: TicketState },

    #[error("Ticket in state {state} is terminal")]
    TerminalState { state: TicketState },

    #[error("Ticket in state {state} cannot be reassigned")]
    NotReassignable { state: TicketState },
}

/// How a caller should surface a `WorkflowError`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorDisposition {
    /// Malformed input from the caller
    CallerBug,
    /// Role mismatch, show as a permission error
    Permission,
    /// Show as a validation message
    Validation,
    /// Double submit; show a notice, not a failure
    Notice,
    /// Ask the user for the missing choice
    Reprompt,
    /// Request cannot succeed
    Fatal,
}

impl WorkflowError {
    pub fn disposition(&self) -> ErrorDisposition {
        match self {
            WorkflowError::UnknownGate(_)
            | WorkflowError::UnknownState(_)
            | WorkflowError::UnknownRole(_)
            | WorkflowError::UnknownAction(_) => ErrorDisposition::CallerBug,
            WorkflowError::Unauthorized { .. } => ErrorDisposition::Permission,
            WorkflowError::OutOfOrder { .. } | WorkflowError::NotReassignable { .. } => {
                ErrorDisposition::Validation
            }
            WorkflowError::AlreadyDecided { .. } => ErrorDisposition::Notice,
            WorkflowError::ChoiceRequired { .. } => ErrorDisposition::Reprompt,
            WorkflowError::TerminalState { .. } => ErrorDisposition::Fatal,
        }
    }

    pub fn is_notice(&self) -> bool {
        self.disposition() == ErrorDisposition::Notice
    }
}
