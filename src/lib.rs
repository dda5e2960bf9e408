// Expense Desk Library - expense approval gates and service ticket lifecycle
// This exposes the core components for testing and integration

pub mod approval;
pub mod cli;
pub mod config;
pub mod identity;
pub mod observability;
pub mod store;
pub mod telemetry;
pub mod ticket;
pub mod workflows;

// Re-export key types for easy access
pub use approval::{
    ApprovalGate, DisplayStatus, ExpenseAction, ExpenseWorkflow, GateState, Gates, Role, StatusKind,
};
pub use config::ExpenseDeskConfig;
pub use identity::{IdentityError, RoleDirectory, RoleResolver};
pub use observability::{workflow_metrics, OperationTimer, WorkflowMetrics};
pub use store::{
    EntityKind, ExpenseReport, ExpenseStore, FileSystemStore, MemoryStore, ServiceTicket,
    StoreError, TicketStore,
};
pub use telemetry::{create_transition_span, generate_correlation_id, init_telemetry};
pub use ticket::{AdvanceChoice, TicketAction, TicketState};
pub use workflows::{
    CoordinatorError, DecisionOutcome, ErrorDisposition, WorkflowCoordinator, WorkflowError,
};
