// Persistence collaborator - document store for expense reports and tickets
//
// Saves are compare-and-swap on the record version. The engines never see
// this layer; the coordinator reads, decides, then saves with the version it
// read.

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

use crate::approval::ExpenseWorkflow;
use crate::ticket::TicketState;

pub mod records;
pub mod memory;
pub mod filesystem;

pub use records::{DecisionRecord, ExpenseReport, ServiceTicket, TicketTransitionRecord};
pub use memory::MemoryStore;
pub use filesystem::FileSystemStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Expense,
    Ticket,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Expense => f.write_str("expense"),
            EntityKind::Ticket => f.write_str("ticket"),
        }
    }
}

/// Errors raised by store implementations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {id} not found")]
    NotFound { kind: EntityKind, id: String },

    #[error("{kind} {id} already exists")]
    AlreadyExists { kind: EntityKind, id: String },

    #[error("Invalid {kind} id: {id:?}")]
    InvalidId { kind: EntityKind, id: String },

    #[error("Concurrency conflict on {kind} {id}: expected version {expected}, found {found}")]
    ConcurrencyConflict {
        kind: EntityKind,
        id: String,
        expected: u64,
        found: u64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Lock acquisition failed: {reason}")]
    Lock { reason: String },
}

impl StoreError {
    /// Only a lost compare-and-swap is worth retrying.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::ConcurrencyConflict { .. })
    }
}

/// Compare the version read by the caller with the stored one.
pub(crate) fn check_version(
    kind: EntityKind,
    id: &str,
    expected: u64,
    found: u64,
) -> Result<(), StoreError> {
    if expected != found {
        return Err(StoreError::ConcurrencyConflict {
            kind,
            id: id.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExpenseStore: Send + Sync {
    async fn insert_expense(&self, report: &ExpenseReport) -> Result<(), StoreError>;

    async fn load_expense(&self, id: &str) -> Result<ExpenseReport, StoreError>;

    async fn list_expenses(&self) -> Result<Vec<ExpenseReport>, StoreError>;

    /// Persist new gate values, appending `decision` to the history.
    /// Returns the new version, or `ConcurrencyConflict` if the stored
    /// version no longer equals `expected_version`.
    async fn save_expense(
        &self,
        id: &str,
        workflow: &ExpenseWorkflow,
        decision: &DecisionRecord,
        expected_version: u64,
    ) -> Result<u64, StoreError>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketStore: Send + Sync {
    async fn insert_ticket(&self, ticket: &ServiceTicket) -> Result<(), StoreError>;

    async fn load_ticket(&self, id: &str) -> Result<ServiceTicket, StoreError>;

    async fn list_tickets(&self) -> Result<Vec<ServiceTicket>, StoreError>;

    /// Same contract as `ExpenseStore::save_expense`.
    async fn save_ticket(
        &self,
        id: &str,
        state: TicketState,
        technician: Option<String>,
        transition: &TicketTransitionRecord,
        expected_version: u64,
    ) -> Result<u64, StoreError>;
}
