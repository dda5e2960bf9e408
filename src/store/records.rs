// Entity records owned by the persistence layer

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::approval::{self, DisplayStatus, ExpenseAction, ExpenseWorkflow, Gates, Role};
use crate::ticket::{self, TicketAction, TicketState};

/// Audit entry for one gate decision
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub action: ExpenseAction,
    pub actor: String,
    pub role: Role,
    pub gates_before: Gates,
    pub gates_after: Gates,
    pub decided_at: DateTime<Utc>,
    pub correlation_id: Option<String>,
}

/// Expense report as stored by the document store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseReport {
    pub id: String,
    pub title: String,
    pub submitted_by: String,
    /// Reporting period, e.g. "2026-10"
    pub period: String,
    pub amount_cents: i64,
    pub workflow: ExpenseWorkflow,
    /// Concurrency token; bumped on every successful save
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<DecisionRecord>,
}

impl ExpenseReport {
    pub fn new(id: &str, title: &str, submitted_by: &str, period: &str, amount_cents: i64) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            title: title.to_string(),
            submitted_by: submitted_by.to_string(),
            period: period.to_string(),
            amount_cents,
            workflow: ExpenseWorkflow::default(),
            version: 0,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    pub fn display_status(&self) -> DisplayStatus {
        approval::project(&self.workflow.gates)
    }
}

/// Audit entry for one ticket transition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketTransitionRecord {
    pub action: TicketAction,
    pub actor: String,
    pub from: TicketState,
    pub to: TicketState,
    pub technician: Option<String>,
    pub at: DateTime<Utc>,
    pub correlation_id: Option<String>,
}

/// Post-sale service ticket
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceTicket {
    pub id: String,
    pub customer: String,
    pub summary: String,
    pub technician: Option<String>,
    pub state: TicketState,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub history: Vec<TicketTransitionRecord>,
}

impl ServiceTicket {
    pub fn new(id: &str, customer: &str, summary: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            customer: customer.to_string(),
            summary: summary.to_string(),
            technician: None,
            state: TicketState::Started,
            version: 0,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    pub fn next_action_label(&self) -> Option<&'static str> {
        ticket::action_label(self.state)
    }
}
