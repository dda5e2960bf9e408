use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use super::{
    check_version, DecisionRecord, EntityKind, ExpenseReport, ExpenseStore, ServiceTicket,
    StoreError, TicketStore, TicketTransitionRecord,
};
use crate::approval::ExpenseWorkflow;
use crate::ticket::TicketState;

/// Process-local store, used by tests and the `memory` backend.
#[derive(Debug, Default)]
pub struct MemoryStore {
    expenses: RwLock<HashMap<String, ExpenseReport>>,
    tickets: RwLock<HashMap<String, ServiceTicket>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExpenseStore for MemoryStore {
    async fn insert_expense(&self, report: &ExpenseReport) -> Result<(), StoreError> {
        let mut expenses = self.expenses.write().await;
        if expenses.contains_key(&report.id) {
            return Err(StoreError::AlreadyExists {
                kind: EntityKind::Expense,
                id: report.id.clone(),
            });
        }
        expenses.insert(report.id.clone(), report.clone());
        Ok(())
    }

    async fn load_expense(&self, id: &str) -> Result<ExpenseReport, StoreError> {
        self.expenses
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Expense,
                id: id.to_string(),
            })
    }

    async fn list_expenses(&self) -> Result<Vec<ExpenseReport>, StoreError> {
        let mut reports: Vec<_> = self.expenses.read().await.values().cloned().collect();
        reports.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(reports)
    }

    async fn save_expense(
        &self,
        id: &str,
        workflow: &ExpenseWorkflow,
        decision: &DecisionRecord,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut expenses = self.expenses.write().await;
        let report = expenses.get_mut(id).ok_or_else(|| StoreError::NotFound {
            kind: EntityKind::Expense,
            id: id.to_string(),
        })?;

        check_version(EntityKind::Expense, id, expected_version, report.version)?;

        report.workflow = *workflow;
        report.history.push(decision.clone());
        report.updated_at = decision.decided_at;
        report.version += 1;

        debug!(expense_id = %id, version = report.version, "Expense saved");
        Ok(report.version)
    }
}

#[async_trait]
impl TicketStore for MemoryStore {
    async fn insert_ticket(&self, ticket: &ServiceTicket) -> Result<(), StoreError> {
        let mut tickets = self.tickets.write().await;
        if tickets.contains_key(&ticket.id) {
            return Err(StoreError::AlreadyExists {
                kind: EntityKind::Ticket,
                id: ticket.id.clone(),
            });
        }
        tickets.insert(ticket.id.clone(), ticket.clone());
        Ok(())
    }

    async fn load_ticket(&self, id: &str) -> Result<ServiceTicket, StoreError> {
        self.tickets
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: EntityKind::Ticket,
                id: id.to_string(),
            })
    }

    async fn list_tickets(&self) -> Result<Vec<ServiceTicket>, StoreError> {
        let mut tickets: Vec<_> = self.tickets.read().await.values().cloned().collect();
        tickets.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tickets)
    }

    async fn save_ticket(
        &self,
        id: &str,
        state: TicketState,
        technician: Option<String>,
        transition: &TicketTransitionRecord,
        expected_version: u64,
    ) -> Result<u64, StoreError> {
        let mut tickets = self.tickets.write().await;
        let ticket = tickets.get_mut(id).ok_or_else(|| StoreError::NotFound {
            kind: EntityKind::Ticket,
            id: id.to_string(),
        })?;

        check_version(EntityKind::Ticket, id, expected_version, ticket.version)?;

        ticket.state = state;
        ticket.technician = technician;
        ticket.history.push(transition.clone());
        ticket.updated_at = transition.at;
        ticket.version += 1;

        debug!(ticket_id = %id, version = ticket.version, "Ticket saved");
        Ok(ticket.version)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::{ApprovalGate, ExpenseAction, GateState, Gates, Role};
    use chrono::Utc;

    fn decision(after: Gates) -> DecisionRecord {
        DecisionRecord {
            action: ExpenseAction::Approve(ApprovalGate::Assistant),
            actor: "alice".to_string(),
            role: Role::Assistant,
            gates_before: Gates::default(),
            gates_after: after,
            decided_at: Utc::now(),
            correlation_id: None,
        }
    }

    #[tokio::test]
    async fn test_save_bumps_version_and_appends_history() {
        let store = MemoryStore::new();
        store
            .insert_expense(&ExpenseReport::new("exp-1", "Taxi", "erin", "2026-10", 4200))
            .await
            .unwrap();

        let gates = Gates::new([GateState::Approved, GateState::Pending, GateState::Pending]);
        let version = store
            .save_expense("exp-1", &ExpenseWorkflow::new(gates, true), &decision(gates), 0)
            .await
            .unwrap();
        assert_eq!(version, 1);

        let report = store.load_expense("exp-1").await.unwrap();
        assert_eq!(report.workflow.gates, gates);
        assert!(report.workflow.edit_locked);
        assert_eq!(report.history.len(), 1);
    }

    #[tokio::test]
    async fn test_stale_version_conflicts() {
        let store = MemoryStore::new();
        store
            .insert_expense(&ExpenseReport::new("exp-1", "Taxi", "erin", "2026-10", 4200))
            .await
            .unwrap();

        let gates = Gates::new([GateState::Approved, GateState::Pending, GateState::Pending]);
        let workflow = ExpenseWorkflow::new(gates, true);
        store.save_expense("exp-1", &workflow, &decision(gates), 0).await.unwrap();

        let err = store
            .save_expense("exp-1", &workflow, &decision(gates), 0)
            .await
            .unwrap_err();
        assert!(err.is_conflict());
        assert_eq!(store.load_expense("exp-1").await.unwrap().history.len(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let store = MemoryStore::new();
        let ticket = ServiceTicket::new("t-1", "Acme", "Replace compressor");
        store.insert_ticket(&ticket).await.unwrap();

        assert!(matches!(
            store.insert_ticket(&ticket).await,
            Err(StoreError::AlreadyExists { .. })
        ));
        assert!(matches!(
            store.load_ticket("t-2").await,
            Err(StoreError::NotFound { .. })
        ));
    }
}
