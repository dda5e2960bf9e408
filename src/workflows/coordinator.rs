// Read-decide-save coordination for both workflows
//
// The engines are pure; this is the caller that loads an entity, asks the
// engine for the next state and saves it with the version it read. A lost
// compare-and-swap means the decision was made on stale state, so the whole
// cycle runs again against a fresh read.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio_retry::strategy::jitter;
use tokio_retry::RetryIf;
use tracing::{info, warn, Instrument};

use super::errors::WorkflowError;
use crate::approval::{self, DisplayStatus, ExpenseAction, Role, StatusKind};
use crate::config::{ExpenseDeskConfig, RetryConfig, StoreBackend};
use crate::identity::{IdentityError, RoleDirectory, RoleResolver};
use crate::observability::workflow_metrics;
use crate::store::{
    DecisionRecord, EntityKind, ExpenseReport, ExpenseStore, FileSystemStore, MemoryStore,
    ServiceTicket, StoreError, TicketStore, TicketTransitionRecord,
};
use crate::telemetry::{create_transition_span, generate_correlation_id};
use crate::ticket::{self, AdvanceChoice, TicketAction, TicketState};

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Identity(#[from] IdentityError),

    #[error("Gave up on {kind} {id} after {attempts} conflicting attempts")]
    RetriesExhausted { kind: EntityKind, id: String, attempts: u32 },
}

impl CoordinatorError {
    fn is_conflict(&self) -> bool {
        matches!(self, CoordinatorError::Store(err) if err.is_conflict())
    }
}

/// Result of a transition request that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome<T> {
    /// The transition was saved; holds the updated record.
    Applied(T),
    /// Nothing to do (e.g. a double submit); holds the current record.
    Unchanged { record: T, notice: String },
}

impl<T> DecisionOutcome<T> {
    pub fn record(&self) -> &T {
        match self {
            DecisionOutcome::Applied(record) | DecisionOutcome::Unchanged { record, .. } => record,
        }
    }

    pub fn into_record(self) -> T {
        match self {
            DecisionOutcome::Applied(record) | DecisionOutcome::Unchanged { record, .. } => record,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, DecisionOutcome::Applied(_))
    }
}

pub struct WorkflowCoordinator {
    expenses: Arc<dyn ExpenseStore>,
    tickets: Arc<dyn TicketStore>,
    roles: Arc<dyn RoleResolver>,
    retry: RetryConfig,
}

impl std::fmt::Debug for WorkflowCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowCoordinator")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl WorkflowCoordinator {
    pub fn new(
        expenses: Arc<dyn ExpenseStore>,
        tickets: Arc<dyn TicketStore>,
        roles: Arc<dyn RoleResolver>,
    ) -> Self {
        Self {
            expenses,
            tickets,
            roles,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Wire up the configured store backend and role directory.
    pub fn from_config(config: &ExpenseDeskConfig) -> Result<Self, IdentityError> {
        let roles = Arc::new(RoleDirectory::from_config(&config.identity)?);

        let coordinator = match config.store.backend {
            StoreBackend::Filesystem => {
                let store = Arc::new(FileSystemStore::new(&config.store.data_dir));
                Self::new(store.clone(), store, roles)
            }
            StoreBackend::Memory => {
                let store = Arc::new(MemoryStore::new());
                Self::new(store.clone(), store, roles)
            }
        };

        Ok(coordinator.with_retry(config.retry.clone()))
    }

    fn retry_strategy(&self) -> impl Iterator<Item = Duration> {
        let use_jitter = self.retry.jitter;
        backoff_delays(&self.retry)
            .map(move |delay| if use_jitter { jitter(delay) } else { delay })
            .take(self.retry.max_attempts.saturating_sub(1) as usize)
    }

    fn should_retry(kind: EntityKind, id: &str) -> impl FnMut(&CoordinatorError) -> bool + '_ {
        move |err: &CoordinatorError| {
            let retry = err.is_conflict();
            if retry {
                workflow_metrics().record_conflict();
                warn!(
                    entity = %kind,
                    id = %id,
                    error = %err,
                    "Stale read, retrying transition against fresh state"
                );
            }
            retry
        }
    }

    fn finish<T>(
        &self,
        kind: EntityKind,
        id: &str,
        result: Result<DecisionOutcome<T>, CoordinatorError>,
    ) -> Result<DecisionOutcome<T>, CoordinatorError> {
        let metrics = workflow_metrics();
        match result {
            Ok(outcome) => {
                if outcome.is_applied() {
                    metrics.record_applied();
                } else {
                    metrics.record_noop();
                }
                Ok(outcome)
            }
            Err(err) if err.is_conflict() => {
                metrics.record_retries_exhausted();
                Err(CoordinatorError::RetriesExhausted {
                    kind,
                    id: id.to_string(),
                    attempts: self.retry.max_attempts.max(1),
                })
            }
            Err(err) => {
                metrics.record_rejected();
                Err(err)
            }
        }
    }

    // ---- expenses ----

    pub async fn create_expense(
        &self,
        report: ExpenseReport,
    ) -> Result<ExpenseReport, CoordinatorError> {
        self.expenses.insert_expense(&report).await?;
        info!(
            expense_id = %report.id,
            submitted_by = %report.submitted_by,
            "Expense report submitted"
        );
        Ok(report)
    }

    pub async fn load_expense(&self, id: &str) -> Result<ExpenseReport, CoordinatorError> {
        Ok(self.expenses.load_expense(id).await?)
    }

    pub async fn expense_status(&self, id: &str) -> Result<DisplayStatus, CoordinatorError> {
        Ok(self.load_expense(id).await?.display_status())
    }

    pub async fn list_expenses(
        &self,
        filter: Option<StatusKind>,
    ) -> Result<Vec<ExpenseReport>, CoordinatorError> {
        let reports = self.expenses.list_expenses().await?;
        Ok(approval::filter_by_status(&reports, filter, |report| &report.workflow.gates)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Apply an approve/reject decision on behalf of `user_id`.
    pub async fn decide_expense(
        &self,
        expense_id: &str,
        user_id: &str,
        action: ExpenseAction,
    ) -> Result<DecisionOutcome<ExpenseReport>, CoordinatorError> {
        let correlation_id = generate_correlation_id();
        let span = create_transition_span("decide_expense", "expense", expense_id, &correlation_id);

        async {
            let role = self.roles.role_of(user_id).await?;
            let correlation = correlation_id.as_str();

            let result = RetryIf::spawn(
                self.retry_strategy(),
                move || {
                    self.attempt_expense_decision(expense_id, user_id, role, action, correlation)
                },
                Self::should_retry(EntityKind::Expense, expense_id),
            )
            .await;

            self.finish(EntityKind::Expense, expense_id, result)
        }
        .instrument(span)
        .await
    }

    async fn attempt_expense_decision(
        &self,
        expense_id: &str,
        user_id: &str,
        role: Role,
        action: ExpenseAction,
        correlation_id: &str,
    ) -> Result<DecisionOutcome<ExpenseReport>, CoordinatorError> {
        let mut report = self.expenses.load_expense(expense_id).await?;

        if !report.workflow.gates.is_consistent() {
            warn!(
                expense_id = %expense_id,
                gates = ?report.workflow.gates,
                "Stored gates violate pipeline ordering"
            );
        }

        let workflow = match approval::apply(&report.workflow.gates, action, role) {
            Ok(workflow) => workflow,
            Err(err) if err.is_notice() => {
                info!(
                    expense_id = %expense_id,
                    action = %action,
                    notice = %err,
                    "Decision already recorded"
                );
                return Ok(DecisionOutcome::Unchanged {
                    notice: err.to_string(),
                    record: report,
                });
            }
            Err(err) => {
                warn!(
                    expense_id = %expense_id,
                    action = %action,
                    role = %role,
                    error = %err,
                    "Decision rejected"
                );
                return Err(err.into());
            }
        };

        let decision = DecisionRecord {
            action,
            actor: user_id.to_string(),
            role,
            gates_before: report.workflow.gates,
            gates_after: workflow.gates,
            decided_at: Utc::now(),
            correlation_id: Some(correlation_id.to_string()),
        };

        let version = self
            .expenses
            .save_expense(expense_id, &workflow, &decision, report.version)
            .await?;

        info!(
            expense_id = %expense_id,
            action = %action,
            actor = %user_id,
            version,
            status = %approval::project(&workflow.gates),
            "Expense decision saved"
        );

        report.workflow = workflow;
        report.version = version;
        report.updated_at = decision.decided_at;
        report.history.push(decision);
        Ok(DecisionOutcome::Applied(report))
    }

    /// Caller-side edit rule built on the engine's lock bit: the submitting
    /// employee loses edit rights once review starts, reviewers keep them.
    pub fn may_edit(report: &ExpenseReport, role: Role) -> bool {
        role.is_reviewer() || !report.workflow.edit_locked
    }

    // ---- tickets ----

    pub async fn create_ticket(
        &self,
        ticket: ServiceTicket,
    ) -> Result<ServiceTicket, CoordinatorError> {
        self.tickets.insert_ticket(&ticket).await?;
        info!(ticket_id = %ticket.id, customer = %ticket.customer, "Service ticket opened");
        Ok(ticket)
    }

    pub async fn load_ticket(&self, id: &str) -> Result<ServiceTicket, CoordinatorError> {
        Ok(self.tickets.load_ticket(id).await?)
    }

    pub async fn list_tickets(&self) -> Result<Vec<ServiceTicket>, CoordinatorError> {
        Ok(self.tickets.list_tickets().await?)
    }

    /// Move a ticket along its lifecycle. `technician` is recorded when the
    /// ticket enters `TechnicianAssigned`.
    pub async fn advance_ticket(
        &self,
        ticket_id: &str,
        user_id: &str,
        choice: Option<AdvanceChoice>,
        technician: Option<&str>,
    ) -> Result<DecisionOutcome<ServiceTicket>, CoordinatorError> {
        self.transition_ticket(ticket_id, user_id, TicketAction::Advance(choice), technician)
            .await
    }

    /// Pull the technician off a ticket so it can be assigned again.
    pub async fn reassign_ticket(
        &self,
        ticket_id: &str,
        user_id: &str,
    ) -> Result<DecisionOutcome<ServiceTicket>, CoordinatorError> {
        self.transition_ticket(ticket_id, user_id, TicketAction::Reassign, None)
            .await
    }

    async fn transition_ticket(
        &self,
        ticket_id: &str,
        user_id: &str,
        action: TicketAction,
        technician: Option<&str>,
    ) -> Result<DecisionOutcome<ServiceTicket>, CoordinatorError> {
        let correlation_id = generate_correlation_id();
        let span =
            create_transition_span("transition_ticket", "ticket", ticket_id, &correlation_id);

        async {
            // tickets are not role-gated, but the actor must be a known user
            let role = self.roles.role_of(user_id).await?;
            let correlation = correlation_id.as_str();
            info!(
                ticket_id = %ticket_id,
                actor = %user_id,
                role = %role,
                action = %action,
                "Ticket transition requested"
            );

            let result = RetryIf::spawn(
                self.retry_strategy(),
                move || {
                    self.attempt_ticket_transition(
                        ticket_id,
                        user_id,
                        action,
                        technician,
                        correlation,
                    )
                },
                Self::should_retry(EntityKind::Ticket, ticket_id),
            )
            .await;

            self.finish(EntityKind::Ticket, ticket_id, result)
        }
        .instrument(span)
        .await
    }

    async fn attempt_ticket_transition(
        &self,
        ticket_id: &str,
        user_id: &str,
        action: TicketAction,
        technician: Option<&str>,
        correlation_id: &str,
    ) -> Result<DecisionOutcome<ServiceTicket>, CoordinatorError> {
        let mut record = self.tickets.load_ticket(ticket_id).await?;
        let from = record.state;

        let to = match ticket::apply(from, action) {
            Ok(state) => state,
            Err(err) if err.is_notice() => {
                info!(
                    ticket_id = %ticket_id,
                    action = %action,
                    notice = %err,
                    "Ticket already in requested state"
                );
                return Ok(DecisionOutcome::Unchanged {
                    notice: err.to_string(),
                    record,
                });
            }
            Err(err) => {
                warn!(
                    ticket_id = %ticket_id,
                    state = %from,
                    action = %action,
                    error = %err,
                    "Ticket transition rejected"
                );
                return Err(err.into());
            }
        };

        let assigned = match to {
            TicketState::TechnicianAssigned => technician
                .map(str::to_string)
                .or_else(|| record.technician.clone()),
            TicketState::ReassignTechnician => None,
            _ => record.technician.clone(),
        };

        let transition = TicketTransitionRecord {
            action,
            actor: user_id.to_string(),
            from,
            to,
            technician: assigned.clone(),
            at: Utc::now(),
            correlation_id: Some(correlation_id.to_string()),
        };

        let version = self
            .tickets
            .save_ticket(ticket_id, to, assigned.clone(), &transition, record.version)
            .await?;

        info!(
            ticket_id = %ticket_id,
            from = %from,
            to = %to,
            technician = ?assigned,
            version,
            "Ticket transition saved"
        );

        record.state = to;
        record.technician = assigned;
        record.version = version;
        record.updated_at = transition.at;
        record.history.push(transition);
        Ok(DecisionOutcome::Applied(record))
    }
}

/// Delays before each retry: base, 2×base, 4×base, ... capped at the
/// configured maximum.
fn backoff_delays(retry: &RetryConfig) -> impl Iterator<Item = Duration> {
    let base = retry.base_delay();
    let max = retry.max_delay();
    (0u32..).map(move |n| base.saturating_mul(2u32.saturating_pow(n)).min(max))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::approval::{ApprovalGate, GateState, Gates};
    use crate::store::{MockExpenseStore, MockTicketStore};
    use mockall::Sequence;

    fn fast_retry(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter: false,
        }
    }

    fn roles() -> Arc<RoleDirectory> {
        Arc::new(
            RoleDirectory::new()
                .with_user("alice", Role::Assistant)
                .with_user("sam", Role::Supervisor)
                .with_user("erin", Role::Employee),
        )
    }

    fn conflict(id: &str, expected: u64) -> StoreError {
        StoreError::ConcurrencyConflict {
            kind: EntityKind::Expense,
            id: id.to_string(),
            expected,
            found: expected + 1,
        }
    }

    fn coordinator_with(expenses: MockExpenseStore, max_attempts: u32) -> WorkflowCoordinator {
        WorkflowCoordinator::new(Arc::new(expenses), Arc::new(MockTicketStore::new()), roles())
            .with_retry(fast_retry(max_attempts))
    }

    #[tokio::test]
    async fn test_conflict_is_retried_against_fresh_state() {
        let mut store = MockExpenseStore::new();
        let report = ExpenseReport::new("exp-1", "Taxi", "erin", "2026-10", 4200);
        store
            .expect_load_expense()
            .times(2)
            .returning(move |_| Ok(report.clone()));

        let mut seq = Sequence::new();
        store
            .expect_save_expense()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|id, _, _, expected| Err(conflict(id, expected)));
        store
            .expect_save_expense()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, expected| Ok(expected + 1));

        let coordinator = coordinator_with(store, 3);
        let outcome = coordinator
            .decide_expense("exp-1", "alice", ExpenseAction::Approve(ApprovalGate::Assistant))
            .await
            .unwrap();

        assert!(outcome.is_applied());
        let report = outcome.into_record();
        assert_eq!(report.version, 1);
        assert_eq!(report.workflow.gates.get(ApprovalGate::Assistant), GateState::Approved);
        assert!(report.workflow.edit_locked);
        assert_eq!(report.history.len(), 1);
        assert_eq!(report.history[0].actor, "alice");
    }

    #[tokio::test]
    async fn test_persistent_conflicts_exhaust_retries() {
        let mut store = MockExpenseStore::new();
        let report = ExpenseReport::new("exp-1", "Taxi", "erin", "2026-10", 4200);
        store
            .expect_load_expense()
            .times(3)
            .returning(move |_| Ok(report.clone()));
        store
            .expect_save_expense()
            .times(3)
            .returning(|id, _, _, expected| Err(conflict(id, expected)));

        let coordinator = coordinator_with(store, 3);
        let err = coordinator
            .decide_expense("exp-1", "alice", ExpenseAction::Approve(ApprovalGate::Assistant))
            .await
            .unwrap_err();

        assert!(matches!(err, CoordinatorError::RetriesExhausted { attempts: 3, .. }));
    }

    #[tokio::test]
    async fn test_engine_errors_are_not_retried() {
        let mut store = MockExpenseStore::new();
        let report = ExpenseReport::new("exp-1", "Taxi", "erin", "2026-10", 4200);
        store
            .expect_load_expense()
            .times(1)
            .returning(move |_| Ok(report.clone()));
        store.expect_save_expense().never();

        let coordinator = coordinator_with(store, 3);
        let err = coordinator
            .decide_expense("exp-1", "sam", ExpenseAction::Approve(ApprovalGate::Supervisor))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            CoordinatorError::Workflow(WorkflowError::OutOfOrder { .. })
        ));
    }

    #[tokio::test]
    async fn test_double_submit_is_a_noop() {
        let mut store = MockExpenseStore::new();
        let mut report = ExpenseReport::new("exp-1", "Taxi", "erin", "2026-10", 4200);
        report.workflow.gates =
            Gates::new([GateState::Approved, GateState::Pending, GateState::Pending]);
        report.workflow.edit_locked = true;
        report.version = 4;
        store
            .expect_load_expense()
            .times(1)
            .returning(move |_| Ok(report.clone()));
        store.expect_save_expense().never();

        let coordinator = coordinator_with(store, 3);
        let outcome = coordinator
            .decide_expense("exp-1", "alice", ExpenseAction::Approve(ApprovalGate::Assistant))
            .await
            .unwrap();

        match outcome {
            DecisionOutcome::Unchanged { record, notice } => {
                assert_eq!(record.version, 4);
                assert!(notice.contains("already approved"));
            }
            other => panic!("expected no-op, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_unknown_user_is_rejected_before_loading() {
        let mut store = MockExpenseStore::new();
        store.expect_load_expense().never();

        let coordinator = coordinator_with(store, 3);
        let err = coordinator
            .decide_expense("exp-1", "mallory", ExpenseAction::Approve(ApprovalGate::Assistant))
            .await
            .unwrap_err();

        assert!(matches!(err, CoordinatorError::Identity(IdentityError::UnknownUser(_))));
    }

    #[tokio::test]
    async fn test_ticket_reassignment_clears_technician() {
        let store = Arc::new(MemoryStore::new());
        let coordinator = WorkflowCoordinator::new(store.clone(), store.clone(), roles())
            .with_retry(fast_retry(3));

        coordinator
            .create_ticket(ServiceTicket::new("t-1", "Acme", "Compressor noise"))
            .await
            .unwrap();
        let assigned = coordinator
            .advance_ticket("t-1", "sam", None, Some("tomas"))
            .await
            .unwrap()
            .into_record();
        assert_eq!(assigned.state, TicketState::TechnicianAssigned);
        assert_eq!(assigned.technician.as_deref(), Some("tomas"));

        let reassigned = coordinator.reassign_ticket("t-1", "sam").await.unwrap().into_record();
        assert_eq!(reassigned.state, TicketState::ReassignTechnician);
        assert_eq!(reassigned.technician, None);

        // second reassign is a no-op notice
        let again = coordinator.reassign_ticket("t-1", "sam").await.unwrap();
        assert!(!again.is_applied());

        let back = coordinator
            .advance_ticket("t-1", "sam", None, Some("uma"))
            .await
            .unwrap()
            .into_record();
        assert_eq!(back.state, TicketState::TechnicianAssigned);
        assert_eq!(back.technician.as_deref(), Some("uma"));
        assert_eq!(back.version, 3);
    }

    #[test]
    fn test_backoff_doubles_from_base_delay() {
        let millis = |retry: RetryConfig| -> Vec<u64> {
            backoff_delays(&retry).take(5).map(|d| d.as_millis() as u64).collect()
        };

        assert_eq!(millis(fast_retry(3)), vec![1, 2, 4, 5, 5]);

        let odd = RetryConfig {
            max_attempts: 4,
            base_delay_ms: 3,
            max_delay_ms: 100,
            jitter: false,
        };
        assert_eq!(millis(odd.clone()), vec![3, 6, 12, 24, 48]);

        let coordinator = coordinator_with(MockExpenseStore::new(), 4).with_retry(odd);
        let schedule: Vec<_> = coordinator.retry_strategy().collect();
        assert_eq!(
            schedule,
            vec![Duration::from_millis(3), Duration::from_millis(6), Duration::from_millis(12)]
        );
    }

    #[test]
    fn test_may_edit() {
        let mut report = ExpenseReport::new("exp-1", "Taxi", "erin", "2026-10", 4200);
        assert!(WorkflowCoordinator::may_edit(&report, Role::Employee));

        report.workflow.edit_locked = true;
        assert!(!WorkflowCoordinator::may_edit(&report, Role::Employee));
        assert!(WorkflowCoordinator::may_edit(&report, Role::Supervisor));
    }
}
