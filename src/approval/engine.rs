// Approval gate transitions
//
// Pure functions over `Gates`: callers pass the state they read and get a new
// value back. Nothing here touches storage or identity.

use tracing::debug;

use super::types::{ApprovalGate, ExpenseAction, ExpenseWorkflow, Gates, Role};
use crate::workflows::WorkflowError;

/// Apply an approve/reject decision to a copy of `gates`.
///
/// Checks run in a fixed order: authorization, predecessor ordering, then
/// whether the gate is still undecided. The returned workflow carries the
/// recomputed edit lock.
pub fn apply(
    gates: &Gates,
    action: ExpenseAction,
    role: Role,
) -> Result<ExpenseWorkflow, WorkflowError> {
    let gate = action.gate();

    let required = gate.required_role();
    if role != required {
        return Err(WorkflowError::Unauthorized { gate, role, required });
    }

    if let Some(blocking) = gate
        .predecessors()
        .iter()
        .copied()
        .find(|lower| !gates.get(*lower).is_approved())
    {
        return Err(WorkflowError::OutOfOrder {
            gate,
            blocking,
            blocking_state: gates.get(blocking),
        });
    }

    let current = gates.get(gate);
    if !current.is_pending() {
        return Err(WorkflowError::AlreadyDecided {
            subject: format!("{gate} gate"),
            state: current.to_string(),
        });
    }

    // A rejection leaves every higher gate pending for good: the ordering
    // check above can never pass for them again.
    let next = gates.with(gate, action.outcome());

    debug!(
        gate = %gate,
        decision = action.verb(),
        from = %current,
        to = %next.get(gate),
        "Gate decision applied"
    );

    Ok(ExpenseWorkflow::new(next, edit_locked(&next)))
}

/// Edit lock derived from gate values: set once the first gate has left
/// `Pending`.
pub fn edit_locked(gates: &Gates) -> bool {
    !gates.get(ApprovalGate::Assistant).is_pending()
}
