// Core types for the expense approval pipeline

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::workflows::WorkflowError;

/// The three ordered checkpoints an expense report passes through.
///
/// Ordering follows declaration order: `Assistant < Supervisor < Accounting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum ApprovalGate {
    Assistant,
    Supervisor,
    Accounting,
}

impl ApprovalGate {
    pub const ALL: [ApprovalGate; 3] = [
        ApprovalGate::Assistant,
        ApprovalGate::Supervisor,
        ApprovalGate::Accounting,
    ];

    /// Position of this gate in the pipeline (0-based).
    pub fn index(self) -> usize {
        match self {
            ApprovalGate::Assistant => 0,
            ApprovalGate::Supervisor => 1,
            ApprovalGate::Accounting => 2,
        }
    }

    /// Role that is allowed to decide this gate.
    pub fn required_role(self) -> Role {
        match self {
            ApprovalGate::Assistant => Role::Assistant,
            ApprovalGate::Supervisor => Role::Supervisor,
            ApprovalGate::Accounting => Role::Accounting,
        }
    }

    /// Gates that must all be `Approved` before this one can be decided.
    pub fn predecessors(self) -> &'static [ApprovalGate] {
        &Self::ALL[..self.index()]
    }

    pub fn name(self) -> &'static str {
        match self {
            ApprovalGate::Assistant => "Assistant",
            ApprovalGate::Supervisor => "Supervisor",
            ApprovalGate::Accounting => "Accounting",
        }
    }
}

impl fmt::Display for ApprovalGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ApprovalGate {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assistant" => Ok(ApprovalGate::Assistant),
            "supervisor" => Ok(ApprovalGate::Supervisor),
            "accounting" => Ok(ApprovalGate::Accounting),
            _ => Err(WorkflowError::UnknownGate(s.to_string())),
        }
    }
}

/// Decision held by a single gate. Never collapse this to a boolean:
/// "not approved" is either `Pending` or `Rejected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl GateState {
    pub fn is_pending(self) -> bool {
        matches!(self, GateState::Pending)
    }

    pub fn is_approved(self) -> bool {
        matches!(self, GateState::Approved)
    }

    pub fn is_rejected(self) -> bool {
        matches!(self, GateState::Rejected)
    }
}

impl fmt::Display for GateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            GateState::Pending => "pending",
            GateState::Approved => "approved",
            GateState::Rejected => "rejected",
        };
        f.write_str(label)
    }
}

impl FromStr for GateState {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(GateState::Pending),
            "approved" => Ok(GateState::Approved),
            "rejected" => Ok(GateState::Rejected),
            _ => Err(WorkflowError::UnknownState(s.to_string())),
        }
    }
}

/// Role of the acting user, resolved by the identity collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Assistant,
    Supervisor,
    Accounting,
    Employee,
}

impl Role {
    /// Reviewer roles own a gate; employees only submit.
    pub fn is_reviewer(self) -> bool {
        !matches!(self, Role::Employee)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Role::Assistant => "assistant",
            Role::Supervisor => "supervisor",
            Role::Accounting => "accounting",
            Role::Employee => "employee",
        };
        f.write_str(label)
    }
}

impl FromStr for Role {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assistant" => Ok(Role::Assistant),
            "supervisor" => Ok(Role::Supervisor),
            "accounting" => Ok(Role::Accounting),
            "employee" => Ok(Role::Employee),
            _ => Err(WorkflowError::UnknownRole(s.to_string())),
        }
    }
}

/// Gate values indexed by gate order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gates([GateState; 3]);

impl Gates {
    pub fn new(states: [GateState; 3]) -> Self {
        Self(states)
    }

    pub fn get(&self, gate: ApprovalGate) -> GateState {
        self.0[gate.index()]
    }

    /// Copy of these gates with one value replaced.
    pub fn with(mut self, gate: ApprovalGate, state: GateState) -> Self {
        self.0[gate.index()] = state;
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (ApprovalGate, GateState)> + '_ {
        ApprovalGate::ALL.iter().map(move |gate| (*gate, self.get(*gate)))
    }

    /// Whether the stored values obey the pipeline ordering: a gate is only
    /// ever decided once every lower gate is `Approved`.
    pub fn is_consistent(&self) -> bool {
        self.iter().all(|(gate, state)| {
            state.is_pending()
                || gate
                    .predecessors()
                    .iter()
                    .all(|lower| self.get(*lower).is_approved())
        })
    }
}

impl From<[GateState; 3]> for Gates {
    fn from(states: [GateState; 3]) -> Self {
        Self(states)
    }
}

/// Approval state embedded in an expense report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExpenseWorkflow {
    pub gates: Gates,
    /// Set once review activity has begun; the submitting employee can no
    /// longer modify the report.
    pub edit_locked: bool,
}

impl ExpenseWorkflow {
    pub fn new(gates: Gates, edit_locked: bool) -> Self {
        Self { gates, edit_locked }
    }
}

/// Requested decision against one gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[serde(tag = "decision", content = "gate", rename_all = "snake_case")]
pub enum ExpenseAction {
    Approve(ApprovalGate),
    Reject(ApprovalGate),
}

impl ExpenseAction {
    pub fn gate(self) -> ApprovalGate {
        match self {
            ExpenseAction::Approve(gate) | ExpenseAction::Reject(gate) => gate,
        }
    }

    /// Gate value this action writes.
    pub fn outcome(self) -> GateState {
        match self {
            ExpenseAction::Approve(_) => GateState::Approved,
            ExpenseAction::Reject(_) => GateState::Rejected,
        }
    }

    pub fn verb(self) -> &'static str {
        match self {
            ExpenseAction::Approve(_) => "approve",
            ExpenseAction::Reject(_) => "reject",
        }
    }

    /// Build an action from a verb ("approve"/"reject") and a gate name.
    pub fn from_parts(verb: &str, gate: &str) -> Result<Self, WorkflowError> {
        let gate: ApprovalGate = gate.parse()?;
        match verb.trim().to_ascii_lowercase().as_str() {
            "approve" => Ok(ExpenseAction::Approve(gate)),
            "reject" => Ok(ExpenseAction::Reject(gate)),
            _ => Err(WorkflowError::UnknownAction(verb.to_string())),
        }
    }
}

impl fmt::Display for ExpenseAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.verb(), self.gate().name().to_ascii_lowercase())
    }
}

impl FromStr for ExpenseAction {
    type Err = WorkflowError;

    /// Parses the `verb:gate` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, gate) = s
            .split_once(':')
            .ok_or_else(|| WorkflowError::UnknownAction(s.to_string()))?;
        Self::from_parts(verb, gate)
    }
}

/// Status shown in list views. Derived from the gates, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "status", content = "gate", rename_all = "snake_case")]
pub enum DisplayStatus {
    Pending,
    InReview(ApprovalGate),
    Approved,
    Rejected,
}

/// Coarse status used for filtering views.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    Pending,
    InReview,
    Approved,
    Rejected,
}

impl DisplayStatus {
    pub fn kind(self) -> StatusKind {
        match self {
            DisplayStatus::Pending => StatusKind::Pending,
            DisplayStatus::InReview(_) => StatusKind::InReview,
            DisplayStatus::Approved => StatusKind::Approved,
            DisplayStatus::Rejected => StatusKind::Rejected,
        }
    }

    pub fn label(self) -> String {
        match self {
            DisplayStatus::Pending => "Pending".to_string(),
            DisplayStatus::InReview(gate) => format!("In review: {gate}"),
            DisplayStatus::Approved => "Approved".to_string(),
            DisplayStatus::Rejected => "Rejected".to_string(),
        }
    }
}

impl fmt::Display for DisplayStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.label())
    }
}

impl FromStr for StatusKind {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "pending" => Ok(StatusKind::Pending),
            "in-review" => Ok(StatusKind::InReview),
            "approved" => Ok(StatusKind::Approved),
            "rejected" => Ok(StatusKind::Rejected),
            _ => Err(WorkflowError::UnknownState(s.to_string())),
        }
    }
}
