// Core types for the service ticket lifecycle

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::workflows::WorkflowError;

/// Technician-facing ticket states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum TicketState {
    /// Ticket opened, no technician yet
    Started,
    TechnicianAssigned,
    ConfirmedByTechnician,
    /// Branch point: work ends partially or fully
    WorkStarted,
    PartialWork,
    Finished,
    /// Only terminal state
    Closed,
    /// Entered out-of-band through a reassignment
    ReassignTechnician,
}

impl TicketState {
    pub const ALL: [TicketState; 8] = [
        TicketState::Started,
        TicketState::TechnicianAssigned,
        TicketState::ConfirmedByTechnician,
        TicketState::WorkStarted,
        TicketState::PartialWork,
        TicketState::Finished,
        TicketState::Closed,
        TicketState::ReassignTechnician,
    ];

    pub fn is_terminal(self) -> bool {
        matches!(self, TicketState::Closed)
    }

    pub fn name(self) -> &'static str {
        match self {
            TicketState::Started => "started",
            TicketState::TechnicianAssigned => "technician_assigned",
            TicketState::ConfirmedByTechnician => "confirmed_by_technician",
            TicketState::WorkStarted => "work_started",
            TicketState::PartialWork => "partial_work",
            TicketState::Finished => "finished",
            TicketState::Closed => "closed",
            TicketState::ReassignTechnician => "reassign_technician",
        }
    }
}

impl fmt::Display for TicketState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TicketState {
    type Err = WorkflowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        Self::ALL
            .iter()
            .copied()
            .find(|state| state.name() == normalized)
            .ok_or_else(|| WorkflowError::UnknownState(s.to_string()))
    }
}

/// Caller's pick at the `WorkStarted` branch point
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[serde(rename_all = "snake_case")]
pub enum AdvanceChoice {
    PartialWork,
    Finished,
}

impl AdvanceChoice {
    pub fn target(self) -> TicketState {
        match self {
            AdvanceChoice::PartialWork => TicketState::PartialWork,
            AdvanceChoice::Finished => TicketState::Finished,
        }
    }
}

impl fmt::Display for AdvanceChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.target().fmt(f)
    }
}

/// Requested ticket transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[serde(tag = "action", content = "choice", rename_all = "snake_case")]
pub enum TicketAction {
    Advance(Option<AdvanceChoice>),
    Reassign,
}

impl fmt::Display for TicketAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketAction::Advance(Some(choice)) => write!(f, "advance:{choice}"),
            TicketAction::Advance(None) => f.write_str("advance"),
            TicketAction::Reassign => f.write_str("reassign"),
        }
    }
}
