// Ticket lifecycle transitions
//
// One table drives both the next-state lookup and the button label shown for
// each state.

use tracing::debug;

use super::types::{AdvanceChoice, TicketAction, TicketState};
use crate::workflows::WorkflowError;

/// Where `advance` goes from a given state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    To(TicketState),
    /// Caller must pick one of these.
    Branch(&'static [TicketState]),
    Terminal,
}

#[derive(Debug, Clone, Copy)]
pub struct TransitionRule {
    pub from: TicketState,
    pub next: Next,
    pub label: Option<&'static str>,
    /// Whether a reassignment may start from here.
    pub reassignable: bool,
}

const WORK_STARTED_BRANCHES: &[TicketState] = &[TicketState::PartialWork, TicketState::Finished];

pub const LIFECYCLE: [TransitionRule; 8] = [
    TransitionRule {
        from: TicketState::Started,
        next: Next::To(TicketState::TechnicianAssigned),
        label: Some("Confirm Assignment"),
        reassignable: false,
    },
    TransitionRule {
        from: TicketState::TechnicianAssigned,
        next: Next::To(TicketState::ConfirmedByTechnician),
        label: Some("Accept Ticket"),
        reassignable: true,
    },
    TransitionRule {
        from: TicketState::ConfirmedByTechnician,
        next: Next::To(TicketState::WorkStarted),
        label: Some("Start Work"),
        reassignable: true,
    },
    TransitionRule {
        from: TicketState::WorkStarted,
        next: Next::Branch(WORK_STARTED_BRANCHES),
        label: Some("Record Progress"),
        reassignable: true,
    },
    TransitionRule {
        from: TicketState::PartialWork,
        next: Next::To(TicketState::Finished),
        label: Some("Finish Work"),
        reassignable: true,
    },
    TransitionRule {
        from: TicketState::Finished,
        next: Next::To(TicketState::Closed),
        label: Some("Close Ticket"),
        reassignable: false,
    },
    TransitionRule {
        from: TicketState::Closed,
        next: Next::Terminal,
        label: None,
        reassignable: false,
    },
    TransitionRule {
        from: TicketState::ReassignTechnician,
        next: Next::To(TicketState::TechnicianAssigned),
        label: Some("Assign Technician"),
        reassignable: false,
    },
];

pub fn rule_for(state: TicketState) -> &'static TransitionRule {
    // LIFECYCLE lists every state exactly once, in declaration order.
    &LIFECYCLE[state as usize]
}

/// Next state along the lifecycle.
///
/// `choice` is only consulted at `WorkStarted`; elsewhere it is ignored.
pub fn advance(
    state: TicketState,
    choice: Option<AdvanceChoice>,
) -> Result<TicketState, WorkflowError> {
    match rule_for(state).next {
        Next::Terminal => Err(WorkflowError::TerminalState { state }),
        Next::To(next) => {
            if let Some(choice) = choice {
                debug!(state = %state, choice = %choice, "Ignoring choice outside branch point");
            }
            Ok(next)
        }
        Next::Branch(_) => match choice {
            Some(choice) => Ok(choice.target()),
            None => Err(WorkflowError::ChoiceRequired { state }),
        },
    }
}

/// Out-of-band move to `ReassignTechnician`.
pub fn reassign(state: TicketState) -> Result<TicketState, WorkflowError> {
    match state {
        TicketState::Closed => Err(WorkflowError::TerminalState { state }),
        TicketState::ReassignTechnician => Err(WorkflowError::AlreadyDecided {
            subject: "ticket".to_string(),
            state: state.to_string(),
        }),
        _ if rule_for(state).reassignable => Ok(TicketState::ReassignTechnician),
        _ => Err(WorkflowError::NotReassignable { state }),
    }
}

pub fn apply(state: TicketState, action: TicketAction) -> Result<TicketState, WorkflowError> {
    match action {
        TicketAction::Advance(choice) => advance(state, choice),
        TicketAction::Reassign => reassign(state),
    }
}

/// Button label for the primary action in `state`, if any.
pub fn action_label(state: TicketState) -> Option<&'static str> {
    rule_for(state).label
}

/// States reachable through `advance` from `state`.
pub fn next_states(state: TicketState) -> Vec<TicketState> {
    match rule_for(state).next {
        Next::To(next) => vec![next],
        Next::Branch(options) => options.to_vec(),
        Next::Terminal => Vec::new(),
    }
}

pub fn requires_choice(state: TicketState) -> bool {
    matches!(rule_for(state).next, Next::Branch(_))
}
