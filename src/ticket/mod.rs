// Service ticket lifecycle - technician workflow with one branch point

pub mod types;
pub mod lifecycle;


pub use types::{AdvanceChoice, TicketAction, TicketState};
pub use lifecycle::{action_label, advance, apply, next_states, reassign, requires_choice};
