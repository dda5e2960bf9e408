use anyhow::Result;

use crate::workflows::{CoordinatorError, ErrorDisposition, WorkflowError};

pub mod expense;
pub mod init_config;
pub mod ticket;

pub use expense::ExpenseCommand;
pub use init_config::InitConfigCommand;
pub use ticket::TicketCommand;

/// Print a failed request the way the user should read it, then hand the
/// error back so the process exits non-zero.
pub(crate) fn report_failure(action: &str, err: CoordinatorError) -> Result<()> {
    println!("❌ {action} failed: {err}");

    if let CoordinatorError::Workflow(workflow_err) = &err {
        match workflow_err.disposition() {
            ErrorDisposition::Permission => {
                println!("   🔐 Check the acting user's role under [identity.users]");
            }
            ErrorDisposition::Reprompt => {
                println!("   💡 Pass --choice partial-work or --choice finished");
            }
            ErrorDisposition::Validation => match workflow_err {
                WorkflowError::OutOfOrder { blocking, .. } => {
                    println!("   ⏳ The {blocking} gate has to be approved first");
                }
                _ => println!("   ⏳ Only assigned or in-progress tickets can be reassigned"),
            },
            _ => {}
        }
    }

    if let CoordinatorError::RetriesExhausted { .. } = &err {
        println!("   🔄 Another reviewer kept updating this record; try again");
    }

    Err(err.into())
}

/// Render cents as a decimal amount.
pub(crate) fn format_amount(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
