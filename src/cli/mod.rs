use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::approval::{ApprovalGate, StatusKind};
use crate::ticket::AdvanceChoice;

pub mod commands;

#[derive(Parser)]
#[command(name = "expense-desk")]
#[command(version)]
#[command(about = "Expense report approvals and service ticket tracking")]
#[command(long_about = "Expense Desk walks expense reports through the Assistant, Supervisor and \
                       Accounting approval gates, and moves service tickets through their \
                       technician lifecycle. Start with 'expense-desk init-config'.")]
pub struct Cli {
    /// Configuration file (defaults to ./expense-desk.toml when present)
    #[arg(long, global = true, help = "Path to a TOML configuration file")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a default configuration file
    InitConfig {
        /// Where to write the configuration
        #[arg(long, default_value = "expense-desk.toml")]
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long, help = "Overwrite the file if it already exists")]
        force: bool,
    },
    /// Submit, review and inspect expense reports
    Expense {
        #[command(subcommand)]
        command: ExpenseCommands,
    },
    /// Open, advance and inspect service tickets
    Ticket {
        #[command(subcommand)]
        command: TicketCommands,
    },
}

#[derive(Subcommand)]
pub enum ExpenseCommands {
    /// Submit a new expense report with every gate pending
    Create {
        #[arg(long)]
        id: String,
        #[arg(long)]
        title: String,
        /// User id of the submitting employee
        #[arg(long)]
        submitted_by: String,
        /// Reporting period, e.g. 2026-10
        #[arg(long)]
        period: String,
        #[arg(long, allow_negative_numbers = true)]
        amount_cents: i64,
    },
    /// Show a report with its gates and decision history
    Show {
        id: String,
        #[arg(long, help = "Print the report as JSON")]
        json: bool,
    },
    /// List reports, optionally filtered by display status
    List {
        #[arg(long, value_enum)]
        status: Option<StatusKind>,
        #[arg(long, help = "Print the reports as JSON")]
        json: bool,
    },
    /// Approve a gate
    Approve {
        id: String,
        /// assistant, supervisor or accounting
        #[arg(long)]
        gate: ApprovalGate,
        /// Acting user; their role comes from [identity]
        #[arg(long)]
        user: String,
    },
    /// Reject a gate
    Reject {
        id: String,
        /// assistant, supervisor or accounting
        #[arg(long)]
        gate: ApprovalGate,
        /// Acting user; their role comes from [identity]
        #[arg(long)]
        user: String,
    },
}

#[derive(Subcommand)]
pub enum TicketCommands {
    /// Open a new ticket in the Started state
    Create {
        #[arg(long)]
        id: String,
        #[arg(long)]
        customer: String,
        #[arg(long)]
        summary: String,
    },
    /// Show a ticket with its transition history
    Show {
        id: String,
        #[arg(long, help = "Print the ticket as JSON")]
        json: bool,
    },
    /// List all tickets
    List {
        #[arg(long, help = "Print the tickets as JSON")]
        json: bool,
    },
    /// Move a ticket to its next state
    Advance {
        id: String,
        #[arg(long)]
        user: String,
        /// Required once work has started
        #[arg(long, value_enum)]
        choice: Option<AdvanceChoice>,
        /// Technician recorded when the ticket gets assigned
        #[arg(long)]
        technician: Option<String>,
    },
    /// Take the ticket away from its technician
    Reassign {
        id: String,
        #[arg(long)]
        user: String,
    },
}
