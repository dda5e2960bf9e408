use anyhow::Result;
use clap::Parser;

use expense_desk::cli::commands::{ExpenseCommand, InitConfigCommand, TicketCommand};
use expense_desk::cli::{Cli, Commands, ExpenseCommands, TicketCommands};
use expense_desk::config::{ExpenseDeskConfig, StoreBackend};
use expense_desk::{
    init_telemetry, workflow_metrics, ExpenseAction, OperationTimer, WorkflowCoordinator,
};

fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::InitConfig { path, force } = &cli.command {
        return InitConfigCommand::new(path.clone(), *force).execute();
    }

    ExpenseDeskConfig::load_env_file()?;
    let config = ExpenseDeskConfig::load(cli.config.as_deref())?;
    init_telemetry(&config.observability)?;

    if config.store.backend == StoreBackend::Memory {
        tracing::warn!("Memory store selected; nothing will persist past this command");
    }

    let coordinator = WorkflowCoordinator::from_config(&config)?;

    tokio::runtime::Runtime::new()?.block_on(async {
        let timer = OperationTimer::new("cli_command");
        let result = run(cli.command, &coordinator).await;
        timer.finish();
        workflow_metrics().log_stats();
        result
    })
}

async fn run(command: Commands, coordinator: &WorkflowCoordinator) -> Result<()> {
    match command {
        Commands::InitConfig { path, force } => InitConfigCommand::new(path, force).execute(),
        Commands::Expense { command } => match command {
            ExpenseCommands::Create {
                id,
                title,
                submitted_by,
                period,
                amount_cents,
            } => {
                ExpenseCommand::new(coordinator)
                    .create(&id, &title, &submitted_by, &period, amount_cents)
                    .await
            }
            ExpenseCommands::Show { id, json } => {
                ExpenseCommand::new(coordinator).with_json(json).show(&id).await
            }
            ExpenseCommands::List { status, json } => {
                ExpenseCommand::new(coordinator).with_json(json).list(status).await
            }
            ExpenseCommands::Approve { id, gate, user } => {
                ExpenseCommand::new(coordinator)
                    .decide(&id, &user, ExpenseAction::Approve(gate))
                    .await
            }
            ExpenseCommands::Reject { id, gate, user } => {
                ExpenseCommand::new(coordinator)
                    .decide(&id, &user, ExpenseAction::Reject(gate))
                    .await
            }
        },
        Commands::Ticket { command } => match command {
            TicketCommands::Create { id, customer, summary } => {
                TicketCommand::new(coordinator).create(&id, &customer, &summary).await
            }
            TicketCommands::Show { id, json } => {
                TicketCommand::new(coordinator).with_json(json).show(&id).await
            }
            TicketCommands::List { json } => {
                TicketCommand::new(coordinator).with_json(json).list().await
            }
            TicketCommands::Advance {
                id,
                user,
                choice,
                technician,
            } => {
                TicketCommand::new(coordinator)
                    .advance(&id, &user, choice, technician.as_deref())
                    .await
            }
            TicketCommands::Reassign { id, user } => {
                TicketCommand::new(coordinator).reassign(&id, &user).await
            }
        },
    }
}
