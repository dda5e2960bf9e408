use anyhow::Result;
use serde::Serialize;

use super::{format_amount, report_failure};
use crate::approval::{ApprovalGate, DisplayStatus, ExpenseAction, GateState, StatusKind};
use crate::store::ExpenseReport;
use crate::workflows::{DecisionOutcome, WorkflowCoordinator};

/// JSON shape for reports: the stored record plus its derived status.
#[derive(Serialize)]
struct ExpenseView<'r> {
    #[serde(flatten)]
    report: &'r ExpenseReport,
    status: DisplayStatus,
    status_label: String,
}

impl<'r> From<&'r ExpenseReport> for ExpenseView<'r> {
    fn from(report: &'r ExpenseReport) -> Self {
        let status = report.display_status();
        Self {
            report,
            status,
            status_label: status.label(),
        }
    }
}

pub struct ExpenseCommand<'a> {
    coordinator: &'a WorkflowCoordinator,
    json: bool,
}

impl<'a> ExpenseCommand<'a> {
    pub fn new(coordinator: &'a WorkflowCoordinator) -> Self {
        Self {
            coordinator,
            json: false,
        }
    }

    pub fn with_json(mut self, json: bool) -> Self {
        self.json = json;
        self
    }

    pub async fn create(
        &self,
        id: &str,
        title: &str,
        submitted_by: &str,
        period: &str,
        amount_cents: i64,
    ) -> Result<()> {
        let report = ExpenseReport::new(id, title, submitted_by, period, amount_cents);

        match self.coordinator.create_expense(report).await {
            Ok(report) => {
                println!("✅ Submitted expense report {}", report.id);
                println!("   📝 {}", report.title);
                println!("   💰 {} for {}", format_amount(report.amount_cents), report.period);
                println!("   📊 Status: {}", report.display_status());
                Ok(())
            }
            Err(e) => report_failure("Submitting expense report", e),
        }
    }

    pub async fn show(&self, id: &str) -> Result<()> {
        let report = match self.coordinator.load_expense(id).await {
            Ok(report) => report,
            Err(e) => return report_failure("Loading expense report", e),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&ExpenseView::from(&report))?);
            return Ok(());
        }

        println!("📄 EXPENSE REPORT {}", report.id);
        println!("==========================");
        println!("   📝 Title: {}", report.title);
        println!("   👤 Submitted by: {}", report.submitted_by);
        println!("   🗓️  Period: {}", report.period);
        println!("   💰 Amount: {}", format_amount(report.amount_cents));
        println!("   📊 Status: {}", report.display_status());
        println!(
            "   {} Employee edits: {}",
            if report.workflow.edit_locked { "🔒" } else { "🔓" },
            if report.workflow.edit_locked { "locked" } else { "open" }
        );
        println!();

        println!("🚦 GATES:");
        println!("────────");
        for gate in ApprovalGate::ALL {
            let state = report.workflow.gates.get(gate);
            let icon = match state {
                GateState::Pending => "⏳",
                GateState::Approved => "✅",
                GateState::Rejected => "❌",
            };
            println!("   {icon} {gate}: {state}");
        }

        if !report.history.is_empty() {
            println!();
            println!("🕒 HISTORY:");
            println!("──────────");
            for decision in &report.history {
                println!(
                    "   {} {} by {} ({})",
                    decision.decided_at.format("%Y-%m-%d %H:%M:%S"),
                    decision.action,
                    decision.actor,
                    decision.role
                );
            }
        }

        Ok(())
    }

    pub async fn list(&self, filter: Option<StatusKind>) -> Result<()> {
        let reports = match self.coordinator.list_expenses(filter).await {
            Ok(reports) => reports,
            Err(e) => return report_failure("Listing expense reports", e),
        };

        if self.json {
            let views: Vec<ExpenseView<'_>> = reports.iter().map(ExpenseView::from).collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
            return Ok(());
        }

        if reports.is_empty() {
            println!("📋 No expense reports found");
            return Ok(());
        }

        println!("📋 {} expense report(s):", reports.len());
        for report in &reports {
            println!(
                "   {:<16} {:<24} {:>12}  {} ({})",
                report.id,
                report.display_status().label(),
                format_amount(report.amount_cents),
                report.title,
                report.submitted_by
            );
        }
        Ok(())
    }

    pub async fn decide(&self, id: &str, user: &str, action: ExpenseAction) -> Result<()> {
        match self.coordinator.decide_expense(id, user, action).await {
            Ok(DecisionOutcome::Applied(report)) => {
                let verb = match action {
                    ExpenseAction::Approve(_) => "Approved",
                    ExpenseAction::Reject(_) => "Rejected",
                };
                println!("✅ {verb} the {} gate on {}", action.gate(), report.id);
                println!("   📊 Status: {}", report.display_status());
                Ok(())
            }
            Ok(DecisionOutcome::Unchanged { record, notice }) => {
                println!("ℹ️  {notice}");
                println!("   📊 Status: {}", record.display_status());
                Ok(())
            }
            Err(e) => report_failure("Recording decision", e),
        }
    }
}
