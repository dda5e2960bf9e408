use anyhow::Result;
use serde::Serialize;

use super::report_failure;
use crate::store::ServiceTicket;
use crate::ticket::{self, AdvanceChoice};
use crate::workflows::{DecisionOutcome, WorkflowCoordinator};

#[derive(Serialize)]
struct TicketView<'r> {
    #[serde(flatten)]
    ticket: &'r ServiceTicket,
    next_action: Option<&'static str>,
}

impl<'r> From<&'r ServiceTicket> for TicketView<'r> {
    fn from(ticket: &'r ServiceTicket) -> Self {
        Self {
            ticket,
            next_action: ticket.next_action_label(),
        }
    }
}

pub struct TicketCommand<'a> {
    coordinator: &'a WorkflowCoordinator,
    json: bool,
}

impl<'a> TicketCommand<'a> {
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

    pub async fn create(&self, id: &str, customer: &str, summary: &str) -> Result<()> {
        match self
            .coordinator
            .create_ticket(ServiceTicket::new(id, customer, summary))
            .await
        {
            Ok(ticket) => {
                println!("✅ Opened ticket {} for {}", ticket.id, ticket.customer);
                print_next_step(&ticket);
                Ok(())
            }
            Err(e) => report_failure("Opening ticket", e),
        }
    }

    pub async fn show(&self, id: &str) -> Result<()> {
        let ticket = match self.coordinator.load_ticket(id).await {
            Ok(ticket) => ticket,
            Err(e) => return report_failure("Loading ticket", e),
        };

        if self.json {
            println!("{}", serde_json::to_string_pretty(&TicketView::from(&ticket))?);
            return Ok(());
        }

        println!("🎫 TICKET {}", ticket.id);
        println!("==========================");
        println!("   🏢 Customer: {}", ticket.customer);
        println!("   📝 Summary: {}", ticket.summary);
        println!("   📍 State: {}", ticket.state);
        println!(
            "   🔧 Technician: {}",
            ticket.technician.as_deref().unwrap_or("unassigned")
        );
        print_next_step(&ticket);

        if !ticket.history.is_empty() {
            println!();
            println!("🕒 HISTORY:");
            println!("──────────");
            for transition in &ticket.history {
                println!(
                    "   {} {} → {} by {}",
                    transition.at.format("%Y-%m-%d %H:%M:%S"),
                    transition.from,
                    transition.to,
                    transition.actor
                );
            }
        }

        Ok(())
    }

    pub async fn list(&self) -> Result<()> {
        let tickets = match self.coordinator.list_tickets().await {
            Ok(tickets) => tickets,
            Err(e) => return report_failure("Listing tickets", e),
        };

        if self.json {
            let views: Vec<TicketView<'_>> = tickets.iter().map(TicketView::from).collect();
            println!("{}", serde_json::to_string_pretty(&views)?);
            return Ok(());
        }

        if tickets.is_empty() {
            println!("📋 No tickets found");
            return Ok(());
        }

        println!("📋 {} ticket(s):", tickets.len());
        for ticket in &tickets {
            println!(
                "   {:<16} {:<26} {:<14} {}",
                ticket.id,
                ticket.state.to_string(),
                ticket.technician.as_deref().unwrap_or("-"),
                ticket.customer
            );
        }
        Ok(())
    }

    pub async fn advance(
        &self,
        id: &str,
        user: &str,
        choice: Option<AdvanceChoice>,
        technician: Option<&str>,
    ) -> Result<()> {
        let outcome = self
            .coordinator
            .advance_ticket(id, user, choice, technician)
            .await;
        self.print_transition("Advancing ticket", outcome)
    }

    pub async fn reassign(&self, id: &str, user: &str) -> Result<()> {
        let outcome = self.coordinator.reassign_ticket(id, user).await;
        self.print_transition("Reassigning ticket", outcome)
    }

    fn print_transition(
        &self,
        action: &str,
        outcome: Result<DecisionOutcome<ServiceTicket>, crate::workflows::CoordinatorError>,
    ) -> Result<()> {
        match outcome {
            Ok(DecisionOutcome::Applied(ticket)) => {
                if let Some(last) = ticket.history.last() {
                    println!("✅ Ticket {}: {} → {}", ticket.id, last.from, last.to);
                } else {
                    println!("✅ Ticket {} is now {}", ticket.id, ticket.state);
                }
                if let Some(technician) = &ticket.technician {
                    println!("   🔧 Technician: {technician}");
                }
                print_next_step(&ticket);
                Ok(())
            }
            Ok(DecisionOutcome::Unchanged { record, notice }) => {
                println!("ℹ️  {notice}");
                print_next_step(&record);
                Ok(())
            }
            Err(e) => report_failure(action, e),
        }
    }
}

fn print_next_step(ticket: &ServiceTicket) {
    match ticket.next_action_label() {
        Some(label) if ticket::requires_choice(ticket.state) => {
            println!("   👉 Next: {label} (--choice partial-work | finished)");
        }
        Some(label) => println!("   👉 Next: {label}"),
        None => println!("   🏁 Ticket is closed"),
    }
}
