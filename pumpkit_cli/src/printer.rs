// Console output and listener callbacks for the CLI.

use chrono::Local;
use colored::Colorize;
use log::debug;
use pumpkit_core::filters::SnipeFilter;
use pumpkit_core::models::{BatchReport, OperationOutcome};
use pumpkit_core::ws::{EventHandler, ListenerState, MigrationEvent, NewTokenEvent, PortalEvent, TradeEvent, TradeSide};
use tokio::sync::mpsc;

fn stamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

fn or_dash(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("-")
}

pub fn print_outcome(label: &str, outcome: &OperationOutcome) {
    match outcome {
        OperationOutcome::Submitted { signature, confirmed, mint } => {
            let status = if *confirmed { "confirmed".green() } else { "sent".cyan() };
            println!("{} {} [{}] {}", label.bold(), status, stamp(), signature);
            if let Some(mint) = mint {
                println!("  mint: {}", mint);
            }
        }
        OperationOutcome::Rejected { status, message } => {
            println!("{} {} ({}): {}", label.bold(), "rejected".yellow(), status, message);
        }
    }
}

pub fn print_batch(label: &str, report: &BatchReport) {
    println!(
        "{} {} ok, {} rejected, {} failed of {}",
        label.bold(),
        report.succeeded.to_string().green(),
        report.rejected.to_string().yellow(),
        report.failed.to_string().red(),
        report.requested
    );
    for sig in &report.signatures {
        println!("  {}", sig);
    }
}

/// Prints every event as one line.
#[derive(Default)]
pub struct ConsolePrinter {
    pub printed: usize,
}

impl EventHandler for ConsolePrinter {
    fn on_state(&mut self, state: ListenerState) {
        debug!("listener state {:?}", state);
        let label = match state {
            ListenerState::Connected => "connected".green(),
            ListenerState::Subscribed => "subscribed".green(),
            ListenerState::Disconnected => "disconnected".red(),
        };
        println!("[{}] {}", stamp(), label);
    }

    fn on_new_token(&mut self, e: &NewTokenEvent) {
        self.printed += 1;
        println!(
            "[{}] {} {} ({}) mint={} mc={:.2} SOL dev={:.3} SOL",
            stamp(),
            "NEW".bright_green().bold(),
            or_dash(&e.name),
            or_dash(&e.symbol),
            e.mint,
            e.market_cap_sol.unwrap_or_default(),
            e.sol_amount.unwrap_or_default()
        );
    }

    fn on_trade(&mut self, e: &TradeEvent) {
        self.printed += 1;
        let side = match e.side {
            TradeSide::Buy => "BUY ".green(),
            TradeSide::Sell => "SELL".red(),
        };
        println!(
            "[{}] {} {} {:.4} SOL by {}",
            stamp(),
            side,
            e.mint,
            e.sol_amount.unwrap_or_default(),
            or_dash(&e.trader_public_key)
        );
    }

    fn on_migration(&mut self, e: &MigrationEvent) {
        self.printed += 1;
        println!("[{}] {} {} -> {}", stamp(), "MIGRATE".magenta(), e.mint, or_dash(&e.pool));
    }

    fn on_control(&mut self, event: &PortalEvent) {
        match event {
            PortalEvent::ServerError(msg) => println!("[{}] {} {}", stamp(), "server error:".red(), msg),
            PortalEvent::Notice(msg) => println!("[{}] {}", stamp(), msg.dimmed()),
            other => debug!("{:?}", other),
        }
    }
}

/// Forwards new tokens that pass `filter` to the buyer task.
pub struct SnipeHandler {
    pub filter: SnipeFilter,
    pub targets: mpsc::UnboundedSender<NewTokenEvent>,
    pub printer: ConsolePrinter,
}

impl EventHandler for SnipeHandler {
    fn on_state(&mut self, state: ListenerState) {
        self.printer.on_state(state);
    }

    fn on_new_token(&mut self, event: &NewTokenEvent) {
        if !self.filter.accepts(event) {
            debug!("filtered out {}", event.mint);
            return;
        }
        self.printer.on_new_token(event);
        if self.targets.send(event.clone()).is_err() {
            debug!("buyer task gone, dropping {}", event.mint);
        }
    }

    fn on_control(&mut self, event: &PortalEvent) {
        self.printer.on_control(event);
    }
}
