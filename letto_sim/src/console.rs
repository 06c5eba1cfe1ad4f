//! Console front end: renders draws in a terminal and reads commands
//! from stdin.

use crate::error::SimError;
use letto_core::{DrawError, DrawRecord, DrawSession, DrawView, Presenter};
use letto_env::DrawContext;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{debug, info, warn};

/// Commands accepted on stdin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Next,
    History,
    Status,
    Reset,
    Help,
    Quit,
}

impl ConsoleCommand {
    pub fn all() -> Vec<ConsoleCommand> {
        vec![
            ConsoleCommand::Start,
            ConsoleCommand::Next,
            ConsoleCommand::History,
            ConsoleCommand::Status,
            ConsoleCommand::Reset,
            ConsoleCommand::Help,
            ConsoleCommand::Quit,
        ]
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConsoleCommand::Start => "start",
            ConsoleCommand::Next => "next",
            ConsoleCommand::History => "history",
            ConsoleCommand::Status => "status",
            ConsoleCommand::Reset => "reset",
            ConsoleCommand::Help => "help",
            ConsoleCommand::Quit => "quit",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ConsoleCommand::Start => "draw a winner for the current tier (or just press Enter)",
            ConsoleCommand::Next => "move to the next prize tier",
            ConsoleCommand::History => "list winners, newest first",
            ConsoleCommand::Status => "show the current tier and counts",
            ConsoleCommand::Reset => "clear all results (asks for confirmation)",
            ConsoleCommand::Help => "show this list",
            ConsoleCommand::Quit => "exit",
        }
    }
}

impl std::fmt::Display for ConsoleCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "start" | "s" | "draw" => Ok(ConsoleCommand::Start),
            "next" | "n" => Ok(ConsoleCommand::Next),
            "history" | "h" | "list" => Ok(ConsoleCommand::History),
            "status" | "st" => Ok(ConsoleCommand::Status),
            "reset" => Ok(ConsoleCommand::Reset),
            "help" | "?" => Ok(ConsoleCommand::Help),
            "quit" | "q" | "exit" => Ok(ConsoleCommand::Quit),
            other => Err(format!("Unknown command: {} (try 'help')", other)),
        }
    }
}

/// Presenter that prints to the terminal.
#[derive(Debug, Default)]
pub struct ConsolePresenter;

impl Presenter for ConsolePresenter {
    fn state_changed(&self, view: &DrawView) {
        let status = if view.rolling { "rolling..." } else { "ready" };
        println!(
            "Current prize: {} | {} | winners: {}",
            view.tier_label(),
            status,
            view.distinct_winners
        );
    }

    fn rolling_display(&self, name: &str) {
        print!("\r  >> {:<12}", name);
        let _ = std::io::stdout().flush();
    }

    fn winner_drawn(&self, record: &DrawRecord) {
        println!(
            "\r  ** {} wins {} (#{}) **",
            record.winner, record.tier, record.ordinal
        );
    }

    fn no_eligible_participants(&self, tier: &str) {
        println!("No more participants available for {}!", tier);
    }
}

/// Renders the winners list, newest first.
pub fn render_history(view: &DrawView) -> String {
    let mut out = format!("Lucky list ({})\n", view.distinct_winners);
    for entry in view.history_newest_first() {
        out.push_str(&format!("  {:<8} {}\n", entry.prize, entry.name));
    }
    out
}

fn print_help() {
    println!("Commands:");
    for command in ConsoleCommand::all() {
        println!("  {:<8} {}", command.name(), command.description());
    }
}

/// Asks before wiping everything. Prompt failures count as "no".
async fn confirm_reset() -> bool {
    let answer = tokio::task::spawn_blocking(|| {
        dialoguer::Confirm::new()
            .with_prompt("Reset ALL draw data? History will be cleared and the draw starts over")
            .default(false)
            .interact()
    })
    .await;

    match answer {
        Ok(Ok(confirmed)) => confirmed,
        Ok(Err(e)) => {
            warn!("Reset prompt failed: {}", e);
            false
        }
        Err(e) => {
            warn!("Reset prompt task failed: {}", e);
            false
        }
    }
}

/// Reads commands from stdin until `quit` or end of input.
pub async fn run_live<Ctx: DrawContext>(session: Arc<DrawSession<Ctx>>) -> Result<(), SimError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    print_help();
    ConsolePresenter.state_changed(&session.view());

    while let Some(line) = lines.next_line().await? {
        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };
        debug!(%command, "Console command");

        match command {
            ConsoleCommand::Start => match session.start_draw() {
                Ok(ticket) => {
                    if let Err(e) = ticket.finished().await {
                        warn!("Draw did not finish: {}", e);
                    }
                }
                // Already shown by the presenter
                Err(DrawError::NoEligibleParticipants { .. }) => {}
                Err(e) => println!("{}", e),
            },
            ConsoleCommand::Next => {
                if let Err(e) = session.advance_tier() {
                    println!("{}", e);
                }
            }
            ConsoleCommand::History => print!("{}", render_history(&session.view())),
            ConsoleCommand::Status => ConsolePresenter.state_changed(&session.view()),
            ConsoleCommand::Reset => {
                if confirm_reset().await {
                    session.reset_all();
                } else {
                    info!("Cancelled");
                }
            }
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::Quit => break,
        }
    }

    Ok(())
}
