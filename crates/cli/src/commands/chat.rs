//! `joi chat`: Interactive or single-message chat mode.
//!
//! Runs the same turn loop as the gateway, printing model text to stdout as
//! it streams and tool progress to stderr.

use std::io::Write;

use joi_agent::{TurnEvent, TurnOutcome, TurnRunner, TurnStatus};
use joi_core::session::Session;
use joi_gateway::AppState;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

const SESSION_ID: &str = "cli";

pub async fn run(
    model: Option<String>,
    message: Option<String>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = super::load_config()?;
    let state = AppState::from_config(&config);

    let model = model.unwrap_or_else(|| config.default_model.clone());
    if state.adapters().get(&model).is_none() {
        let known = state.adapters().list().join(", ");
        return Err(format!("Unknown model '{model}'. Available: {known}").into());
    }
    if !state.adapters().availability().get(&model).copied().unwrap_or(false) {
        eprintln!("  warning: no API key configured for '{model}'; replies will be errors");
    }

    let handle = state.sessions.create(SESSION_ID, &model).await;
    let mut session = handle.lock().await;

    if let Some(msg) = message {
        session.push_user(msg, None);
        run_and_print(&state.runner, &mut session).await?;
        return Ok(());
    }

    println!();
    println!("  Joi, interactive mode");
    println!("  Model:  {model}");
    println!("  Tools:  {}", state.runner.tools().names().join(", "));
    println!("  Type 'exit' or Ctrl+D to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line, "exit" | "quit") {
            break;
        }

        session.push_user(line, None);
        println!();
        print!("  Joi > ");
        run_and_print(&state.runner, &mut session).await?;
        println!();
    }

    println!();
    println!("  Goodbye!");
    Ok(())
}

/// Run one turn, printing events while it runs.
async fn run_and_print(
    runner: &TurnRunner,
    session: &mut Session,
) -> Result<TurnOutcome, Box<dyn std::error::Error>> {
    let (tx, mut rx) = mpsc::channel(64);

    let turn = async move { runner.run_turn(session, &tx).await };
    let print = async {
        let mut out = std::io::stdout();
        while let Some(event) = rx.recv().await {
            print_event(&mut out, &event)?;
        }
        Ok::<_, std::io::Error>(())
    };

    let (outcome, printed) = tokio::join!(turn, print);
    printed?;
    println!();

    if outcome.status == TurnStatus::RoundLimit {
        tracing::warn!(rounds = outcome.rounds, "Turn stopped at the tool round limit");
    }
    Ok(outcome)
}

fn print_event(out: &mut impl Write, event: &TurnEvent) -> std::io::Result<()> {
    match event {
        TurnEvent::Chunk(text) => {
            write!(out, "{text}")?;
            out.flush()?;
        }
        TurnEvent::Status(text) | TurnEvent::ToolStatus(text) => {
            eprintln!("\n  [{}] {text}", event.event_type());
        }
        TurnEvent::ToolResult(result) => {
            let first = result.result.lines().next().unwrap_or_default();
            eprintln!("  [{}] {first}", result.tool);
        }
        TurnEvent::Warning(text) => eprintln!("\n  [warning] {text}"),
        TurnEvent::Error(text) => eprintln!("\n  [error] {text}"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_go_to_stdout_verbatim() {
        let mut out = Vec::new();
        print_event(&mut out, &TurnEvent::Chunk("Hel".into())).unwrap();
        print_event(&mut out, &TurnEvent::Chunk("lo".into())).unwrap();
        print_event(&mut out, &TurnEvent::Status("Processing tool call 1/15".into())).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Hello");
    }
}
