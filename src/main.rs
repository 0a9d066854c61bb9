//! crewchat - run the configured team on a task read from stdin
//!
//! The first input line is the task; later lines answer human-proxy agents.

use anyhow::Result;
use colored::Colorize;
use crewchat::config::Config;
use crewchat::execution::{build_model, build_team};
use crewchat::human::{ConsoleInput, InputProvider};
use crewchat::team::RunEvent;
use crewchat::telemetry::init_tracing;
use crewchat::types::{Message, MessageKind, RunResult};
use futures_util::StreamExt;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

fn render_message(message: &Message) {
    let source = message.source.cyan().bold();
    match message.kind {
        MessageKind::Plain => println!("{} {}", source, message.text_content()),
        MessageKind::ToolCall => {
            for call in &message.tool_calls {
                println!("{} {} {}({})", source, "→".dimmed(), call.name.yellow(), call.arguments);
            }
        }
        MessageKind::ToolResult => {
            for result in &message.tool_results {
                if result.success {
                    println!("  {} {}: {}", "✓".green(), result.tool, result.output);
                } else {
                    println!("  {} {}: {}", "✗".red(), result.tool, result.render());
                }
            }
        }
        MessageKind::Handoff => println!(
            "{} {} {}",
            source,
            "handoff →".magenta(),
            message.handoff_target.as_deref().unwrap_or("?")
        ),
    }
}

fn render_summary(result: &RunResult) {
    let stats = &result.stats;
    let usage = result.usage();

    println!();
    println!("📊 Run Summary");
    println!("─────────────────────────────────────");
    println!("Stop reason:       {}", result.stop_reason);
    println!("Duration:          {:.2}s", result.duration.as_secs_f64());
    println!("Turns:             {} ({} skipped)", result.turns, stats.skipped_turns);
    println!("Messages:          {}", result.messages.len());
    println!("Tool calls:        {}", stats.tool_calls);
    println!("Tool success rate: {:.1}%", stats.tool_success_rate() * 100.0);
    println!("Handoffs:          {}", stats.handoffs);
    println!(
        "Tokens:            {} prompt / {} completion",
        usage.prompt_tokens, usage.completion_tokens
    );

    if let Some(e) = &result.error {
        eprintln!("{}: {}", "Error".red().bold(), e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing(std::env::var_os("CREWCHAT_VERBOSE").is_some());

    let config = Config::load()?;

    let input = Arc::new(ConsoleInput::new());
    let task = match input.read_input("Task:").await {
        Ok(task) if !task.trim().is_empty() => task.trim().to_string(),
        _ => {
            println!("crewchat - multi-agent task runner");
            println!("\nUsage:");
            println!("  echo \"<task>\" | crewchat");
            println!("\nTeam, model and limits are read from {}", Config::config_path()?.display());
            return Ok(());
        }
    };

    let model = build_model(&config.model)?;
    let mut team = build_team(&config, model, input)?;

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", "Cancelling after the current turn...".yellow());
            ctrl_c.cancel();
        }
    });

    println!("{} {}", "Task:".bold(), task);
    println!();

    let events = team.run_stream(task, cancel);
    futures_util::pin_mut!(events);

    let mut outcome = None;
    // Agent whose output is being printed as it streams
    let mut streaming: Option<String> = None;
    while let Some(event) = events.next().await {
        match event {
            RunEvent::Chunk { agent, text } => {
                if streaming.as_deref() != Some(agent.as_str()) {
                    if streaming.is_some() {
                        println!();
                    }
                    print!("{} ", agent.cyan().bold());
                    streaming = Some(agent);
                }
                print!("{}", text);
                std::io::stdout().flush().ok();
            }
            RunEvent::Message(message) if message.is_task() => {}
            RunEvent::Message(message) => match streaming.take() {
                Some(agent) if agent == message.source && message.kind == MessageKind::Plain => println!(),
                Some(_) => {
                    println!();
                    render_message(&message);
                }
                None => render_message(&message),
            },
            RunEvent::StateChanged { .. } => {}
            RunEvent::Finished(result) => outcome = Some(result),
        }
    }

    match outcome {
        Some(result) => {
            render_summary(&result);
            if !result.is_success() {
                std::process::exit(1);
            }
        }
        None => anyhow::bail!("run ended without a result"),
    }

    Ok(())
}
