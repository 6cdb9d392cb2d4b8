//! `memweave chat` — Interactive or single-message chat mode.

use std::sync::Arc;
use memweave_agent::{LoopOutcome, Session, TurnReport};
use memweave_config::AppConfig;
use memweave_core::event::EventBus;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    // Fail early with setup help when no key is configured
    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    export GEMINI_API_KEY=...      (Gemini, the default provider)");
        eprintln!("    export OPENAI_API_KEY=sk-...   (with MEMWEAVE_PROVIDER=openai)");
        eprintln!("    export MEMWEAVE_API_KEY=...    (generic)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let provider = memweave_providers::build_provider(&config.default_provider, &config)
        .map_err(|e| format!("Failed to initialize provider '{}': {e}", config.default_provider))?;

    let extractor = match memweave_providers::build_provider(&config.default_provider, &config) {
        Ok(p) => Some(p),
        Err(e) => {
            // The synthesizer reports the disabled state itself
            debug!(error = %e, "Could not initialize the knowledge extractor");
            None
        }
    };

    let event_bus = Arc::new(EventBus::default());
    let session = Session::from_config(&config, provider, extractor, event_bus)?;

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        });
    }

    if let Some(msg) = message {
        // Single message mode
        let turn = session.turn(&msg, &cancel).await?;
        println!("{}", turn.reply);
        return Ok(());
    }

    // Interactive mode
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║        Memweave — Interactive Mode            ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Memory:    {}", config.memory.dir.display());
    println!("  Workspace: {}", config.tools.workspace_dir.display());
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'quit' or press Ctrl+C to exit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout.write_all(b"  You > ").await?;
        stdout.flush().await?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = cancel.cancelled() => None,
        };
        let Some(line) = line else { break };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_quit(input) {
            break;
        }

        eprint!("  ...");
        let result = session.turn(input, &cancel).await;
        eprint!("\r     \r");

        match result {
            Ok(turn) => {
                print_turn(&turn);
                if turn.outcome == LoopOutcome::Cancelled {
                    break;
                }
            }
            Err(e) => {
                eprintln!("  [Error] {e}");
                println!();
            }
        }
    }

    println!();
    println!("  Goodbye!");
    println!();

    Ok(())
}

/// The exit sentinel, matched case-insensitively.
fn is_quit(input: &str) -> bool {
    input.eq_ignore_ascii_case("quit")
}

fn print_turn(turn: &TurnReport) {
    for call in &turn.tool_calls {
        let status = if call.success { "ok" } else { "failed" };
        println!("  [tool] {} ({status})", call.name);
    }
    println!();
    for line in turn.reply.lines() {
        println!("  AI > {line}");
    }
    if let LoopOutcome::GaveUp(_) = turn.outcome {
        println!("  (stopped after reaching the tool call limit)");
    }
    println!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_is_case_insensitive() {
        assert!(is_quit("quit"));
        assert!(is_quit("QUIT"));
        assert!(is_quit("Quit"));
        assert!(!is_quit("quitter"));
        assert!(!is_quit("exit"));
    }
}
