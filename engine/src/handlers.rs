//! Command handlers for CLI operations
//!
//! - interview: interactive session on stdin
//! - ask: one candidate answer, one round, printed outcomes
//! - agents: list the configured panel
//! - doctor: validate configuration and check the backend

use anyhow::{Context, Result};
use sdk::{EngineError, SpeechOutput};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::agent::AgentOutcome;
use crate::collaborators::{NullSpeech, TracingGestures, TracingSpeech};
use crate::config::Config;
use crate::llm::{LLMEngine, OllamaEngine, ScriptedEngine};
use crate::message_bus::EventType;
use crate::session::{InterviewSession, RoundReport, SessionOptions};

/// Output format for command results
#[derive(Debug, Clone, Copy)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for machine consumption
    Json,
}

/// Build the engine named by `[llm] backend`, or the scripted one when forced
pub fn build_engine(config: &Config, scripted: bool) -> Arc<dyn LLMEngine> {
    if scripted || config.llm.backend == "scripted" {
        return Arc::new(ScriptedEngine::interview_demo());
    }

    let ollama = &config.llm.ollama;
    Arc::new(
        OllamaEngine::new(ollama.base_url.clone(), ollama.model.clone())
            .with_top_p(ollama.top_p)
            .with_num_ctx(ollama.num_ctx),
    )
}

async fn open_session(config: &Config, scripted: bool, mute: bool) -> Result<InterviewSession> {
    let engine = build_engine(config, scripted);
    engine
        .init()
        .await
        .map_err(EngineError::from)
        .with_context(|| format!("Failed to initialize {} engine", engine.name()))?;

    let speech: Arc<dyn SpeechOutput> = if mute {
        Arc::new(NullSpeech)
    } else {
        Arc::new(TracingSpeech)
    };

    let session = InterviewSession::new(
        config.agents.clone(),
        engine,
        SessionOptions::from_config(config),
        speech,
        Arc::new(TracingGestures),
    )
    .await
    .context("Failed to create interview session")?;

    if mute {
        session.set_global_voice(false);
    }

    Ok(session)
}

/// Run an interactive interview on stdin
///
/// Each non-empty line is a finalized candidate answer. Lines starting with
/// `/` are commands: `/quit`, `/clear`, `/history`, `/conclude`, `/voice on|off`.
pub async fn handle_interview(
    config: &Config,
    format: OutputFormat,
    scripted: bool,
    no_intro: bool,
    mute: bool,
) -> Result<()> {
    let session = open_session(config, scripted, mute).await?;

    let mut events = session.bus().subscribe(EventType::All).await;
    let event_log = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => tracing::debug!(target: "panel_engine::events", "{}", line),
                Err(e) => tracing::warn!("Unserializable event: {}", e),
            }
        }
    });

    let result = run_interview(&session, config, format, no_intro).await;
    let result = close_session(&session, config.core.transcript_dir.as_deref(), result).await;
    event_log.abort();
    result
}

async fn run_interview(
    session: &InterviewSession,
    config: &Config,
    format: OutputFormat,
    no_intro: bool,
) -> Result<()> {
    if let OutputFormat::Text = format {
        println!(
            "Panel: {}  (type /quit to leave, /conclude to wrap up)",
            config.agent_names().join(", ")
        );
        println!();
    }

    if !no_intro {
        let (agent, outcome) = session.start().await?;
        print_outcome(&agent, &outcome, format)?;
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if let OutputFormat::Text = format {
            use std::io::Write;
            print!("You: ");
            std::io::stdout().flush().ok();
        }

        let Some(line) = lines.next_line().await.context("Failed to read stdin")? else {
            break;
        };
        let line = line.trim();

        match line {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.reset().await;
                println!("(conversation cleared)");
            }
            "/history" => {
                println!("{}", session.memory().full_conversation().await);
                println!("{}", session.arbiter().speaker_history_line().await);
            }
            "/conclude" => {
                session.conclude().await;
                println!("(the panel is wrapping up; give your final answer)");
            }
            "/voice on" | "/voice off" => {
                session.set_global_voice(line.ends_with("on"));
            }
            cmd if cmd.starts_with('/') => {
                println!("Unknown command: {}", cmd);
            }
            answer => {
                let report = session.submit_user_utterance(answer).await?;
                print_report(&report, format)?;
            }
        }
    }

    Ok(())
}

/// Save the transcript when configured and shut the session down.
///
/// Runs whether or not `result` is an error; an error from the session
/// itself wins over a failed save.
async fn close_session<T>(
    session: &InterviewSession,
    transcript_dir: Option<&Path>,
    result: Result<T>,
) -> Result<T> {
    let saved = match transcript_dir {
        Some(dir) => save_transcript(session, dir).await,
        None => Ok(()),
    };
    session.shutdown().await;

    match (result, saved) {
        (Err(e), Err(save_error)) => {
            tracing::error!("{:#}", save_error);
            Err(e)
        }
        (Err(e), Ok(())) => Err(e),
        (Ok(_), Err(save_error)) => Err(save_error),
        (Ok(value), Ok(())) => Ok(value),
    }
}

/// Submit one answer and print every interviewer's outcome
pub async fn handle_ask(
    text: String,
    config: &Config,
    format: OutputFormat,
    scripted: bool,
) -> Result<()> {
    let session = open_session(config, scripted, true).await?;
    let result = session
        .submit_user_utterance(&text)
        .await
        .map_err(anyhow::Error::from);
    let report = close_session(&session, None, result).await?;

    match format {
        OutputFormat::Text => {
            for (agent, outcome) in &report.outcomes {
                let status = match outcome {
                    AgentOutcome::Skipped => "skipped".to_string(),
                    AgentOutcome::Declined => "declined".to_string(),
                    AgentOutcome::LostRace => "wanted to speak, floor taken".to_string(),
                    AgentOutcome::Spoke { text, .. } => format!("spoke: {}", text),
                };
                println!("  {:<12} {}", format!("{}:", agent), status);
            }
            if !report.anyone_spoke() {
                println!("No interviewer responded.");
            }
        }
        OutputFormat::Json => print_report(&report, format)?,
    }

    Ok(())
}

/// List the configured interviewers
pub async fn handle_agents(config: &Config, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("Interviewers ({}):", config.agents.len());
            for profile in &config.agents {
                println!("  {} - {}", profile.name, profile.role);
                if !profile.expertise.is_empty() {
                    println!("      expertise: {}", profile.expertise);
                }
                println!(
                    "      voice: {} ({})",
                    profile.voice_name,
                    if profile.voice_enabled { "on" } else { "off" }
                );
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&config.agents)?);
        }
    }
    Ok(())
}

/// Validate configuration and check the backend
pub async fn handle_doctor(config: &Config, format: OutputFormat) -> Result<()> {
    let mut issues = Vec::new();
    let mut checks: Vec<(&str, String)> = Vec::new();

    // Config is already validated when loaded
    checks.push(("Configuration", "Valid".to_string()));
    checks.push(("Interviewers", config.agents.len().to_string()));
    checks.push(("Backend", config.llm.backend.clone()));

    let engine = build_engine(config, false);
    if engine.check_health().await {
        checks.push(("LLM engine", format!("{} reachable", engine.name())));
    } else {
        checks.push(("LLM engine", format!("{} unreachable", engine.name())));
        issues.push(format!(
            "Cannot reach Ollama at {}. Start Ollama or use --scripted.",
            config.llm.ollama.base_url
        ));
    }

    match &config.core.transcript_dir {
        Some(dir) if dir.is_dir() => checks.push(("Transcript directory", "Exists".to_string())),
        Some(dir) => {
            checks.push(("Transcript directory", "Missing".to_string()));
            issues.push(format!("Transcript directory does not exist: {:?}", dir));
        }
        None => checks.push(("Transcript directory", "Not configured".to_string())),
    }

    match format {
        OutputFormat::Text => {
            println!("Panel Diagnostics");
            println!("=================");
            println!();

            for (check, status) in &checks {
                println!("  {:<25} {}", format!("{}:", check), status);
            }

            println!();

            if issues.is_empty() {
                println!("✓ All checks passed!");
            } else {
                println!("⚠ Issues found:");
                println!();
                for (i, issue) in issues.iter().enumerate() {
                    println!("  {}. {}", i + 1, issue);
                }
            }
        }
        OutputFormat::Json => {
            let output = json!({
                "checks": checks.iter().map(|(name, status)| {
                    json!({
                        "name": name,
                        "status": status
                    })
                }).collect::<Vec<_>>(),
                "issues": issues,
                "healthy": issues.is_empty()
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}

fn print_outcome(agent: &str, outcome: &AgentOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            if let Some(text) = outcome.text() {
                println!("{}: {}", agent, text);
            }
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(&json!({ "agent": agent, "result": outcome }))?
            );
        }
    }
    Ok(())
}

fn print_report(report: &RoundReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            for (agent, text) in report.spoken_lines() {
                println!("{}: {}", agent, text);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(report)?),
    }
    Ok(())
}

/// Write the long-form transcript to `<dir>/<session id>.txt`
async fn save_transcript(session: &InterviewSession, dir: &Path) -> Result<()> {
    let path = dir.join(format!("{}.txt", session.id()));
    let header = format!(
        "Interview {} started {}\n\n",
        session.id(),
        session.started_at().format("%Y-%m-%d %H:%M:%S")
    );
    let body = session.memory().full_conversation().await;

    tokio::fs::write(&path, header + &body)
        .await
        .with_context(|| format!("Failed to write transcript to {:?}", path))?;

    tracing::info!("Transcript saved to {:?}", path);
    Ok(())
}
