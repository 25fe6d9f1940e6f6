//! Command-line access to the pipeline core.
//!
//! Lets shell drivers that wrap an agent process reconcile its payload files,
//! ask the termination policy for a verdict, and append audit events.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use tracing::debug;

use pipeline::core::event::{Cursor, Event};
use pipeline::core::termination::FixedPolicy;
use pipeline::exit_codes;
use pipeline::io::config::load_config;
use pipeline::io::event_log::append;
use pipeline::io::result_store::{load_result, normalize_files};
use pipeline::logging;

#[derive(Parser)]
#[command(
    name = "pipeline",
    version,
    about = "Result reconciliation, termination decisions and audit logging for agent loops"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconcile result/status files and rewrite `result.json` in canonical form.
    Normalize {
        /// Path to `result.json`.
        #[arg(long)]
        result: Option<PathBuf>,
        /// Path to the legacy `status.json`.
        #[arg(long)]
        status: Option<PathBuf>,
    },
    /// Decide whether the loop stops after this iteration (exit 0 = continue).
    Decide {
        /// Iteration just completed (1-based).
        #[arg(long)]
        iteration: u32,
        #[arg(long)]
        result: Option<PathBuf>,
        #[arg(long)]
        status: Option<PathBuf>,
        /// Session `config.toml`; flags below override its termination values.
        #[arg(long)]
        config: Option<PathBuf>,
        #[arg(long, allow_negative_numbers = true)]
        iterations: Option<i64>,
        #[arg(long, allow_negative_numbers = true)]
        max: Option<i64>,
    },
    /// Append one event to an `events.jsonl` audit log.
    Emit {
        #[arg(long)]
        events: PathBuf,
        #[arg(long = "type")]
        event_type: String,
        #[arg(long)]
        session: String,
        #[arg(long)]
        node_path: Option<String>,
        #[arg(long)]
        node_run: Option<u32>,
        #[arg(long)]
        iteration: Option<u32>,
        #[arg(long)]
        provider: Option<String>,
        /// Event data as a JSON object.
        #[arg(long)]
        data: Option<String>,
    },
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Normalize { result, status } => cmd_normalize(result, status),
        Command::Decide {
            iteration,
            result,
            status,
            config,
            iterations,
            max,
        } => cmd_decide(iteration, result, status, config, iterations, max),
        Command::Emit {
            events,
            event_type,
            session,
            node_path,
            node_run,
            iteration,
            provider,
            data,
        } => {
            let cursor = cursor_from_flags(node_path, node_run, iteration, provider);
            cmd_emit(events, event_type, session, cursor, data)
        }
    }
}

fn cmd_normalize(result: Option<PathBuf>, status: Option<PathBuf>) -> Result<i32> {
    let loaded = normalize_files(result.as_deref(), status.as_deref())
        .context("normalize result files")?;
    let payload = serde_json::to_string_pretty(&loaded.result).context("serialize result")?;
    println!("{payload}");
    eprintln!("source: {}", loaded.source);
    Ok(exit_codes::OK)
}

fn cmd_decide(
    iteration: u32,
    result: Option<PathBuf>,
    status: Option<PathBuf>,
    config: Option<PathBuf>,
    iterations: Option<i64>,
    max: Option<i64>,
) -> Result<i32> {
    let mut termination = match config {
        Some(path) => {
            load_config(&path)
                .with_context(|| format!("load {}", path.display()))?
                .termination
        }
        None => Default::default(),
    };
    if iterations.is_some() {
        termination.iterations = iterations;
    }
    if max.is_some() {
        termination.max = max;
    }

    let loaded = load_result(result.as_deref(), status.as_deref()).context("load result")?;
    let verdict = FixedPolicy::new(termination).decide(iteration, &loaded.result);
    debug!(?verdict, source = %loaded.source, "decided");

    if !verdict.reason.is_empty() {
        println!("{}", verdict.reason);
    }
    Ok(match (verdict.done, verdict.is_error()) {
        (false, _) => exit_codes::OK,
        (true, false) => exit_codes::STOP,
        (true, true) => exit_codes::AGENT_ERROR,
    })
}

fn cmd_emit(
    events: PathBuf,
    event_type: String,
    session: String,
    cursor: Option<Cursor>,
    data: Option<String>,
) -> Result<i32> {
    let data = match data {
        Some(raw) => parse_data(&raw)?,
        None => Map::new(),
    };
    let event = Event {
        timestamp: String::new(),
        event_type,
        session,
        cursor,
        data,
    };
    append(&events, event).with_context(|| format!("append to {}", events.display()))?;
    Ok(exit_codes::OK)
}

fn cursor_from_flags(
    node_path: Option<String>,
    node_run: Option<u32>,
    iteration: Option<u32>,
    provider: Option<String>,
) -> Option<Cursor> {
    if node_path.is_none() && node_run.is_none() && iteration.is_none() && provider.is_none() {
        return None;
    }
    Some(Cursor {
        node_path: node_path.unwrap_or_default(),
        node_run: node_run.unwrap_or_default(),
        iteration: iteration.unwrap_or_default(),
        provider: provider.unwrap_or_default(),
    })
}

fn parse_data(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str::<Value>(raw).context("parse --data")? {
        Value::Object(map) => Ok(map),
        other => bail!("--data must be a JSON object, got {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_decide_with_overrides() {
        let cli = Cli::parse_from([
            "pipeline",
            "decide",
            "--iteration",
            "2",
            "--status",
            "status.json",
            "--max",
            "-1",
        ]);
        match cli.command {
            Command::Decide {
                iteration,
                status,
                max,
                result,
                ..
            } => {
                assert_eq!(iteration, 2);
                assert_eq!(status, Some(PathBuf::from("status.json")));
                assert_eq!(max, Some(-1));
                assert!(result.is_none());
            }
            _ => panic!("expected decide"),
        }
    }

    #[test]
    fn parse_emit_type_flag() {
        let cli = Cli::parse_from([
            "pipeline",
            "emit",
            "--events",
            "events.jsonl",
            "--type",
            "node_start",
            "--session",
            "s",
        ]);
        assert!(matches!(
            cli.command,
            Command::Emit { ref event_type, .. } if event_type == "node_start"
        ));
    }

    #[test]
    fn cursor_only_when_a_flag_is_given() {
        assert_eq!(cursor_from_flags(None, None, None, None), None);
        let cursor = cursor_from_flags(None, None, Some(3), None).expect("cursor");
        assert_eq!(cursor.iteration, 3);
        assert!(cursor.node_path.is_empty());
    }

    #[test]
    fn data_must_be_an_object() {
        assert!(parse_data(r#"{"k":1}"#).is_ok());
        let err = parse_data("[1]").unwrap_err();
        assert!(err.to_string().contains("JSON object"));
    }
}
