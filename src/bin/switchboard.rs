//! Switchboard CLI
//!
//! Inspect a descriptor set without a chat host: list participants and check
//! the handoff graph for missing targets and automatic cycles.

use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;

use switchboard::{init_logging, DescriptorKind, EngineConfig, HandoffGraph, Switchboard};

#[derive(Parser)]
#[command(name = "switchboard", about = "Inspect agent and prompt descriptors")]
struct Cli {
    /// Config file (TOML, YAML or JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the agents directory
    #[arg(long, global = true)]
    agents_dir: Option<PathBuf>,

    /// Override the prompts directory
    #[arg(long, global = true)]
    prompts_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List every participant
    List {
        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Report dangling handoff targets and automatic cycles
    Check {
        /// Exit non-zero when a handoff target is missing
        #[arg(long)]
        strict: bool,
    },
}

#[derive(Serialize)]
struct ListEntry<'a> {
    id: String,
    kind: DescriptorKind,
    name: &'a str,
    description: &'a str,
    model: &'a str,
    handoffs: Vec<&'a str>,
    source: String,
}

fn main() {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = EngineConfig::load(cli.config.as_deref()).context("loading configuration")?;
    if let Some(dir) = cli.agents_dir {
        config.agents_dir = dir;
    }
    if let Some(dir) = cli.prompts_dir {
        config.prompts_dir = dir;
    }
    init_logging(&config.logging).context("initializing logging")?;

    let board = Switchboard::load(config);

    match cli.command {
        Command::List { json } => {
            list(&board, json)?;
            Ok(0)
        }
        Command::Check { strict } => {
            let dangling = check(&board);
            Ok(if strict && dangling > 0 { 2 } else { 0 })
        }
    }
}

fn list(board: &Switchboard, json: bool) -> Result<()> {
    let participants = board.participants();

    if json {
        let entries: Vec<ListEntry<'_>> = participants
            .iter()
            .map(|p| ListEntry {
                id: p.id.clone(),
                kind: p.kind,
                name: &p.descriptor.name,
                description: &p.descriptor.description,
                model: &p.descriptor.model_hint,
                handoffs: p.descriptor.handoffs.iter().map(|h| h.target.as_str()).collect(),
                source: p.descriptor.source_path.display().to_string(),
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if participants.is_empty() {
        println!("No agents or prompts found.");
        return Ok(());
    }

    for p in &participants {
        println!("{:<32} {:<7} {}", p.id, p.kind.to_string(), p.descriptor.name);
        for handoff in &p.descriptor.handoffs {
            let mode = if handoff.auto_send { "auto" } else { "manual" };
            println!("{:<32}   -> {} ({})", "", handoff.target, mode);
        }
    }
    Ok(())
}

/// Print the report and return the number of missing targets
fn check(board: &Switchboard) -> usize {
    let graph = HandoffGraph::from_registry(&board.registry());
    let dangling = graph.dangling();
    let cycles = graph.auto_cycles();

    for edge in &dangling {
        println!("missing target: {} -> {}", edge.source, edge.target);
    }
    for cycle in &cycles {
        let mut path = cycle.clone();
        if let Some(first) = cycle.first() {
            path.push(first.clone());
        }
        println!("automatic cycle: {}", path.join(" -> "));
    }

    if dangling.is_empty() && cycles.is_empty() {
        println!("{} descriptors, no problems found", graph.len());
    }
    dangling.len()
}
