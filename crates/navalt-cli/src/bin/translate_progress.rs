//! CLI tool to translate primary route progress onto an alternative route.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use navalt_cli::ForkScenario;

/// Translate primary progress through a fork (reads a JSON scenario)
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Scenario file
    scenario: PathBuf,

    /// Override the primary route geometry index
    #[arg(long)]
    route_index: Option<usize>,

    /// Pretty-print the result
    #[arg(long)]
    pretty: bool,
}

fn main() -> anyhow::Result<()> {
    navalt_cli::init_tracing()?;
    let args = Args::parse();

    let raw = std::fs::read_to_string(&args.scenario)
        .with_context(|| format!("Failed to read {}", args.scenario.display()))?;
    let mut scenario = ForkScenario::from_json(&raw)?;
    if let Some(route_index) = args.route_index {
        scenario.primary.route_geometry_index = route_index;
    }

    let progress = scenario.evaluate();
    tracing::debug!(primary = ?scenario.primary, ?progress, "Translated progress");

    let output = if args.pretty {
        serde_json::to_string_pretty(&progress)?
    } else {
        serde_json::to_string(&progress)?
    };
    println!("{}", output);
    Ok(())
}
