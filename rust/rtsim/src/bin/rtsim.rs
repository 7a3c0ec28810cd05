//! rtsim - Run real-time scheduling simulations from JSON scenarios.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use rtsim::{init_tracing, registry, Scenario, Simulator, Strategies};

/// Run real-time scheduling simulations from JSON scenarios.
#[derive(Parser)]
#[command(name = "rtsim")]
struct Cli {
    /// Path to a JSON scenario file.
    scenario: Option<PathBuf>,

    /// Scheduling algorithm, optionally prefixed with `global-`,
    /// `single-` or `hybrid-`.
    #[arg(short, long, default_value = "rms")]
    scheduler: String,

    /// Concurrency-control protocol.
    #[arg(short, long, default_value = "none")]
    protocol: String,

    /// DVFS method.
    #[arg(short, long, default_value = "none")]
    dvfs: String,

    /// Task-to-core partitioner.
    #[arg(long, default_value = "first-fit")]
    partition: String,

    /// Simulated ticks (overrides the scenario).
    #[arg(long, env = "RTSIM_HORIZON")]
    horizon: Option<u64>,

    /// Context-switch cost in ticks (overrides the scenario).
    #[arg(long, value_name = "TICKS")]
    context_switch: Option<u64>,

    /// Migration cost in ticks (overrides the scenario).
    #[arg(long, value_name = "TICKS")]
    migration: Option<u64>,

    /// Keep a started job on its core until it finishes.
    #[arg(long)]
    non_preemptive: bool,

    /// Print every core timeline to stderr.
    #[arg(long)]
    dump_trace: bool,

    /// Write the summary as JSON to file.
    #[arg(long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// List available strategies and exit.
    #[arg(long)]
    list: bool,
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    if let Err(e) = run(&cli) {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli) -> Result<()> {
    if cli.list {
        list_strategies();
        return Ok(());
    }

    let Some(path) = cli.scenario.as_ref() else {
        bail!("missing required argument: <SCENARIO>");
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let mut scenario: Scenario =
        serde_json::from_str(&json).context("failed to parse scenario")?;

    // Override scenario fields from CLI flags.
    if let Some(horizon) = cli.horizon {
        scenario.config.horizon = horizon;
    }
    if let Some(ticks) = cli.context_switch {
        scenario.config.context_switch_time = ticks;
    }
    if let Some(ticks) = cli.migration {
        scenario.config.migration_time = ticks;
    }
    if cli.non_preemptive {
        scenario.config.preemptive = false;
    }

    let strategies = Strategies::by_name(&cli.scheduler, &cli.protocol, &cli.dvfs, &cli.partition)?;
    let result = Simulator::new(strategies).run(&scenario)?;

    if cli.dump_trace {
        result.dump();
    }

    let summary = result.summary();
    println!("{summary}");

    if let Some(path) = &cli.output {
        let file = std::fs::File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(file, &summary).context("failed to write summary")?;
        eprintln!("wrote summary to {}", path.display());
    }

    Ok(())
}

fn list_strategies() {
    let prefixes = registry::SCHEDULER_PREFIXES.join(", ");
    println!("{:<14} {} (prefixes: {prefixes})", "schedulers", registry::SCHEDULERS.join(", "));
    println!("{:<14} {}", "protocols", registry::PROTOCOLS.join(", "));
    println!("{:<14} {}", "dvfs", registry::DVFS_METHODS.join(", "));
    println!("{:<14} {}", "partitioners", registry::PARTITIONERS.join(", "));
}
