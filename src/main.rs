use anyhow::Context;
use clap::Parser;
use sentryforge::config::ConfigManager;
use sentryforge::engines::evaluation::CentroidOracle;
use sentryforge::engines::execution::ExecutionEngine;
use sentryforge::engines::generation::{ConsoleProgressCallback, SearchEngine, SearchSettings};
use sentryforge::ledger::{AuditLedger, HashChainLedger};
use std::path::PathBuf;
use std::sync::Arc;

/// Evolve a runtime security policy for a target program.
#[derive(Debug, Parser)]
#[command(name = "sentryforge")]
#[command(about = "Evolutionary search for runtime security policies")]
struct Cli {
    /// TOML or JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Seed for a reproducible search
    #[arg(long)]
    seed: Option<u64>,
    /// Re-run the champion this many times against both workloads
    #[arg(long, default_value_t = 0)]
    gauntlet: usize,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let manager = ConfigManager::new();
    manager
        .load(cli.config.as_deref())
        .context("loading configuration")?;
    if let Some(seed) = cli.seed {
        manager.update(|config| config.evolution.seed = Some(seed))?;
    }
    let config = manager.get();

    let workloads = config.workloads.resolve().context("resolving workloads")?;
    let oracle = CentroidOracle::load_or_unavailable(&config.oracle.profiles_path);
    let ledger = Arc::new(
        HashChainLedger::create(&config.ledger.output_dir).context("initializing ledger")?,
    );
    let executor = ExecutionEngine::new(config.target.to_spec(), config.execution.clone());

    let mut engine = SearchEngine::new(
        SearchSettings::from(&config),
        workloads,
        executor,
        oracle,
        Arc::clone(&ledger) as Arc<dyn AuditLedger>,
    )?;
    let outcome = engine.run(ConsoleProgressCallback).context("policy search failed")?;

    println!("{}", serde_json::to_string_pretty(&outcome.champion.genome)?);
    println!("fitness: {:.4}", outcome.champion.rank_fitness());
    for (term, value) in &outcome.champion.breakdown {
        println!("  {}: {:.4}", term, value);
    }

    if cli.gauntlet > 0 {
        let report = engine.validate_champion(&outcome.champion.genome, cli.gauntlet);
        println!(
            "gauntlet: {}/{} benign passes, {}/{} attacks blocked",
            report.benign_passes, report.trials, report.attack_blocks, report.trials
        );
    }

    if let Some(path) = ledger.path() {
        println!("ledger: {}", path.display());
    }
    Ok(())
}
