//! Transfer Ledger - simulation runner
//!
//! Runs three workloads, each against a freshly bootstrapped ledger:
//!
//! ```text
//! ┌──────────┐    ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │  Config  │───▶│ Ring/ORDERED │───▶│ Ring/TRYLOCK │───▶│ Random/MIXED │
//! │  (YAML)  │    │  4 workers   │    │  4 workers   │    │  N workers   │
//! └──────────┘    └──────────────┘    └──────────────┘    └──────────────┘
//! ```
//!
//! Usage: `transfer_ledger [--env <name>] [--json]`

use std::sync::Arc;

use anyhow::{Context, bail};

use transfer_ledger::config::{AccountSeed, AppConfig};
use transfer_ledger::simulation::{SimulationReport, ring_workload, run_simulation, run_workload};
use transfer_ledger::{EngineConfig, Ledger, LockStrategy, TransferEngine};

const RING_WORKERS: usize = 4;
const RING_ROUNDS: usize = 10;

// ============================================================
// ARGUMENTS
// ============================================================

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

fn use_json_output() -> bool {
    std::env::args().any(|a| a == "--json")
}

// ============================================================
// PHASES
// ============================================================

fn bootstrap(
    accounts: &[AccountSeed],
    engine_config: &EngineConfig,
) -> anyhow::Result<TransferEngine> {
    let ledger = Arc::new(Ledger::new());
    for seed in accounts {
        ledger
            .create_account(seed.id, seed.owner.clone(), seed.balance)
            .with_context(|| format!("Failed to open account {} ({})", seed.id, seed.owner))?;
    }
    Ok(TransferEngine::with_config(ledger, engine_config.clone()))
}

fn run_phases(config: &AppConfig) -> anyhow::Result<Vec<SimulationReport>> {
    let engine_config = config.engine.to_engine_config();
    let ids: Vec<_> = config.accounts.iter().map(|a| a.id).collect();
    let mut reports = Vec::with_capacity(3);

    for strategy in [LockStrategy::Ordered, LockStrategy::TryLock] {
        let engine = bootstrap(&config.accounts, &engine_config)?;
        reports.push(run_workload(
            &engine,
            &format!("ring/{}", strategy),
            ring_workload(&ids, RING_ROUNDS, strategy),
            RING_WORKERS,
            config.simulation.queue_capacity,
        ));
    }

    let engine = bootstrap(&config.accounts, &engine_config)?;
    reports.push(run_simulation(&engine, &ids, &config.simulation));

    Ok(reports)
}

// ============================================================
// MAIN
// ============================================================

fn main() -> anyhow::Result<()> {
    let env = get_env();
    let json = use_json_output();

    let app_config = AppConfig::load(&env)?;
    let _log_guard = transfer_ledger::logging::init_logging(&app_config)?;

    tracing::info!(
        env,
        accounts = app_config.accounts.len(),
        "Starting transfer ledger simulation"
    );

    let reports = run_phases(&app_config)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&reports).context("Failed to serialize reports")?
        );
    } else {
        for report in &reports {
            println!("{}\n", report);
        }
    }

    let drifted: Vec<&str> = reports
        .iter()
        .filter(|r| !r.is_conserved())
        .map(|r| r.label.as_str())
        .collect();
    if !drifted.is_empty() {
        bail!("Total balance not conserved in: {}", drifted.join(", "));
    }

    tracing::info!("All phases conserved total balance");
    Ok(())
}
