//! Monte-Carlo batch over a generated economy.
//!
//! Runs independent seeded simulations in parallel and reports the
//! distribution of firm and bank defaults across runs.

use credit_contagion::core::config::Calibration;
use credit_contagion::core::store::EntityStore;
use credit_contagion::simulation::period::SimulationError;
use credit_contagion::simulation::population::{generate_store, PopulationConfig};
use credit_contagion::simulation::runner::{run_batch, BatchConfig};
use rand::rngs::StdRng;

fn main() {
    env_logger::init();

    println!("╔════════════════════════════════════════════════╗");
    println!("║  credit-contagion: Monte-Carlo Batch           ║");
    println!("╚════════════════════════════════════════════════╝\n");

    let calibration = Calibration {
        periods: 12,
        ..Default::default()
    };
    let population = PopulationConfig {
        num_firms: 150,
        num_banks: 8,
        ..Default::default()
    };
    let config = BatchConfig {
        runs: 16,
        base_seed: 2024,
        max_attempts: 3,
    };

    let setup = |rng: &mut StdRng| -> Result<EntityStore, SimulationError> {
        Ok(generate_store(rng, &population, &calibration)?)
    };
    let batch = match run_batch(&calibration, &config, setup) {
        Ok(batch) => batch,
        Err(err) => {
            eprintln!("batch rejected: {err}");
            return;
        }
    };

    println!(
        "{:>4} {:>8} {:>9} {:>14} {:>14} {:>16}",
        "run", "seed", "attempts", "firm defaults", "bank defaults", "final equity"
    );
    let mut firm_defaults = Vec::new();
    let mut bank_defaults = Vec::new();
    for run in &batch {
        match &run.result {
            Ok(report) => {
                let equity = report.store.total_bank_equity();
                println!(
                    "{:>4} {:>8} {:>9} {:>14} {:>14} {:>16.0}",
                    run.run,
                    run.seed,
                    run.attempts,
                    report.total_firm_defaults(),
                    report.total_bank_defaults(),
                    equity
                );
                firm_defaults.push(report.total_firm_defaults() as f64);
                bank_defaults.push(report.total_bank_defaults() as f64);
            }
            Err(err) => println!("{:>4} {:>8} failed: {}", run.run, run.seed, err),
        }
    }

    if firm_defaults.is_empty() {
        return;
    }
    let mean = |values: &[f64]| values.iter().sum::<f64>() / values.len() as f64;
    println!();
    println!("Mean firm defaults per run: {:.1}", mean(&firm_defaults));
    println!("Mean bank defaults per run: {:.2}", mean(&bank_defaults));
    println!(
        "Runs with any bank default: {}/{}",
        bank_defaults.iter().filter(|d| **d > 0.0).count(),
        bank_defaults.len()
    );
}
