//! credit-contagion CLI
//!
//! Simulate credit networks and clear interbank obligations from the
//! command line.
//!
//! # Usage
//!
//! ```bash
//! # Simulate one seeded run with the default calibration
//! credit-contagion run --seed 7
//!
//! # Calibration and real bank balance sheets from JSON
//! credit-contagion run --calibration calibration.json --banks banks.json --format json
//!
//! # Monte-Carlo batch
//! credit-contagion run --runs 50 --seed 1000
//!
//! # Clear a liability matrix on its own
//! credit-contagion clear --input liabilities.json
//! ```

use chrono::Utc;
use credit_contagion::clearing::interbank::clearing_vector;
use credit_contagion::clearing::liability::LiabilityMatrix;
use credit_contagion::core::config::Calibration;
use credit_contagion::core::store::{BankData, EntityStore};
use credit_contagion::graph::exposure::ExposureGraph;
use credit_contagion::simulation::period::{PeriodSummary, SimulationError};
use credit_contagion::simulation::population::{generate_firms, generate_store, PopulationConfig};
use credit_contagion::simulation::runner::{run_batch, BatchConfig, RunReport};
use rand::rngs::StdRng;
use std::fs;
use std::process;

fn print_usage() {
    eprintln!(
        r#"credit-contagion — firm/bank credit network simulation with interbank clearing

USAGE:
    credit-contagion <COMMAND> [OPTIONS]

COMMANDS:
    run            Simulate seeded runs
    clear          Clear a liability matrix against initial wealth
    calibration    Print the default calibration as JSON
    help           Show this message

OPTIONS (run):
    --calibration <FILE>  JSON calibration (missing keys use defaults)
    --banks <FILE>        JSON bank data (equity, deposits, gross_loans vectors)
    --firms <N>           Number of generated firms (default: 200)
    --bank-count <N>      Number of generated banks without --banks (default: 10)
    --periods <N>         Override the calibration's period count
    --seed <N>            Seed of the first run (default: 0)
    --runs <N>            Number of runs, executed in parallel (default: 1)
    --format <FORMAT>     Output format: text (default) or json
    --output <FILE>       Write to file instead of stdout

OPTIONS (clear):
    --input <FILE>        JSON with "liabilities" (square matrix) and "wealth"
    --format <FORMAT>     Output format: text (default) or json

EXAMPLES:
    credit-contagion run --seed 7 --periods 10
    credit-contagion run --banks banks.json --runs 20 --format json --output batch.json
    credit-contagion clear --input liabilities.json"#
    );
}

fn fail(message: impl std::fmt::Display) -> ! {
    eprintln!("Error: {}", message);
    process::exit(1);
}

fn value<'a>(args: &'a [String], i: usize, flag: &str, what: &str) -> &'a str {
    args.get(i).map(String::as_str).unwrap_or_else(|| {
        eprintln!("{} requires {}", flag, what);
        process::exit(1);
    })
}

fn number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    value(args, i, flag, "a number").parse().unwrap_or_else(|_| {
        eprintln!("{} requires a number", flag);
        process::exit(1);
    })
}

fn emit(json: &str, output: Option<&str>) {
    match output {
        Some(path) => {
            fs::write(path, json).unwrap_or_else(|e| fail(format!("writing '{}': {}", path, e)));
            eprintln!("Report written to {}", path);
        }
        None => println!("{}", json),
    }
}

/// JSON report for one run.
#[derive(serde::Serialize)]
struct RunOutput {
    run: usize,
    seed: u64,
    attempts: usize,
    economy_path: Vec<usize>,
    periods: Vec<PeriodSummary>,
    defaulting_firms: usize,
    defaulting_banks: usize,
    error: Option<String>,
}

#[derive(serde::Serialize)]
struct BatchOutput {
    generated_at: String,
    calibration: Calibration,
    runs: Vec<RunOutput>,
}

fn print_report(report: &RunReport) {
    println!("=== Run (seed {}) ===", report.seed);
    for summary in report.summaries() {
        println!("{}", summary);
    }
    if let Some(last) = report.outcomes.last() {
        println!("\nFinal period:");
        println!("  Market price:      {:.2}", last.market_price);
        println!("  Bank equity:       {:.0}", last.bank_equity.iter().sum::<f64>());
        println!("  Liabilities:       {:.0}", last.liabilities.total());
        for cluster in &last.contagion_clusters {
            let banks: Vec<String> = cluster.banks.iter().map(|b| b.to_string()).collect();
            println!(
                "  Cluster:           {} (internal {:.0})",
                banks.join(", "),
                cluster.internal_obligations
            );
        }
    }
    println!(
        "\nTotals: {} firm defaults, {} bank defaults",
        report.total_firm_defaults(),
        report.total_bank_defaults()
    );
}

fn cmd_run(args: &[String]) {
    let mut calibration_path = None;
    let mut banks_path = None;
    let mut population = PopulationConfig::default();
    let mut periods: Option<usize> = None;
    let mut batch = BatchConfig {
        runs: 1,
        ..Default::default()
    };
    let mut format = "text".to_string();
    let mut output_path: Option<String> = None;
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        i += 1;
        match flag {
            "--calibration" => {
                calibration_path = Some(value(args, i, flag, "a file path").to_string())
            }
            "--banks" => banks_path = Some(value(args, i, flag, "a file path").to_string()),
            "--firms" => population.num_firms = number(args, i, flag),
            "--bank-count" => population.num_banks = number(args, i, flag),
            "--periods" => periods = Some(number(args, i, flag)),
            "--seed" => batch.base_seed = number(args, i, flag),
            "--runs" => batch.runs = number(args, i, flag),
            "--format" => format = value(args, i, flag, "'text' or 'json'").to_string(),
            "--output" => output_path = Some(value(args, i, flag, "a file path").to_string()),
            _ => fail(format!("unknown option: {}", flag)),
        }
        i += 1;
    }

    let mut calibration = match &calibration_path {
        Some(path) => Calibration::from_json_file(path).unwrap_or_else(|e| fail(e)),
        None => Calibration::default(),
    };
    if let Some(periods) = periods {
        calibration.periods = periods;
    }
    let bank_data = banks_path
        .as_ref()
        .map(|path| BankData::from_json_file(path).unwrap_or_else(|e| fail(e)));

    let setup = |rng: &mut StdRng| -> Result<EntityStore, SimulationError> {
        Ok(match &bank_data {
            Some(data) => {
                let firms = generate_firms(rng, &population, &calibration);
                EntityStore::from_bank_data(firms, data.clone(), &calibration)?
            }
            None => generate_store(rng, &population, &calibration)?,
        })
    };
    let runs = run_batch(&calibration, &batch, setup).unwrap_or_else(|e| fail(e));

    if format == "json" {
        let output = BatchOutput {
            generated_at: Utc::now().to_rfc3339(),
            calibration: calibration.clone(),
            runs: runs
                .iter()
                .map(|run| match &run.result {
                    Ok(report) => RunOutput {
                        run: run.run,
                        seed: run.seed,
                        attempts: run.attempts,
                        economy_path: report.economy_path.clone(),
                        periods: report.summaries(),
                        defaulting_firms: report.total_firm_defaults(),
                        defaulting_banks: report.total_bank_defaults(),
                        error: None,
                    },
                    Err(err) => RunOutput {
                        run: run.run,
                        seed: run.seed,
                        attempts: run.attempts,
                        economy_path: Vec::new(),
                        periods: Vec::new(),
                        defaulting_firms: 0,
                        defaulting_banks: 0,
                        error: Some(err.to_string()),
                    },
                })
                .collect(),
        };
        let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| fail(e));
        emit(&json, output_path.as_deref());
    } else {
        for run in &runs {
            match &run.result {
                Ok(report) => print_report(report),
                Err(err) => println!("Run {} failed after {} attempts: {}", run.run, run.attempts, err),
            }
            println!();
        }
        let failed = runs.iter().filter(|r| r.result.is_err()).count();
        if runs.len() > 1 {
            println!("{} runs, {} failed", runs.len(), failed);
        }
    }
}

#[derive(serde::Deserialize)]
struct ClearInput {
    liabilities: Vec<Vec<f64>>,
    wealth: Vec<f64>,
    #[serde(default)]
    tolerance: Option<f64>,
    #[serde(default)]
    max_iterations: Option<usize>,
}

#[derive(serde::Serialize)]
struct ClearOutput {
    payments: Vec<f64>,
    obligations: Vec<f64>,
    default_set: Vec<usize>,
    iterations: usize,
    clusters: Vec<Vec<usize>>,
}

fn cmd_clear(args: &[String]) {
    let mut input_path = None;
    let mut format = "text".to_string();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        i += 1;
        match flag {
            "--input" => input_path = Some(value(args, i, flag, "a file path").to_string()),
            "--format" => format = value(args, i, flag, "'text' or 'json'").to_string(),
            _ => fail(format!("unknown option: {}", flag)),
        }
        i += 1;
    }

    let path = input_path.unwrap_or_else(|| fail("--input <FILE> is required"));
    let content =
        fs::read_to_string(&path).unwrap_or_else(|e| fail(format!("reading '{}': {}", path, e)));
    let input: ClearInput = serde_json::from_str(&content).unwrap_or_else(|e| {
        eprintln!("Error parsing JSON: {}", e);
        eprintln!("Expected format:");
        eprintln!(r#"{{ "liabilities": [[0, 50], [0, 0]], "wealth": [30, 0] }}"#);
        process::exit(1);
    });

    let calibration = Calibration::default();
    let matrix = LiabilityMatrix::from_rows(&input.liabilities).unwrap_or_else(|e| fail(e));
    let result = clearing_vector(
        &matrix,
        &input.wealth,
        input.tolerance.unwrap_or(calibration.clearing_tolerance),
        input
            .max_iterations
            .unwrap_or(calibration.max_clearing_iterations),
    )
    .unwrap_or_else(|e| fail(e));
    let clusters = ExposureGraph::from_matrix(&matrix).contagion_clusters();

    if format == "json" {
        let output = ClearOutput {
            payments: result.payments.clone(),
            obligations: result.obligations.clone(),
            default_set: result.default_set.iter().map(|b| b.index()).collect(),
            iterations: result.iterations,
            clusters: clusters
                .iter()
                .map(|c| c.banks.iter().map(|b| b.index()).collect())
                .collect(),
        };
        let json = serde_json::to_string_pretty(&output).unwrap_or_else(|e| fail(e));
        println!("{}", json);
    } else {
        println!("=== Clearing Vector ===");
        println!("Converged in {} iterations", result.iterations);
        for (i, (paid, owed)) in result.payments.iter().zip(&result.obligations).enumerate() {
            let marker = if paid < owed { "  DEFAULT" } else { "" };
            println!("  bank {:>3}: pays {:>14.2} of {:>14.2}{}", i, paid, owed, marker);
        }
        println!("\nDefaulting banks: {}", result.default_set.len());
        if clusters.is_empty() {
            println!("No contagion clusters.");
        }
        for cluster in &clusters {
            let banks: Vec<String> = cluster.banks.iter().map(|b| b.index().to_string()).collect();
            println!(
                "Cluster [{}]: internal obligations {:.2}",
                banks.join(", "),
                cluster.internal_obligations
            );
        }
    }
}

fn main() {
    env_logger::init();
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        print_usage();
        process::exit(1);
    }

    let command = args[1].as_str();
    let rest = &args[2..];

    match command {
        "run" => cmd_run(rest),
        "clear" => cmd_clear(rest),
        "calibration" => {
            let json = serde_json::to_string_pretty(&Calibration::default())
                .unwrap_or_else(|e| fail(e));
            println!("{}", json);
        }
        "help" | "--help" | "-h" => print_usage(),
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            process::exit(1);
        }
    }
}
