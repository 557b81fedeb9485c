//! Battle odds CLI.
//!
//! Simulates a scenario many times and prints the aggregate results as one
//! JSON object on stdout.
//!
//! Usage:
//!   cargo run --release --bin odds -- --scenario FILE [OPTIONS]
//!
//! Options:
//!   --scenario FILE  JSON battle scenario (required)
//!   --runs N         Number of simulated battles (default: 1000)
//!   --seed N         Base dice seed, 0 for entropy (default: 0)
//!   --threads N      Number of parallel threads (default: 4)
//!   --rules FILE     JSON rule flags (default: classic rules)
//!   --quiet          Suppress the summary on stderr

use std::env;
use std::fs;
use std::process;
use std::str::FromStr;
use std::time::Instant;

use tracing_subscriber::EnvFilter;

use skirmish::calc::{OddsCalculator, OddsConfig};
use skirmish::protocol::Scenario;
use skirmish::rules::RuleSet;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = env::args().collect();
    let mut config = OddsConfig::default();
    let mut scenario_path: Option<String> = None;
    let mut rules_path: Option<String> = None;
    let mut quiet = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--scenario" => {
                i += 1;
                scenario_path = Some(value(&args, i, "--scenario"));
            }
            "--rules" => {
                i += 1;
                rules_path = Some(value(&args, i, "--rules"));
            }
            "--runs" => {
                i += 1;
                config.runs = number(&args, i, "--runs");
            }
            "--seed" => {
                i += 1;
                config.seed = number(&args, i, "--seed");
            }
            "--threads" => {
                i += 1;
                config.threads = number(&args, i, "--threads");
            }
            "--quiet" => {
                quiet = true;
            }
            "--help" | "-h" => {
                print_usage();
                return;
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                print_usage();
                process::exit(1);
            }
        }
        i += 1;
    }

    let Some(scenario_path) = scenario_path else {
        eprintln!("Missing --scenario");
        print_usage();
        process::exit(1);
    };

    let rules = match rules_path {
        Some(path) => RuleSet::from_json(&read(&path)).unwrap_or_else(|e| fail(&path, e)),
        None => RuleSet::default(),
    };
    let scenario = Scenario::from_json(&read(&scenario_path)).unwrap_or_else(|e| fail(&scenario_path, e));
    let template = scenario.build().unwrap_or_else(|e| fail(&scenario_path, e));

    if !quiet {
        eprintln!(
            "Odds: {} runs of {} vs {} at {}, {} threads",
            config.runs, scenario.attacker, scenario.defender, scenario.site, config.threads
        );
    }

    let start = Instant::now();
    let results = OddsCalculator::new(&rules, &scenario.map, &template, config)
        .calculate()
        .unwrap_or_else(|e| fail(&scenario_path, e));
    let elapsed = start.elapsed();

    if !quiet {
        eprintln!(
            "Completed {} runs in {:.2}s ({:.0} battles/s)",
            results.runs,
            elapsed.as_secs_f64(),
            results.runs as f64 / elapsed.as_secs_f64().max(f64::EPSILON)
        );
    }

    match serde_json::to_string(&results.summary()) {
        Ok(json) => println!("{}", json),
        Err(e) => fail("summary", e),
    }
}

fn value(args: &[String], i: usize, flag: &str) -> String {
    match args.get(i) {
        Some(v) => v.clone(),
        None => {
            eprintln!("Missing value for {}", flag);
            process::exit(1);
        }
    }
}

fn number<T: FromStr>(args: &[String], i: usize, flag: &str) -> T {
    let raw = value(args, i, flag);
    match raw.parse() {
        Ok(v) => v,
        Err(_) => {
            eprintln!("Invalid {} value: {}", flag, raw);
            process::exit(1);
        }
    }
}

fn read(path: &str) -> String {
    fs::read_to_string(path).unwrap_or_else(|e| fail(path, e))
}

fn fail<T>(what: &str, err: impl std::fmt::Display) -> T {
    eprintln!("{}: {}", what, err);
    process::exit(1);
}

fn print_usage() {
    eprintln!("Usage: odds --scenario FILE [OPTIONS]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --scenario FILE  JSON battle scenario (required)");
    eprintln!("  --runs N         Number of simulated battles (default: 1000)");
    eprintln!("  --seed N         Base dice seed, 0 for entropy (default: 0)");
    eprintln!("  --threads N      Number of parallel threads (default: 4)");
    eprintln!("  --rules FILE     JSON rule flags (default: classic rules)");
    eprintln!("  --quiet          Suppress the summary on stderr");
}
