//! hessfit Command-Line Interface
//!
//! # Usage
//!
//! 1. **Fit** (`hessfit <checkpoint.fchk> <topology.json> [options]`):
//!    fits the parameters selected in the settings file and prints a summary
//!
//!    - `-c <file>`: settings file (default: `./hessfit.cfg` if present)
//!    - `-o <file>`: write the fitted topology as JSON
//!    - `-r <file>`: write a JSON fit report
//!
//! 2. **Settings template** (`hessfit template [file]`):
//!    writes a commented settings file (default: `hessfit.cfg`)
//!
//! # Examples
//!
//! ```bash
//! hessfit template
//! hessfit water.fchk water.json -o water_fitted.json -r water_report.json
//! ```
//!
//! Set `level = debug` in the `[logging]` section to print every cost evaluation.

use hessfit::engine::{ClassicalEngine, ForceFieldEngine};
use hessfit::fit::{FitOutcome, FitSession};
use hessfit::optimizer::ArgminMinimizer;
use hessfit::report::FitReport;
use hessfit::settings::{SettingsManager, LOCAL_SETTINGS_FILE};
use hessfit::{CheckpointRecord, FitOptions, Topology};
use log::{info, LevelFilter};
use std::env;
use std::path::PathBuf;
use std::process;

/// Parsed arguments of the fit command.
#[derive(Debug, Default)]
struct FitArgs {
    checkpoint: PathBuf,
    topology: PathBuf,
    settings: Option<PathBuf>,
    fitted_topology: Option<PathBuf>,
    report: Option<PathBuf>,
}

fn parse_fit_args(args: &[String]) -> Result<FitArgs, String> {
    let mut positional = Vec::new();
    let mut parsed = FitArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        let target = match arg.as_str() {
            "-c" | "--config" => &mut parsed.settings,
            "-o" | "--output" => &mut parsed.fitted_topology,
            "-r" | "--report" => &mut parsed.report,
            flag if flag.starts_with('-') => return Err(format!("Unknown option: {}", flag)),
            _ => {
                positional.push(PathBuf::from(arg));
                continue;
            }
        };
        let value = iter.next().ok_or_else(|| format!("Missing value for {}", arg))?;
        *target = Some(PathBuf::from(value));
    }

    match positional.len() {
        2 => {
            parsed.topology = positional.pop().unwrap_or_default();
            parsed.checkpoint = positional.pop().unwrap_or_default();
            Ok(parsed)
        }
        n => Err(format!("Expected a checkpoint file and a topology file, got {} paths", n)),
    }
}

fn print_usage(program: &str) {
    println!("hessfit - fit force-field parameters to a QM Hessian");
    println!();
    println!("Usage:");
    println!("  {} <checkpoint.fchk> <topology.json> [-c settings.cfg] [-o fitted.json] [-r report.json]", program);
    println!("  {} template [{}]", program, LOCAL_SETTINGS_FILE);
    println!();
    println!("Set level = debug under [logging] in the settings file to print every cost evaluation.");
}

fn print_summary(outcome: &FitOutcome, options: &FitOptions) {
    println!();
    println!(" Fit summary  (target = {}, method = {}, k_gradient = {})", options.target, options.method, options.k_gradient);
    println!("----------------------------------------------------------------------------");
    println!("  #   Parameter         Type        Initial            Fitted");
    for slot in &outcome.slots {
        println!(
            "  {:<3} {:<17} {:<6} {:>16.6} {:>16.6}",
            slot.position,
            slot.kind,
            slot.type_index,
            outcome.x0[slot.position],
            outcome.result.x[slot.position]
        );
    }
    println!("----------------------------------------------------------------------------");
    println!("  Discrepancy      {:>16.8e} -> {:>16.8e}", outcome.initial.discrepancy, outcome.fitted.discrepancy);
    println!("  Gradient RMSD    {:>16.8e} -> {:>16.8e}", outcome.initial.gradient_rmsd, outcome.fitted.gradient_rmsd);
    println!("  Total cost       {:>16.8e} -> {:>16.8e}", outcome.initial.total, outcome.fitted.total);
    println!(
        "  Converged: {}   iterations: {}   evaluations: {}",
        if outcome.result.converged { "YES" } else { "NO " },
        outcome.result.iterations,
        outcome.evaluations
    );
    println!("  Termination: {}", outcome.result.termination);
}

fn run_fit(args: &FitArgs, settings: &SettingsManager) -> Result<(), Box<dyn std::error::Error>> {
    let options = settings.fit_options().clone();
    info!("Settings: {}", settings.config_source());

    let record = CheckpointRecord::from_file(&args.checkpoint)?;
    let topology = Topology::load(&args.topology)?;
    let session = FitSession::new(record, &topology)?;
    let mut engine = ClassicalEngine::new(topology, session.coordinates().clone())?;
    let minimizer = ArgminMinimizer::from_options(&options);

    let outcome = session.fit(&mut engine, &options, &minimizer)?;
    print_summary(&outcome, &options);

    if let Some(path) = &args.fitted_topology {
        engine.topology().save(path)?;
        info!("Fitted topology written to {}", path.display());
    }
    if let Some(path) = &args.report {
        FitReport::new(&session, &outcome, &options).save(path)?;
        info!("Fit report written to {}", path.display());
    }
    Ok(())
}

fn init_logging(level: LevelFilter) {
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .target(env_logger::Target::Stdout)
        .format_timestamp_millis()
        .init();
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("hessfit");
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage(program);
        process::exit(if args.len() < 2 { 1 } else { 0 });
    }

    if args[1] == "template" {
        init_logging(LevelFilter::Info);
        let path = args.get(2).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(LOCAL_SETTINGS_FILE));
        match SettingsManager::create_template(&path) {
            Ok(()) => println!("✓ Settings template created: {}", path.display()),
            Err(e) => {
                eprintln!("Error creating settings template: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    let fit_args = match parse_fit_args(&args[1..]) {
        Ok(parsed) => parsed,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage(program);
            process::exit(1);
        }
    };

    // Settings are read first so the logging level can come from them.
    let settings = match SettingsManager::load(fit_args.settings.as_deref()) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Error loading settings: {}", e);
            process::exit(1);
        }
    };
    let level = match settings.logging().level_filter() {
        Ok(level) => level,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };
    init_logging(level);

    if let Err(e) = run_fit(&fit_args, &settings) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
