use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use settlement_economy::export::{export_to_file, generate_summary};
use settlement_economy::scenario::demo_settlement;
use settlement_economy::{EconomyParams, Result};

#[derive(Parser, Debug)]
#[command(name = "settlement_economy")]
#[command(about = "Run a seeded village economy and report what it produced")]
struct Args {
    /// Random seed (uses random seed if not specified)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Simulated time to run for
    #[arg(short, long, default_value = "200000")]
    duration: u64,

    /// Economy parameters as JSON (defaults are used if not specified)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Export the final settlement state to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,

    /// Log filter (e.g. "info" or "settlement_economy=debug")
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn run(args: Args) -> Result<()> {
    let seed = args.seed.unwrap_or_else(rand::random);
    let params = match &args.config {
        Some(path) => EconomyParams::from_json_file(path)?,
        None => EconomyParams::default(),
    };

    println!("Building village with seed: {}", seed);
    let mut demo = demo_settlement(seed, params)?;
    println!(
        "{} workers, running until t={}",
        demo.workers.len(),
        args.duration
    );

    demo.settlement.run_until(args.duration)?;
    info!(time = demo.settlement.now(), "run finished");

    println!();
    print!("{}", generate_summary(&demo.settlement, seed));

    if let Some(path) = &args.export {
        export_to_file(&demo.settlement, seed, path)?;
        println!("Exported settlement to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    let filter = EnvFilter::try_new(&args.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            eprintln!("error: {}", err);
            ExitCode::FAILURE
        }
    }
}
