use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use motor_telemetry::processing::sequence::PhaseSequence;
use motor_telemetry::processing::speed::SpeedSource;
use motor_telemetry::{
    load_config, save_config, Config, MotorPipeline, PipelineSnapshot, SimulatedMotor,
    SimulationConfig,
};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "motor-telemetry",
    version,
    about = "Three-phase motor telemetry: frequency, sequence, dq0 and speed estimation"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline against the simulated motor
    Run(RunArgs),
    /// Write the default configuration as YAML
    WriteConfig {
        /// Destination file
        path: PathBuf,
    },
}

#[derive(Args)]
struct RunArgs {
    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of processing passes to run
    #[arg(long, default_value_t = 10)]
    passes: u64,

    /// Electrical frequency of the simulated motor in Hz
    #[arg(long, default_value_t = 40.0)]
    frequency: f64,

    /// Spin the simulated motor with negative phase sequence
    #[arg(long)]
    reverse: bool,

    /// Seed for simulator noise
    #[arg(long, default_value_t = 7)]
    seed: u64,

    /// Write the final snapshot as CSV
    #[arg(long)]
    export: Option<PathBuf>,
}

fn main() {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let result = match cli.command {
        Command::Run(args) => run(args),
        Command::WriteConfig { path } => save_config(&Config::default(), &path).map(|_| {
            println!("Default configuration written to {}", path.display());
        }),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

fn run(args: RunArgs) -> motor_telemetry::Result<()> {
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    let verbose = config.processor.verbose;

    let motor = SimulatedMotor::new(SimulationConfig {
        frequency: args.frequency,
        reverse: args.reverse,
        seed: args.seed,
        ..SimulationConfig::default()
    });
    let mut pipeline = MotorPipeline::simulated(config, &motor)?;

    for _ in 0..args.passes {
        pipeline.run_passes(1)?;
        if verbose {
            print_status(&pipeline.snapshot());
        }
    }

    let snapshot = pipeline.snapshot();
    if !verbose {
        print_status(&snapshot);
    }

    if let Some(path) = &args.export {
        pipeline.export(path)?;
        println!("Snapshot written to {}", path.display());
    }
    Ok(())
}

fn print_status(snapshot: &PipelineSnapshot) {
    let sequence = match snapshot.sequence {
        PhaseSequence::Positive => "+".green(),
        PhaseSequence::Negative => "-".yellow(),
    };
    let source = match snapshot.speed_source {
        SpeedSource::Spectral => "spectral".cyan(),
        SpeedSource::Hall => "hall".magenta(),
    };
    let frequency = if snapshot.frequency == 0.0 {
        "stationary".white().dimmed()
    } else {
        format!("{:7.2} Hz", snapshot.frequency).bold()
    };

    println!(
        "pass {:>4} | {} | seq {} | speed {:>6.0} rpm ({}) | ref {:>6.0} rpm",
        snapshot.pass, frequency, sequence, snapshot.speed_rpm, source, snapshot.reference_rpm
    );
}
