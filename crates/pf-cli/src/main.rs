//! `pf` - headless driver for partforge models
//!
//! ```text
//! pf test <model-file> [--json]
//! pf export-stl <model-file> <output>
//! pf export-3mf <model-file> <output>
//! pf watch <model-file> [--interval-ms N]
//! pf models
//! ```
//!
//! Exit codes: 0 on success, 1 for parameter, model, validation and usage
//! errors, 2 when writing the export fails.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pf_core::driver::{self, Command, DriverError};
use pf_core::models::registry;
use pf_core::{ReloadEvent, Reloader};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "pf")]
#[command(about = "Build, validate and export parametric CAD models", long_about = None)]
#[command(version)]
struct Cli {
    /// CAD kernel backend (defaults to the best one compiled in)
    #[arg(long, global = true)]
    kernel: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a model and validate its solids
    Test {
        /// Model file (RON)
        model: PathBuf,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Build, validate and write a binary STL
    #[command(name = "export-stl")]
    ExportStl {
        /// Model file (RON)
        model: PathBuf,
        output: Option<PathBuf>,
    },

    /// Build, validate and write a 3MF package
    #[command(name = "export-3mf")]
    Export3mf {
        /// Model file (RON)
        model: PathBuf,
        /// `.3mf` is appended when missing
        output: Option<PathBuf>,
    },

    /// Rebuild whenever the model file changes
    Watch {
        /// Model file (RON)
        model: PathBuf,

        /// Polling interval
        #[arg(long, default_value_t = 2000)]
        interval_ms: u64,
    },

    /// List registered models and their parameters
    Models,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Driver(#[from] DriverError),
    #[error("cannot encode report: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Driver(e) => e.exit_code(),
            CliError::Json(_) => 1,
        }
    }
}

fn main() -> ExitCode {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pf_cli=info,pf_core=info,pf_cad=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(1)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    let kernel = cli.kernel.as_deref();
    match cli.command {
        Commands::Test { model, json } => {
            let outcome = driver::run(Command::Test, &model, None, kernel)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&outcome.report)?);
            } else {
                print!("{}", outcome.report);
            }
        }
        Commands::ExportStl { model, output } => {
            export(Command::ExportStl, model, output, kernel)?;
        }
        Commands::Export3mf { model, output } => {
            export(Command::Export3mf, model, output, kernel)?;
        }
        Commands::Watch { model, interval_ms } => watch(model, interval_ms, kernel),
        Commands::Models => list_models(),
    }
    Ok(())
}

fn export(
    command: Command,
    model: PathBuf,
    output: Option<PathBuf>,
    kernel: Option<&str>,
) -> Result<(), DriverError> {
    let outcome = driver::run(command, &model, output.as_deref(), kernel)?;
    print!("{}", outcome.report);
    if let Some(path) = outcome.output {
        println!("wrote {}", path.display());
    }
    Ok(())
}

fn watch(model: PathBuf, interval_ms: u64, kernel: Option<&str>) {
    info!(path = %model.display(), interval_ms, "watching");
    let mut reloader = Reloader::new(model, kernel);
    loop {
        match reloader.poll() {
            ReloadEvent::Unchanged => {}
            ReloadEvent::Rebuilt(report) => print!("{}", report),
            ReloadEvent::Failed(e) => error!(error = %e, "rebuild failed, waiting for changes"),
            ReloadEvent::FileGone => return,
        }
        std::thread::sleep(Duration::from_millis(interval_ms));
    }
}

fn list_models() {
    for model in registry() {
        println!("{} - {}", model.name(), model.description());
        for decl in model.parameters() {
            println!(
                "  {:<36} {:<6} {:>12}  {}",
                decl.key,
                decl.default.kind().to_string(),
                decl.default.value().to_string(),
                decl.description
            );
        }
    }
    println!("kernels: {}", pf_cad::available_kernels().join(", "));
}
