//! Sable CLI

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, EnvFilter};

use sable::config::{QueueKind, RunConfig};
use sable::error::{report_error, SableError};
use sable::{Engine, Program};

#[derive(Parser)]
#[command(name = "sable", version, about = "Sable - contract-typed scripting runtime")]
struct Cli {
    /// Config file (defaults to ./sable.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Compile and run a JSON-serialized program
    Run {
        /// Program file
        file: PathBuf,
        /// Run outside checked mode
        #[arg(long)]
        unchecked: bool,
        /// Queue for fork bodies without `via`
        #[arg(long, value_enum)]
        queue: Option<QueueKind>,
        /// Trace every routine call and return
        #[arg(long)]
        trace_calls: bool,
        /// Source text the spans refer to, for diagnostics
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Compile a program without running it
    Check {
        /// Program file
        file: PathBuf,
        /// Source text the spans refer to, for diagnostics
        #[arg(long)]
        source: Option<PathBuf>,
    },
    /// Pretty-print a deserialized program (debug)
    Dump {
        /// Program file
        file: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();

    let config = match RunConfig::discover(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    init_logging(&config);

    let (result, source) = match cli.command {
        Command::Run {
            file,
            unchecked,
            queue,
            trace_calls,
            source,
        } => {
            let mut config = config;
            if unchecked {
                config.checked = false;
            }
            if let Some(queue) = queue {
                config.queue = queue;
            }
            config.monitor_calls |= trace_calls;
            (run_file(&file, config), source)
        }
        Command::Check { file, source } => (check_file(&file, config), source),
        Command::Dump { file } => (dump_file(&file), None),
    };

    if let Err(e) = result {
        report(&e, source.as_deref());
        std::process::exit(1);
    }
}

/// `RUST_LOG` wins over the config's filter
fn init_logging(config: &RunConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(config.log_filter()));

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path) -> Result<Program, SableError> {
    let text = std::fs::read_to_string(path)?;
    Program::from_json(&text)
        .map_err(|e| SableError::Load(format!("{}: {e}", path.display())))
}

fn run_file(path: &Path, config: RunConfig) -> Result<(), SableError> {
    let program = load(path)?;
    let engine = Engine::new(config);
    let value = engine.run(&program)?;
    println!("{value}");
    Ok(())
}

fn check_file(path: &Path, config: RunConfig) -> Result<(), SableError> {
    let program = load(path)?;
    let fragment = Engine::new(config).compile(&program)?;
    println!(
        "✓ {} compiles ({} slots, result {})",
        path.display(),
        fragment.slot_count(),
        fragment.contract()
    );
    Ok(())
}

fn dump_file(path: &Path) -> Result<(), SableError> {
    let program = load(path)?;
    let text = serde_json::to_string_pretty(&program).map_err(|e| SableError::Load(e.to_string()))?;
    println!("{text}");
    Ok(())
}

fn report(error: &SableError, source: Option<&Path>) {
    if let (SableError::Compile(compile), Some(path)) = (error, source) {
        if let Ok(text) = std::fs::read_to_string(path) {
            report_error(&path.display().to_string(), &text, compile);
            return;
        }
    }
    eprintln!("Error: {error}");
}
