//! Control CLI for the director control plane (spec §6.5).
#![deny(unsafe_code)]

mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use commands::SchemaKind;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Exit code for invalid configuration.
const EXIT_INVALID_CONFIG: i32 = 2;
/// Exit code for a missing verifier allowlist.
const EXIT_VERIFIER_ALLOWLIST_MISSING: i32 = 6;
/// Exit code for any other runtime failure (file not found, parse error, ...).
const EXIT_RUNTIME_ERROR: i32 = 1;

#[derive(Parser, Debug)]
#[command(name = "director", version, about = "Director control plane CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging.
    #[arg(long)]
    debug: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load and validate `director.toml`, `moods.toml`, and `verifiers.toml`.
    Validate {
        /// Directory holding the three configuration files.
        #[arg(long, default_value = ".")]
        config_dir: PathBuf,
    },

    /// Print a summary of the resolved configuration (the `GET /health` data).
    Status {
        /// Directory holding the three configuration files.
        #[arg(long, default_value = ".")]
        config_dir: PathBuf,
    },

    /// Print a JSON schema to stdout.
    Schema {
        /// Which schema to print.
        #[arg(value_enum)]
        kind: SchemaArg,
    },

    /// Inspect a receipt file and print its recomputed content hash.
    Inspect {
        /// Path to the receipt JSON file.
        file: PathBuf,
    },
}

#[derive(Debug, Clone, ValueEnum)]
enum SchemaArg {
    Run,
    WorkItem,
    Receipt,
    Config,
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("director=debug")
    } else {
        EnvFilter::new("director=info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let code = match cli.command {
        Commands::Validate { config_dir } => cmd_validate(&config_dir),
        Commands::Status { config_dir } => cmd_status(&config_dir),
        Commands::Schema { kind } => cmd_schema(kind),
        Commands::Inspect { file } => cmd_inspect(&file),
    };

    std::process::exit(code);
}

fn cmd_validate(config_dir: &std::path::Path) -> i32 {
    match commands::check_config(config_dir) {
        Ok(result) if result.config.is_some() => {
            println!("config: ok");
            0
        }
        Ok(result) if result.verifier_allowlist_missing => {
            for d in &result.diagnostics {
                eprintln!("error: {d}");
            }
            EXIT_VERIFIER_ALLOWLIST_MISSING
        }
        Ok(result) => {
            for d in &result.diagnostics {
                eprintln!("error: {d}");
            }
            EXIT_INVALID_CONFIG
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_RUNTIME_ERROR
        }
    }
}

fn cmd_status(config_dir: &std::path::Path) -> i32 {
    match commands::check_config(config_dir) {
        Ok(result) => {
            let Some(config) = result.config else {
                for d in &result.diagnostics {
                    eprintln!("error: {d}");
                }
                return if result.verifier_allowlist_missing {
                    EXIT_VERIFIER_ALLOWLIST_MISSING
                } else {
                    EXIT_INVALID_CONFIG
                };
            };
            println!("namespace:        {}", config.director.namespace);
            println!("log_level:        {}", config.director.log_level);
            println!("event_log_dir:    {}", config.director.storage.event_log_dir);
            println!("artifact_dir:     {}", config.director.storage.artifact_dir);
            println!("receipts_dir:     {}", config.director.storage.receipts_dir);
            println!("moods configured: {}", config.moods.resolve().len());
            println!("verifiers:        {}", config.verifiers.verifier.len());
            0
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_RUNTIME_ERROR
        }
    }
}

fn cmd_schema(kind: SchemaArg) -> i32 {
    let sk = match kind {
        SchemaArg::Run => SchemaKind::Run,
        SchemaArg::WorkItem => SchemaKind::WorkItem,
        SchemaArg::Receipt => SchemaKind::Receipt,
        SchemaArg::Config => SchemaKind::Config,
    };
    match commands::schema_json(sk) {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_RUNTIME_ERROR
        }
    }
}

fn cmd_inspect(file: &std::path::Path) -> i32 {
    match commands::inspect_receipt_file(file) {
        Ok((receipt, hash)) => {
            println!("kind:       {:?}", receipt.kind);
            println!("receipt_id: {}", receipt.receipt_id);
            println!("references: {:?}", receipt.references);
            println!("sha256:     {hash}");
            0
        }
        Err(e) => {
            eprintln!("error: {e:#}");
            EXIT_RUNTIME_ERROR
        }
    }
}
