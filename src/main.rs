use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use resilient_dispatch::error::ErrorClass;
use resilient_dispatch::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dispatch")]
#[command(about = "Dispatch named operations with retry, circuit breaking and fallbacks")]
#[command(version = "1.0.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML); defaults to the per-user config file
    #[arg(long, global = true, env = "DISPATCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value = "pretty")]
    log_format: LogFormat,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Pretty,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List available operations and aliases
    List {
        /// Group operations by provider
        #[arg(long)]
        by_provider: bool,
    },

    /// Show what an operation does
    Describe {
        /// Operation name or alias
        operation: String,
    },

    /// Run a single operation
    Run {
        /// Operation name or alias
        operation: String,

        /// Positional arguments (numbers, YYYY-MM-DD dates or text)
        #[arg(allow_negative_numbers = true)]
        args: Vec<String>,

        /// Force failures first, e.g. transient:2 or permanent:1
        #[arg(long)]
        inject: Option<String>,

        /// Call once without retry, circuit breaker or fallback
        #[arg(long)]
        raw: bool,
    },

    /// Run a JSON batch file ({"label": {"operation": ..., "args": [...]}})
    Batch {
        /// Path to the batch file
        file: PathBuf,
    },

    /// Show circuit breaker state per provider
    Circuits,
}

#[derive(Serialize)]
struct RunOutput<'a> {
    operation: &'a str,
    value: Value,
    source: ValueSource,
}

fn init_tracing(debug: bool, format: LogFormat) {
    let default_level = if debug {
        "resilient_dispatch=debug"
    } else {
        "resilient_dispatch=info"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A second initialisation (e.g. from tests) is harmless
    let _ = match format {
        LogFormat::Pretty => builder.with_target(false).try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

fn parse_injection(raw: &str) -> Result<(ErrorClass, u32)> {
    let (kind, count) = raw
        .split_once(':')
        .with_context(|| format!("Invalid --inject '{}', expected <kind>:<count>", raw))?;

    let kind = match kind.trim().to_lowercase().as_str() {
        "transient" => ErrorClass::Transient,
        "permanent" => ErrorClass::Permanent,
        other => bail!("Unknown failure kind '{}' (transient or permanent)", other),
    };
    let count = count
        .trim()
        .parse::<u32>()
        .with_context(|| format!("Invalid injection count '{}'", count))?;

    Ok((kind, count))
}

fn build_dispatcher(config_path: Option<&PathBuf>) -> Result<ResilientDispatcher> {
    let config = DispatchConfig::load(config_path.map(PathBuf::as_path))?;

    let mut registry = OperationRegistry::new();
    providers::register_builtin(&mut registry)?;

    Ok(ResilientDispatcher::new(registry, &config)?)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug, cli.log_format);

    let dispatcher = build_dispatcher(cli.config.as_ref())?;

    match &cli.command {
        Commands::List { by_provider } => {
            if *by_provider {
                for (provider, operations) in dispatcher.list_by_provider() {
                    println!("{}:", provider);
                    for operation in operations {
                        println!("  {}", operation);
                    }
                }
            } else {
                for operation in dispatcher.list_operations() {
                    println!("{}", operation);
                }
            }

            let aliases = dispatcher.list_aliases();
            if !aliases.is_empty() {
                println!("\nAliases:");
                for (alias, canonical) in aliases {
                    println!("  {} -> {}", alias, canonical);
                }
            }
        }
        Commands::Describe { operation } => {
            println!("{}", dispatcher.describe(operation)?);
        }
        Commands::Run {
            operation,
            args,
            inject,
            raw,
        } => {
            if let Some(injection) = inject {
                let (kind, count) = parse_injection(injection)?;
                dispatcher.inject_failure(operation, kind, count)?;
            }

            let args: Vec<Value> = args.iter().map(|a| Value::parse_cli(a)).collect();

            if *raw {
                let value = dispatcher.dispatch_raw(operation, &args)?;
                print_json(&RunOutput {
                    operation,
                    value,
                    source: ValueSource::Primary,
                })?;
            } else {
                let dispatched = dispatcher.dispatch(operation, &args)?;
                print_json(&RunOutput {
                    operation,
                    value: dispatched.value,
                    source: dispatched.source,
                })?;
            }
        }
        Commands::Batch { file } => {
            let content = std::fs::read_to_string(file)
                .with_context(|| format!("Failed to read batch file {}", file.display()))?;
            let calls: BTreeMap<String, BatchCall> = serde_json::from_str(&content)
                .with_context(|| format!("Invalid batch file {}", file.display()))?;

            let report = dispatcher.execute_batch(&calls);
            print_json(&report)?;
        }
        Commands::Circuits => {
            // Include providers that were never called
            let states: BTreeMap<String, _> = dispatcher
                .list_by_provider()
                .into_keys()
                .map(|provider| {
                    let state = dispatcher.circuit_state(&provider);
                    (provider, state)
                })
                .collect();
            print_json(&states)?;
        }
    }

    Ok(())
}
