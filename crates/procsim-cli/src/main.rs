//! Command-line interface for ProcSim model libraries.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use procsim_core::config::{defaults, env_vars};
use procsim_core::prelude::*;
use serde::Serialize;

/// ProcSim - inspect unit and solver model libraries.
#[derive(Parser, Debug)]
#[command(name = "procsim")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Configuration file listing model directories.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Extra model directory, scanned after the configured ones.
    #[arg(short = 'd', long = "models-dir", global = true)]
    models_dirs: Vec<PathBuf>,

    /// Verbose output.
    #[arg(short, long, global = true)]
    verbose: bool,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// List units and solvers found in the model directories.
    Models {
        /// Print descriptors as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Instantiate a unit and show its parameters.
    Inspect {
        /// Unique key of the unit.
        key: String,
        /// Print parameters as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Save a unit's default parameters to a store (`.json` or `.redb`).
    Export {
        /// Unique key of the unit.
        key: String,
        /// Output file.
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Show the effective model directory configuration.
    Config {
        /// Also write it to this file.
        #[arg(long)]
        write: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = load_config(args.config.as_deref(), &args.models_dirs)?;
    match args.command {
        Command::Models { json } => list_models(&config, json),
        Command::Inspect { key, json } => inspect_unit(&config, &key, json),
        Command::Export { key, output } => export_unit(&config, &key, &output),
        Command::Config { write } => show_config(&config, write.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    // Check if JSON logging is requested (for production/container environments)
    let json_logging = std::env::var(env_vars::LOG_JSON)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(false);

    // Build the env filter for log level control
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let default = if verbose { "procsim=debug" } else { defaults::LOG_FILTER };
        tracing_subscriber::EnvFilter::new(default)
    });

    // Logs go to stderr so command output stays machine readable.
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact()
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Resolve the configuration: `--config`, then `PROCSIM_CONFIG`, then `procsim.toml` in the
/// working directory. Extra directories from the command line and `PROCSIM_MODELS_PATH`
/// are appended.
fn load_config(explicit: Option<&Path>, extra_dirs: &[PathBuf]) -> Result<ModelsConfig> {
    let path = explicit
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os(env_vars::CONFIG_FILE).map(PathBuf::from));

    let mut config = match path {
        Some(path) => ModelsConfig::load(&path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None if Path::new(defaults::CONFIG_FILE_NAME).is_file() => {
            ModelsConfig::load(defaults::CONFIG_FILE_NAME)
                .with_context(|| format!("Failed to load {}", defaults::CONFIG_FILE_NAME))?
        }
        None => ModelsConfig::default(),
    };
    for dir in extra_dirs {
        config.push_dir(dir);
    }
    Ok(config.with_env())
}

fn list_models(config: &ModelsConfig, json: bool) -> Result<()> {
    let manager = ModelsManager::from_config(config);

    if json {
        #[derive(Serialize)]
        struct Listing<'a> {
            units: &'a [UnitDescriptor],
            solvers: &'a [SolverDescriptor],
        }
        let listing = Listing {
            units: manager.available_units(),
            solvers: manager.available_solvers(),
        };
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if manager.available_units().is_empty() && manager.available_solvers().is_empty() {
        println!("No models found in {} directories", manager.dirs_number());
        return Ok(());
    }

    if !manager.available_units().is_empty() {
        println!("Units:");
        for unit in manager.available_units() {
            let info = &unit.info;
            println!(
                "  {:<24} {:<28} v{:<4} {}{}",
                info.unique_id,
                info.name,
                info.version,
                info.file_location.display(),
                if unit.is_dynamic { " (dynamic)" } else { "" }
            );
        }
    }
    if !manager.available_solvers().is_empty() {
        println!("Solvers:");
        for solver in manager.available_solvers() {
            let info = &solver.info;
            println!(
                "  {:<24} {:<28} v{:<4} {} [{}]",
                info.unique_id,
                info.name,
                info.version,
                info.file_location.display(),
                solver.solver_type
            );
        }
    }
    Ok(())
}

#[derive(Serialize)]
struct ParameterRow {
    name: String,
    kind: String,
    units: String,
    value: String,
    active: bool,
}

fn format_value(parameter: &Parameter) -> String {
    match parameter.value() {
        ParameterValue::Constant(p) => format!("{} [{}, {}]", p.value(), p.min(), p.max()),
        ParameterValue::TimeDependent(p) => {
            let points: Vec<String> = p
                .data()
                .iter()
                .map(|(t, v)| format!("{t}: {v}"))
                .collect();
            format!("{{{}}}", points.join(", "))
        }
        ParameterValue::String(p) => format!("{:?}", p.value()),
        ParameterValue::Checkbox(p) => p.is_checked().to_string(),
        ParameterValue::Solver(p) => format!("{} ({})", p.key(), p.solver_type()),
        ParameterValue::Combo(p) | ParameterValue::Group(p) => {
            match p.item_map().get(&p.value()) {
                Some(name) => format!("{name} ({})", p.value()),
                None => "<undefined>".to_string(),
            }
        }
        ParameterValue::Compound(p) => p.key().to_string(),
    }
}

fn parameter_rows(parameters: &UnitParametersManager) -> Vec<ParameterRow> {
    parameters
        .iter()
        .map(|p| ParameterRow {
            name: p.name().to_string(),
            kind: p.kind().to_string(),
            units: p.units().to_string(),
            value: format_value(p),
            active: parameters.is_parameter_active(p),
        })
        .collect()
}

fn inspect_unit(config: &ModelsConfig, key: &str, json: bool) -> Result<()> {
    let mut manager = ModelsManager::from_config(config);
    let handle = manager
        .instantiate_unit(key)
        .with_context(|| format!("Unit '{key}' is not available"))?;
    let unit = manager
        .unit(handle)
        .with_context(|| format!("Unit '{key}' was released"))?;

    let rows = parameter_rows(unit.parameters());
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
    } else {
        println!("{} ({}) by {}, v{}", unit.name(), unit.unique_id(), unit.author(), unit.version());
        for row in rows {
            println!(
                "  {}{:<24} {:<15} {:<10} {}",
                if row.active { ' ' } else { '-' },
                row.name,
                row.kind,
                row.units,
                row.value
            );
        }
    }

    manager.free_unit(handle);
    Ok(())
}

fn export_unit(config: &ModelsConfig, key: &str, output: &Path) -> Result<()> {
    let mut manager = ModelsManager::from_config(config);
    let handle = manager
        .instantiate_unit(key)
        .with_context(|| format!("Unit '{key}' is not available"))?;
    let parameters = manager
        .unit(handle)
        .map(|unit| unit.parameters().clone())
        .with_context(|| format!("Unit '{key}' was released"))?;
    manager.free_unit(handle);

    let is_redb = output.extension().is_some_and(|e| e == "redb");
    if is_redb {
        let mut store = RedbStore::open(output)?;
        parameters.save_to_store(&mut store, key)?;
    } else {
        let mut store = MemoryStore::new();
        parameters.save_to_store(&mut store, key)?;
        store.save_json(output)?;
    }
    tracing::info!(key, output = %output.display(), "Exported unit parameters");
    println!("Saved {} parameters of '{}' to {}", parameters.len(), key, output.display());
    Ok(())
}

fn show_config(config: &ModelsConfig, write: Option<&Path>) -> Result<()> {
    let text = config.to_toml_string()?;
    if let Some(path) = write {
        config
            .save(path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    if config.dirs.is_empty() {
        println!("# no model directories configured");
    }
    print!("{text}");
    Ok(())
}
