//! # Hopeful Financial Model CLI
//!
//! Terminal front end over `calc_core`: run the full calculation on the local
//! document store, validate it, try out custom-module formulas, edit single
//! fields, and export/import/reset the store.
//!
//! ```text
//! calc_cli calculate
//! calc_cli set revenue.boarding.rooms 16
//! calc_cli formula "%1 * memberCount" --var 单价=120
//! calc_cli --format json export --output backup.json
//! ```

mod report;

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::Value;
use tracing_subscriber::EnvFilter;

use calc_core::storage::export::{export_document, export_file_name, import_into};
use calc_core::{validate, CalcError, CalcResult, Document, FileStorage, FormulaEngine, FormulaVariable, MainCalculator, Storage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable report
    Text,
    /// Pretty-printed JSON
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "calc_cli")]
#[command(about = "Hopeful pet-care complex financial model", long_about = None)]
#[command(version)]
struct Cli {
    /// Document store file
    #[arg(long, global = true, env = "HOPEFUL_STORE", default_value = "hopeful-finance.json")]
    store: PathBuf,

    /// Output format
    #[arg(long, global = true, value_enum, default_value = "text")]
    format: OutputFormat,

    /// User recorded in the store lock file while saving
    #[arg(long, global = true, env = "USER", default_value = "calc_cli")]
    user: String,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run every engine and print the results
    Calculate {
        /// Calculate a JSON document file instead of the store
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Also print the profitability what-if cases
        #[arg(long)]
        what_if: bool,
    },
    /// Check the stored document for invalid values
    Validate {
        /// Validate a JSON document file instead of the store
        #[arg(short, long)]
        input: Option<PathBuf>,
    },
    /// Evaluate a custom-module formula against the stored document
    Formula {
        /// Expression, e.g. "%1 * memberCount"
        expression: String,

        /// Positional variable as NAME=VALUE, bound to %1, %2, ... in order
        #[arg(long = "var", value_parser = parse_variable)]
        vars: Vec<FormulaVariable>,
    },
    /// List the system variables and functions formulas may use
    Variables,
    /// Print the value at a dotted path, e.g. cost.fixed.staffCount
    Get { path: String },
    /// Set the value at a dotted path and save
    Set {
        path: String,
        /// JSON literal; anything that is not valid JSON is stored as a string
        value: String,
    },
    /// Write the stored document as an export file
    Export {
        /// Destination (defaults to hopeful-finance-YYYY-MM-DD.json)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Validate an export file and replace the store with it
    Import { file: PathBuf },
    /// Discard the store and return to the sample data
    Reset,
}

fn parse_variable(raw: &str) -> Result<FormulaVariable, String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", raw))?;
    let value: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("'{}' is not a number", value.trim()))?;
    Ok(FormulaVariable::new(name.trim(), value))
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match cli.format {
                OutputFormat::Json => match serde_json::to_string_pretty(&e) {
                    Ok(json) => eprintln!("{}", json),
                    Err(_) => eprintln!("Error: {}", e),
                },
                OutputFormat::Text => eprintln!("Error [{}]: {}", e.error_code(), e),
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> CalcResult<()> {
    let store = FileStorage::new(&cli.store, cli.user.as_str());

    match &cli.command {
        Commands::Calculate { input, what_if } => {
            let calculator = MainCalculator::default();
            let result = match input {
                Some(path) => calculator.calculate_json(&read_json(path)?),
                None => calculator.calculate(&store.load()),
            };
            match cli.format {
                OutputFormat::Json => print_json(&result)?,
                OutputFormat::Text => {
                    report::print_calculation(&result);
                    if *what_if && !result.error {
                        let cases = calculator.profitability.sensitivity_analysis(
                            &result.revenue,
                            &result.cost,
                            &result.investment,
                        );
                        report::print_what_if(&cases);
                    }
                }
            }
        }
        Commands::Validate { input } => {
            let doc = match input {
                Some(path) => Document::from_value(read_json(path)?)?,
                None => store.load(),
            };
            let validation = validate(&doc);
            match cli.format {
                OutputFormat::Json => print_json(&validation)?,
                OutputFormat::Text => report::print_validation(&validation),
            }
        }
        Commands::Formula { expression, vars } => {
            let doc = store.load();
            let engine = FormulaEngine::from_document(&doc);
            let check = engine.validate_formula(expression, vars);
            let value = engine.evaluate(expression, vars);
            let deps = engine.dependencies(expression);
            let display = engine.format_display(expression, vars);
            match cli.format {
                OutputFormat::Json => print_json(&serde_json::json!({
                    "formula": expression,
                    "value": value,
                    "validation": check,
                    "dependencies": deps,
                    "display": display,
                }))?,
                OutputFormat::Text => report::print_formula(expression, value, &check, &deps, &display),
            }
        }
        Commands::Variables => {
            let available = FormulaEngine::from_document(&store.load()).available_variables();
            match cli.format {
                OutputFormat::Json => print_json(&available)?,
                OutputFormat::Text => report::print_variables(&available),
            }
        }
        Commands::Get { path } => {
            let value = store
                .load()
                .value_at(path)
                .ok_or_else(|| CalcError::missing_field(path.as_str()))?;
            print_json(&value)?;
        }
        Commands::Set { path, value } => {
            let parsed = serde_json::from_str::<Value>(value).unwrap_or_else(|_| Value::String(value.clone()));
            let doc = store.load().with_value(path, parsed)?;
            store.save(&doc)?;
            tracing::info!(%path, "field updated");
            let stored = doc.value_at(path).unwrap_or(Value::Null);
            println!("{} = {}", path, stored);
        }
        Commands::Export { output } => {
            let now = Utc::now();
            let path = output.clone().unwrap_or_else(|| PathBuf::from(export_file_name(now)));
            let json = export_document(&store.load(), now)?;
            fs::write(&path, json)
                .map_err(|e| CalcError::file_error("write export", path.display().to_string(), e.to_string()))?;
            println!("Exported to {}", path.display());
        }
        Commands::Import { file } => {
            let json = fs::read_to_string(file)
                .map_err(|e| CalcError::file_error("read import", file.display().to_string(), e.to_string()))?;
            let doc = import_into(&store, &json)?;
            println!("Imported '{}' into {}", doc.basic.project_name, cli.store.display());
        }
        Commands::Reset => {
            let doc = store.clear()?;
            println!("Store reset to sample data ('{}')", doc.basic.project_name);
        }
    }
    Ok(())
}

fn read_json(path: &Path) -> CalcResult<Value> {
    let contents = fs::read_to_string(path)
        .map_err(|e| CalcError::file_error("read", path.display().to_string(), e.to_string()))?;
    Ok(serde_json::from_str(&contents)?)
}

fn print_json<T: serde::Serialize>(value: &T) -> CalcResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_variable() {
        let var = parse_variable("单价 = 120.5").unwrap();
        assert_eq!(var.name, "单价");
        assert_eq!(var.value, 120.5);
        assert!(parse_variable("novalue").is_err());
        assert!(parse_variable("x=abc").is_err());
    }

    #[test]
    fn test_cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["calc_cli", "--format", "json", "formula", "%1*2", "--var", "a=3"]).unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        match cli.command {
            Commands::Formula { expression, vars } => {
                assert_eq!(expression, "%1*2");
                assert_eq!(vars.len(), 1);
            }
            other => panic!("unexpected command: {other:?}"),
        }

        let cli = Cli::try_parse_from(["calc_cli", "set", "revenue.boarding.rooms", "16"]).unwrap();
        assert!(matches!(cli.command, Commands::Set { .. }));
    }
}
