//! Console front end for the counter registry.
//!
//! # Responsibility
//! - Create counters from the command line (`make`).
//! - Inspect and step existing counters for operational use.

use clap::{Parser, Subcommand};
use counters_core::db::open_db;
use counters_core::{
    default_log_level, init_logging, Counter, CounterError, Counters, CountersConfig, NewCounter,
    SqliteCounterRepository,
};
use log::error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "counters")]
#[command(about = "Create and inspect named persistent counters")]
#[command(version)]
struct Cli {
    /// SQLite database file
    #[arg(long, default_value = "counters.sqlite3")]
    db: PathBuf,

    /// JSON config file (defaults plus COUNTER_* overrides when omitted)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Absolute directory for rolling log files
    #[arg(long)]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new counter
    Make {
        /// Unique key for the counter
        key: String,

        /// Display name for the counter
        name: String,

        /// Initial value (configured default when omitted)
        #[arg(long, allow_hyphen_values = true)]
        initial_value: Option<i64>,

        /// Step for increment/decrement (configured default when omitted)
        #[arg(long, allow_hyphen_values = true)]
        step: Option<i64>,

        /// Optional notes
        #[arg(long)]
        notes: Option<String>,
    },

    /// Show one counter
    Get { key: String },

    /// Add a step to a counter
    Increment {
        key: String,

        #[arg(long, allow_hyphen_values = true)]
        step: Option<i64>,
    },

    /// Subtract a step from a counter
    Decrement {
        key: String,

        #[arg(long, allow_hyphen_values = true)]
        step: Option<i64>,
    },

    /// Restore a counter to its initial value
    Reset { key: String },

    /// Delete a counter and all of its attachments
    Delete { key: String },

    /// List counters
    List {
        /// Case-insensitive substring of key or name
        #[arg(long)]
        search: Option<String>,

        #[arg(long, default_value = "50")]
        limit: u32,
    },

    /// Show registry-wide aggregates
    Stats,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Some(log_dir) = cli.log_dir.as_deref() {
        if let Err(err) = init_logging(default_log_level(), log_dir) {
            eprintln!("warning: logging disabled: {err}");
        }
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("event=cli_command module=cli status=error error={message}");
            eprintln!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let config = match cli.config.as_ref() {
        Some(path) => CountersConfig::load(path),
        None => CountersConfig::from_env(),
    }
    .map_err(|err| err.to_string())?;

    let conn = open_db(&cli.db).map_err(|err| format!("failed to open database: {err}"))?;
    let counters = Counters::with_config(SqliteCounterRepository::new(&conn), config);

    match cli.command {
        Commands::Make {
            key,
            name,
            initial_value,
            step,
            notes,
        } => {
            let defaults = &counters.config().defaults;
            let mut definition = NewCounter::new(key.as_str(), name)
                .initial_value(initial_value.unwrap_or(defaults.initial_value))
                .step(step.unwrap_or(defaults.step));
            if let Some(notes) = notes {
                definition = definition.notes(notes);
            }

            println!("Creating counter...");
            let counter = counters.create(definition).map_err(|err| match err {
                CounterError::AlreadyExists(_) => format!("counter '{key}' already exists"),
                other => format!("failed to create counter: {other}"),
            })?;
            println!("Counter '{key}' created successfully.");
            print_counter(&counter);
        }
        Commands::Get { key } => {
            print_counter(&counters.get(&key).map_err(|err| err.to_string())?);
        }
        Commands::Increment { key, step } => {
            counters.increment(&key, step).map_err(|err| err.to_string())?;
            print_value(&counters, &key)?;
        }
        Commands::Decrement { key, step } => {
            counters.decrement(&key, step).map_err(|err| err.to_string())?;
            print_value(&counters, &key)?;
        }
        Commands::Reset { key } => {
            counters.reset(&key).map_err(|err| err.to_string())?;
            print_value(&counters, &key)?;
        }
        Commands::Delete { key } => {
            counters.delete(&key).map_err(|err| err.to_string())?;
            println!("Counter '{key}' deleted.");
        }
        Commands::List { search, limit } => {
            let listed = counters
                .get_all(search.as_deref(), limit)
                .map_err(|err| err.to_string())?;
            println!("{:<32} {:<32} {:>12} {:>8}", "KEY", "NAME", "VALUE", "STEP");
            for counter in listed {
                println!(
                    "{:<32} {:<32} {:>12} {:>8}",
                    counter.key,
                    counter.display_name(),
                    counter.value,
                    counter.step
                );
            }
        }
        Commands::Stats => {
            let stats = counters.get_stats().map_err(|err| err.to_string())?;
            let or_na = |value: Option<String>| value.unwrap_or_else(|| "N/A".to_string());
            print_table(&[
                ("Total Counters", stats.total_counters.to_string()),
                ("Total Value", stats.total_value.to_string()),
                (
                    "Average Value",
                    or_na(stats.average_value.map(|value| format!("{value:.2}"))),
                ),
                ("Max Value", or_na(stats.max_value.map(|v| v.to_string()))),
                ("Min Value", or_na(stats.min_value.map(|v| v.to_string()))),
            ]);
        }
    }

    Ok(())
}

fn print_value(counters: &Counters<SqliteCounterRepository<'_>>, key: &str) -> Result<(), String> {
    let value = counters
        .get_value(key, None)
        .map_err(|err| err.to_string())?;
    println!("{key} = {value}");
    Ok(())
}

fn print_counter(counter: &Counter) {
    print_table(&[
        ("Key", counter.key.clone()),
        ("Name", counter.name.clone()),
        ("Initial Value", counter.initial_value.to_string()),
        ("Current Value", counter.value.to_string()),
        ("Step", counter.step.to_string()),
        (
            "Notes",
            counter.notes.clone().unwrap_or_else(|| "N/A".to_string()),
        ),
        ("Created At (ms)", counter.created_at.to_string()),
    ]);
}

fn print_table(rows: &[(&str, String)]) {
    let width = rows.iter().map(|(label, _)| label.len()).max().unwrap_or(0);
    println!("{:<width$}  Value", "Property");
    for (label, value) in rows {
        println!("{label:<width$}  {value}");
    }
}
