mod commands;
mod logging;

use std::io::{self, Write};
use std::process;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use colored::*;
use commands::{Cli, Commands};
use dotenv::dotenv;
use fa_trashbin_core::storage::Database;
use fa_trashbin_core::view::{ConfiguredUsers, LocalView};
use fa_trashbin_core::{AppConfig, Outcome, Reconciler, TrashEvent};
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    dotenv().ok();

    let _guard = logging::init_logger();

    let config = match fa_trashbin_core::config::load_configuration() {
        Ok(config) => config,
        Err(err) => {
            error!("Error loading configuration: {}", err);
            process::exit(1);
        }
    };

    let args = Cli::parse();

    match args.command {
        Some(Commands::InitDb) => match Database::open(&config.database_path) {
            Ok(_) => println!("Database ready at {}", config.database_path.green()),
            Err(e) => error!("Error opening database: {}", e),
        },
        Some(Commands::Deleted { user, file_id }) => {
            if let Err(err) = run_event(&config, &user, TrashEvent::NodeDeleted { file_id }) {
                error!("Error: {:#}", err);
            }
        }
        Some(Commands::Restored { user, name, path }) => {
            if let Err(err) = run_event(&config, &user, TrashEvent::NodeRestored { name, path }) {
                error!("Error: {:#}", err);
            }
        }
        Some(Commands::Purge { user, path }) => {
            if let Err(err) = run_event(&config, &user, TrashEvent::PermanentDelete { path }) {
                error!("Error: {:#}", err);
            }
        }
        Some(Commands::Owned { user }) => {
            if let Err(err) = run_owned(&config, &user) {
                error!("Error: {:#}", err);
            }
        }
        Some(Commands::PrintConfig) => match toml::to_string_pretty(&config) {
            Ok(rendered) => println!("{}", rendered),
            Err(e) => error!("Error rendering configuration: {}", e),
        },
        Some(Commands::TruncateDb) => {
            if !confirm("Remove every row from the database?") {
                process::exit(0);
            }
            match Database::open(&config.database_path) {
                Ok(db) => match db.truncate_all() {
                    Ok(()) => println!("All tables truncated"),
                    Err(e) => error!("Error truncating database: {}", e),
                },
                Err(e) => error!("Error opening database: {}", e),
            }
        }
        None => {
            let _ = Cli::command().print_long_help();
        }
    }

    Ok(())
}

fn run_event(config: &AppConfig, actor: &str, event: TrashEvent) -> anyhow::Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path))?;
    let users = ConfiguredUsers::new(config.clone());
    let view = LocalView::new(&db, &users, &config.storage_backend);
    let reconciler = Reconciler::new(&db, &view, &users);

    info!("Reconciling {} for '{}'", event.kind(), actor);
    let outcome = reconciler.dispatch(actor, &event)?;
    print_outcome(&outcome);
    Ok(())
}

fn print_outcome(outcome: &Outcome) {
    match outcome {
        Outcome::Skipped(reason) => {
            println!("{} {:?}", "Nothing to do:".yellow(), reason);
        }
        Outcome::Applied(report) => {
            println!(
                "Trash records: {} written, {} removed",
                format!("{}", report.trash_records_written).green(),
                format!("{}", report.trash_records_removed).green(),
            );
            println!(
                "Index rows: {} written, {} removed",
                format!("{}", report.index_rows_written).green(),
                format!("{}", report.index_rows_removed).green(),
            );
            println!(
                "Bytes transferred: {}",
                format!("{}", report.bytes_transferred).cyan()
            );
            for failure in &report.failures {
                println!("{} {}", "Failed:".red(), failure);
            }
        }
    }
}

fn run_owned(config: &AppConfig, uid: &str) -> anyhow::Result<()> {
    let db = Database::open(&config.database_path)
        .with_context(|| format!("opening {}", config.database_path))?;

    let accounts = db.functional_accounts_owned_by(uid)?;
    if accounts.is_empty() {
        println!("'{}' owns no functional accounts", uid);
        return Ok(());
    }

    for account in accounts {
        println!("{}", account.cyan());
        for record in db.trash_records_for_user(&account)? {
            let deleted_at = record
                .deleted_at()
                .map(|at| at.to_rfc3339())
                .unwrap_or_else(|| record.timestamp.to_string());
            println!(
                "  {} (from '{}', deleted by {} at {})",
                record.trashed_name(),
                record.location,
                record.deleted_by.yellow(),
                deleted_at
            );
        }
    }
    Ok(())
}

/// Ask a yes/no question on stdout. Anything but an explicit yes, including
/// a read error, counts as no.
fn confirm(question: &str) -> bool {
    print!("{} [y/N] ", question.red());
    if io::stdout().flush().is_err() {
        return false;
    }
    let mut answer = String::new();
    match io::stdin().read_line(&mut answer) {
        Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
        Err(_) => false,
    }
}
