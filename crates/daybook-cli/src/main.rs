//! daybook CLI - write one line a day from the terminal
//!
//! Entries live in a local libSQL file and sync with a daybook-api server.

mod cli;
mod commands;
mod error;


use clap::{CommandFactory, Parser};
use daybook_core::EntryDate;

use cli::{Cli, Commands};
use commands::common::{parse_entry_date, resolve_db_path};
use commands::completions::run_completions;
use commands::delete::run_delete;
use commands::export::run_export;
use commands::import::run_import;
use commands::list::run_list;
use commands::show::run_show;
use commands::status::run_status;
use commands::sync::run_sync;
use commands::watch::run_watch;
use commands::write::run_write;
use error::CliError;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    let mut filter = tracing_subscriber::EnvFilter::from_default_env();
    for directive in ["daybook=info", "daybook_core=info"] {
        if let Ok(directive) = directive.parse() {
            filter = filter.add_directive(directive);
        }
    }
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Completions need no database
    if let Some(Commands::Completions { shell, output }) = &cli.command {
        return run_completions(*shell, output.as_deref());
    }

    let db_path = resolve_db_path(cli.db_path)?;

    match cli.command {
        Some(Commands::Write { date, message }) => {
            run_write(parse_entry_date(&date)?, &message, &db_path).await?;
        }
        Some(Commands::Show { date, json }) => {
            run_show(parse_entry_date(&date)?, json, &db_path).await?;
        }
        Some(Commands::Delete { date }) => run_delete(parse_entry_date(&date)?, &db_path).await?,
        Some(Commands::List { limit, json }) => run_list(limit, json, &db_path).await?,
        Some(Commands::Export { format, output }) => {
            run_export(format, output.as_deref(), &db_path).await?;
        }
        Some(Commands::Import { file }) => run_import(&file, &db_path).await?,
        Some(Commands::Sync) => run_sync(cli.server_url, &db_path).await?,
        Some(Commands::Watch) => run_watch(cli.server_url, &db_path).await?,
        Some(Commands::Status { json }) => run_status(json, cli.server_url, &db_path).await?,
        Some(Commands::Completions { .. }) => {}
        None => {
            // Quick capture mode: daybook "what happened today"
            if cli.message.is_empty() {
                Cli::command().print_help()?;
                println!();
            } else {
                run_write(EntryDate::today(), &cli.message, &db_path).await?;
            }
        }
    }

    Ok(())
}
