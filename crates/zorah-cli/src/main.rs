//! ZoraH CLI - Clinic roster uploads and provider reports
//!
//! Usage:
//!   zorah init                                        Initialize database
//!   zorah preview --file sheet.csv --month 3 --year 2025   Preview an upload
//!   zorah commit --file sheet.csv --month 3 --year 2025    Apply an upload
//!   zorah report --from 2025-01 --to 2025-03 --group-by-email
//!   zorah serve --port 3000                           Start web server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    match cli.command {
        Commands::Init => commands::cmd_init(&cli.db, cli.no_encrypt),
        Commands::Preview {
            file,
            month,
            year,
            json,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_preview(&db, &file, month, year, json)
        }
        Commands::Commit { file, month, year } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_commit(&db, &file, month, year)?;
            Ok(())
        }
        Commands::Providers { id } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            match id {
                Some(id) => commands::cmd_provider_show(&db, id),
                None => commands::cmd_providers_list(&db),
            }
        }
        Commands::Report {
            from,
            to,
            group_by_email,
            email,
            csv,
        } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            let period = commands::resolve_period(&from, to.as_deref())?;
            commands::cmd_report(&db, &period, group_by_email, email.as_deref(), csv.as_deref())
        }
        Commands::Audit { limit } => {
            let db = commands::open_db(&cli.db, cli.no_encrypt)?;
            commands::cmd_audit(&db, limit)
        }
        Commands::Serve {
            port,
            host,
            no_auth,
            static_dir,
        } => {
            commands::cmd_serve(
                &cli.db,
                &host,
                port,
                no_auth,
                cli.no_encrypt,
                static_dir.as_deref(),
            )
            .await
        }
    }
}
