//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// ZoraH - Provider roster and payment reports for clinics
#[derive(Parser)]
#[command(name = "zorah")]
#[command(about = "Clinic back office: monthly roster uploads and custom reports", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Database path
    #[arg(long, default_value = "zorah.db", global = true)]
    pub db: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable database encryption (not recommended for production)
    ///
    /// By default, the database is encrypted using SQLCipher.
    /// Set ZORAH_DB_KEY environment variable with your passphrase.
    /// Use --no-encrypt only for development or testing.
    #[arg(long, global = true)]
    pub no_encrypt: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database
    Init,

    /// Show what a monthly spreadsheet would change, without writing
    Preview {
        /// CSV export of the monthly sheet
        #[arg(short, long)]
        file: PathBuf,

        /// Reference month (1-12)
        #[arg(short, long)]
        month: u32,

        /// Reference year
        #[arg(short, long)]
        year: i32,

        /// Print the preview as JSON
        #[arg(long)]
        json: bool,
    },

    /// Apply a monthly spreadsheet to the roster
    Commit {
        /// CSV export of the monthly sheet
        #[arg(short, long)]
        file: PathBuf,

        /// Reference month (1-12)
        #[arg(short, long)]
        month: u32,

        /// Reference year
        #[arg(short, long)]
        year: i32,
    },

    /// List providers, or show one provider's links
    Providers {
        /// Provider ID to show in detail
        #[arg(long)]
        id: Option<i64>,
    },

    /// Custom report of payments and billing per provider
    Report {
        /// First month (YYYY-MM)
        #[arg(long)]
        from: String,

        /// Last month (YYYY-MM, defaults to --from)
        #[arg(long)]
        to: Option<String>,

        /// Merge all links sharing an email into one row
        #[arg(long)]
        group_by_email: bool,

        /// Only this provider's email
        #[arg(long)]
        email: Option<String>,

        /// Write the report to a CSV file instead of printing it
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Show recent audit log entries
    Audit {
        /// Number of entries to show
        #[arg(short, long, default_value = "20")]
        limit: i64,
    },

    /// Start the web server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Disable authentication (for local development only)
        ///
        /// WARNING: Do not use this flag when exposing the server to a network.
        /// By default, the server requires an API key from ZORAH_API_KEYS.
        #[arg(long)]
        no_auth: bool,

        /// Directory containing static files to serve (e.g., ui/dist)
        #[arg(long)]
        static_dir: Option<PathBuf>,
    },
}
