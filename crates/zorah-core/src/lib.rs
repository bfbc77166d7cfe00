//! ZoraH Core Library
//!
//! Shared functionality for the ZoraH clinic back office:
//! - Database access and schema bootstrap
//! - Roster CSV import and upload fingerprints
//! - Record normalization and the roster differ (upload previews)
//! - Grouping and totals for custom reports
//! - Report CSV export

pub mod db;
pub mod error;
pub mod export;
pub mod grouping;
pub mod import;
pub mod models;
pub mod normalize;
pub mod reconcile;
pub mod totals;

pub use db::{AuditEntry, Database, UploadBatch};
pub use error::{Error, Result};
pub use export::export_report_csv;
pub use grouping::group_providers;
pub use import::{parse_roster_csv, upload_fingerprint};
pub use normalize::{clean_name, normalize, normalize_email};
pub use reconcile::{build_preview, reconcile, Roster, RosterMatch};
pub use totals::compute_totals;
