//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Core commands (init) and shared utilities (open_db)
//! - `import` - Monthly spreadsheet preview and commit
//! - `providers` - Roster listing
//! - `reports` - Custom report generation and CSV export
//! - `audit` - Audit log listing
//! - `serve` - Web server command

pub mod audit;
pub mod core;
pub mod import;
pub mod providers;
pub mod reports;
pub mod serve;

// Re-export command functions for main.rs
pub use audit::*;
pub use core::*;
pub use import::*;
pub use providers::*;
pub use reports::*;
pub use serve::*;

use rust_decimal::{Decimal, RoundingStrategy};

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}

/// Format an amount in reais with two decimals
pub fn brl(value: Decimal) -> String {
    let cents = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("R$ {:.2}", cents)
}
