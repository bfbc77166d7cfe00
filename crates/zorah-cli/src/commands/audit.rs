//! Audit log command

use anyhow::Result;
use zorah_core::db::Database;

use super::truncate;

pub fn cmd_audit(db: &Database, limit: i64) -> Result<()> {
    let entries = db.list_audit_log(limit.max(1))?;

    if entries.is_empty() {
        println!("No audit log entries.");
        return Ok(());
    }

    println!("📜 Audit log (latest {})", entries.len());
    println!();
    println!(
        "   {:19} │ {:24} │ {:16} │ Details",
        "Time", "User", "Action"
    );
    println!("   ────────────────────┼──────────────────────────┼──────────────────┼────────");
    for entry in &entries {
        let target = match (&entry.entity_type, entry.entity_id) {
            (Some(kind), Some(id)) => format!("{} #{} ", kind, id),
            (Some(kind), None) => format!("{} ", kind),
            _ => String::new(),
        };
        println!(
            "   {:19} │ {:24} │ {:16} │ {}{}",
            entry.timestamp,
            truncate(&entry.user_email, 24),
            truncate(&entry.action, 16),
            target,
            entry.details.as_deref().unwrap_or("")
        );
    }

    Ok(())
}
