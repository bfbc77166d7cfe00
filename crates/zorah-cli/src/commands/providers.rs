//! Roster commands

use anyhow::{bail, Result};
use zorah_core::db::Database;

use super::truncate;

pub fn cmd_providers_list(db: &Database) -> Result<()> {
    let providers = db.list_providers()?;

    if providers.is_empty() {
        println!("No providers yet. Commit a monthly sheet with 'zorah commit'.");
        return Ok(());
    }

    println!("👩‍⚕️ Providers ({})", providers.len());
    println!();
    println!(
        "   {:>5} │ {:30} │ {:32} │ {:8} │ Active",
        "ID", "Name", "Email", "Contract"
    );
    println!("   ──────┼────────────────────────────────┼──────────────────────────────────┼──────────┼───────");
    for p in &providers {
        println!(
            "   {:>5} │ {:30} │ {:32} │ {:8} │ {}",
            p.id,
            truncate(&p.name, 30),
            truncate(&p.email, 32),
            p.contract_type.as_str(),
            if p.active { "yes" } else { "no" }
        );
    }

    Ok(())
}

pub fn cmd_provider_show(db: &Database, id: i64) -> Result<()> {
    let Some(found) = db.get_provider_with_links(id)? else {
        bail!("Provider {} not found", id);
    };
    let p = &found.provider;

    println!("👩‍⚕️ {} <{}>", p.name, p.email);
    println!("   Contract: {}", p.contract_type.as_str());
    println!("   Active:   {}", if p.active { "yes" } else { "no" });
    println!("   Since:    {}", p.created_at.format("%Y-%m-%d"));
    println!();

    if found.links.is_empty() {
        println!("   No links.");
        return Ok(());
    }

    println!("   Links ({}):", found.links.len());
    for link in &found.links {
        let goal = link
            .monthly_goal
            .map(|g| format!(" (goal {:.2})", g))
            .unwrap_or_default();
        println!(
            "     #{} {} / {} / {}{}",
            link.id,
            link.shift.as_deref().unwrap_or("-"),
            link.specialty.as_deref().unwrap_or("-"),
            link.unit.as_deref().unwrap_or("-"),
            goal
        );
    }

    Ok(())
}
