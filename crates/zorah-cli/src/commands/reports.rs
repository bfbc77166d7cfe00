//! Custom report command

use std::fs::File;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use zorah_core::{
    compute_totals,
    db::Database,
    export_report_csv, group_providers,
    models::{ProviderGroup, ReferenceMonth, ReportPeriod, TotalsSummary},
};

use super::{brl, truncate};

/// Parse --from/--to into a report period (`to` defaults to `from`)
pub fn resolve_period(from: &str, to: Option<&str>) -> Result<ReportPeriod> {
    let from: ReferenceMonth = from
        .parse()
        .map_err(|e: String| anyhow!("Invalid --from month: {}", e))?;
    let to: ReferenceMonth = match to {
        Some(to) => to
            .parse()
            .map_err(|e: String| anyhow!("Invalid --to month: {}", e))?,
        None => from,
    };
    ReportPeriod::new(from, to).map_err(|e| anyhow!(e))
}

/// Load, group and total the report for a period
pub fn build_report(
    db: &Database,
    period: &ReportPeriod,
    group_by_email: bool,
    email: Option<&str>,
) -> Result<(Vec<ProviderGroup>, TotalsSummary)> {
    let groups = db.load_report_groups(period, email)?;
    let groups = group_providers(groups, group_by_email);
    let totals = compute_totals(&groups);
    Ok((groups, totals))
}

pub fn cmd_report(
    db: &Database,
    period: &ReportPeriod,
    group_by_email: bool,
    email: Option<&str>,
    csv: Option<&Path>,
) -> Result<()> {
    let (groups, totals) = build_report(db, period, group_by_email, email)?;

    if let Some(path) = csv {
        let file = File::create(path)
            .with_context(|| format!("Failed to create file: {}", path.display()))?;
        export_report_csv(&groups, &totals, file)?;
        println!(
            "✅ Exported {} rows to {}",
            groups.len(),
            path.display()
        );
        return Ok(());
    }

    println!("📊 Report {} - {}", period.from, period.to);
    if group_by_email {
        println!("   Grouped by email");
    }
    println!();

    if groups.is_empty() {
        println!("   No entries in this period.");
        return Ok(());
    }

    println!(
        "   {:28} │ {:20} │ {:>6} │ {:>16} │ {:>16}",
        "Provider", "Shifts", "Months", "Received", "Billed"
    );
    println!("   ─────────────────────────────┼──────────────────────┼────────┼──────────────────┼─────────────────");
    for group in &groups {
        let shifts = group
            .shift_labels
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "   {:28} │ {:20} │ {:>6} │ {:>16} │ {:>16}",
            truncate(&group.display_name, 28),
            truncate(&shifts, 20),
            group.total_months(),
            brl(group.total_received()),
            brl(group.total_billed())
        );
    }

    println!();
    println!("   Providers:     {}", totals.provider_count);
    println!("   Months worked: {}", totals.total_months_worked);
    println!("   Total paid:    {}", brl(totals.total_paid));
    println!("   Total billed:  {}", brl(totals.total_billed));
    println!("   Fixed:         {}", brl(totals.total_fixed_value));
    println!("   Professional:  {}", brl(totals.total_professional_value));
    println!("   Avg paid/mo:   {}", brl(totals.avg_paid_overall));
    println!("   Avg billed/mo: {}", brl(totals.avg_billed_overall));

    Ok(())
}
