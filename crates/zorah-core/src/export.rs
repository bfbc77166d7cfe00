//! Custom report export
//!
//! One CSV row per provider group followed by a TOTAL row. Values are
//! written with two decimals; currency symbols are left to the consumer.

use std::io::Write;

use csv::WriterBuilder;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::Result;
use crate::models::{ProviderGroup, TotalsSummary};

const HEADERS: [&str; 11] = [
    "name",
    "email",
    "specialty",
    "shifts",
    "months",
    "total_received",
    "total_billed",
    "total_fixed",
    "total_professional",
    "avg_received",
    "avg_billed",
];

fn money(value: Decimal) -> String {
    let cents = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    format!("{:.2}", cents)
}

/// Write the report for `groups` and their `totals` as CSV
pub fn export_report_csv<W: Write>(
    groups: &[ProviderGroup],
    totals: &TotalsSummary,
    writer: W,
) -> Result<()> {
    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADERS)?;

    for group in groups {
        let shifts = group
            .shift_labels
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ");

        wtr.write_record([
            group.display_name.clone(),
            group.email.clone().unwrap_or_default(),
            group.specialty.clone().unwrap_or_default(),
            shifts,
            group.total_months().to_string(),
            money(group.total_received()),
            money(group.total_billed()),
            money(group.total_fixed()),
            money(group.total_professional()),
            money(group.avg_received()),
            money(group.avg_billed()),
        ])?;
    }

    wtr.write_record([
        "TOTAL".to_string(),
        String::new(),
        String::new(),
        format!("{} providers", totals.provider_count),
        totals.total_months_worked.to_string(),
        money(totals.total_paid),
        money(totals.total_billed),
        money(totals.total_fixed_value),
        money(totals.total_professional_value),
        money(totals.avg_paid_overall),
        money(totals.avg_billed_overall),
    ])?;

    wtr.flush()?;
    Ok(())
}
