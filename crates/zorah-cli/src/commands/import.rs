//! Monthly spreadsheet preview and commit

use std::path::Path;

use anyhow::{anyhow, bail, Context, Result};
use tracing::debug;
use zorah_core::{
    build_preview,
    db::Database,
    import::{parse_roster_csv, upload_fingerprint},
    models::{CommitResult, LinkCandidate, ReconciliationPreview, ReferenceMonth, RowErrorKind},
    Error as CoreError,
};

/// User recorded in the audit log for commits made from the terminal
const CLI_USER: &str = "cli";

/// Read a sheet and diff it against the current roster
///
/// Returns the preview together with the upload fingerprint.
pub fn load_preview(
    db: &Database,
    file: &Path,
    month: u32,
    year: i32,
) -> Result<(ReconciliationPreview, String)> {
    let reference_month = ReferenceMonth::new(month, year).map_err(|e| anyhow!(e))?;

    let data = std::fs::read(file)
        .with_context(|| format!("Failed to open file: {}", file.display()))?;
    let rows = parse_roster_csv(data.as_slice())
        .with_context(|| format!("Failed to parse sheet: {}", file.display()))?;
    debug!(rows = rows.len(), "Parsed {}", file.display());

    let roster = db.load_roster()?;
    let preview = build_preview(&rows, &roster, reference_month);
    let fingerprint = upload_fingerprint(&data, reference_month);

    Ok((preview, fingerprint))
}

fn describe_link(link: &LinkCandidate) -> String {
    format!(
        "{} / {} / {}",
        link.shift.as_deref().unwrap_or("-"),
        link.specialty.as_deref().unwrap_or("-"),
        link.unit.as_deref().unwrap_or("-")
    )
}

fn print_preview(preview: &ReconciliationPreview) {
    let summary = &preview.summary;
    println!("📋 Upload preview for {}", summary.reference_month);
    println!(
        "   Providers: {} ({} new, {} existing)",
        summary.total_providers, summary.new_count, summary.existing_count
    );
    println!("   Links:     {}", summary.total_links);
    println!("   Errors:    {}", summary.error_count);

    if !preview.new_providers.is_empty() {
        println!();
        println!("🆕 New providers:");
        for p in &preview.new_providers {
            println!("   {} <{}>", p.name, p.email);
            for link in &p.links {
                println!("     + {}", describe_link(link));
            }
        }
    }

    if !preview.existing_providers.is_empty() {
        println!();
        println!("👥 Existing providers:");
        for p in &preview.existing_providers {
            println!("   #{} {} <{}>", p.id, p.name, p.email);
            for matched in &p.existing_links {
                println!("     = {} (link #{})", describe_link(&matched.candidate), matched.link.id);
            }
            for link in &p.new_links {
                println!("     + {}", describe_link(link));
            }
        }
    }

    if !preview.errors.is_empty() {
        println!();
        println!("⚠️  Rows left out:");
        for err in &preview.errors {
            let kind = match err.kind {
                RowErrorKind::Validation => "invalid",
                RowErrorKind::AmbiguousMatch => "ambiguous",
            };
            println!("   row {:>4} [{}] {}", err.row, kind, err.message);
        }
    }
}

pub fn cmd_preview(db: &Database, file: &Path, month: u32, year: i32, json: bool) -> Result<()> {
    let (preview, fingerprint) = load_preview(db, file, month, year)?;
    let already_committed = db.is_upload_committed(&fingerprint)?;

    if json {
        let out = serde_json::json!({
            "preview": preview,
            "already_committed": already_committed,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_preview(&preview);
    println!();
    if already_committed {
        println!("ℹ️  This file was already committed for {}.", preview.summary.reference_month);
    } else {
        println!(
            "Run 'zorah commit --file {} --month {} --year {}' to apply.",
            file.display(),
            month,
            year
        );
    }

    Ok(())
}

pub fn cmd_commit(db: &Database, file: &Path, month: u32, year: i32) -> Result<CommitResult> {
    let (preview, fingerprint) = load_preview(db, file, month, year)?;
    print_preview(&preview);
    println!();

    let result = match db.commit_preview(&preview, &fingerprint, CLI_USER) {
        Ok(result) => result,
        Err(CoreError::Conflict(msg)) => bail!("Upload rejected: {}", msg),
        Err(e) => return Err(e.into()),
    };

    db.log_audit(
        CLI_USER,
        "upload_commit",
        Some("upload_batch"),
        Some(result.batch_id),
        Some(&format!(
            "file={}, month={}, providers_created={}, links_created={}, entries_recorded={}",
            file.display(),
            preview.summary.reference_month,
            result.providers_created,
            result.links_created,
            result.entries_recorded
        )),
    )?;

    println!("✅ Upload #{} committed", result.batch_id);
    println!("   Providers created: {}", result.providers_created);
    println!("   Links created:     {}", result.links_created);
    println!("   Entries recorded:  {}", result.entries_recorded);

    Ok(result)
}
