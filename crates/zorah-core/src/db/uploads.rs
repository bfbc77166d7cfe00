//! Committing reconciliation previews

use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use super::providers::{find_or_create_link_on, insert_provider_on};
use super::{get_decimal, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{
    CommitResult, ContractType, LinkCandidate, MonthlyValues, ReconciliationPreview,
    ReferenceMonth,
};

/// A committed upload
#[derive(Debug, Clone, Serialize)]
pub struct UploadBatch {
    pub id: i64,
    pub fingerprint: String,
    pub reference_month: ReferenceMonth,
    pub user_email: String,
    pub providers_created: i64,
    pub links_created: i64,
    pub entries_recorded: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

/// Record one month of values for a link.
///
/// Rows of the same batch for the same link and month are summed; a later
/// batch for that month replaces the earlier values.
pub(super) fn upsert_entry_on(
    conn: &Connection,
    link_id: i64,
    month: ReferenceMonth,
    values: &MonthlyValues,
    batch_id: Option<i64>,
) -> Result<()> {
    let existing = existing_entry_on(conn, link_id, month)?;
    let mut values = *values;
    if let Some((existing_batch, recorded)) = existing {
        if batch_id.is_some() && existing_batch == batch_id {
            values += recorded;
        }
    }

    conn.execute(
        r#"
        INSERT INTO monthly_entries
            (link_id, month, year, net_value, clinic_value, professional_value, fixed_value, upload_batch_id)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(link_id, month, year) DO UPDATE SET
            net_value = excluded.net_value,
            clinic_value = excluded.clinic_value,
            professional_value = excluded.professional_value,
            fixed_value = excluded.fixed_value,
            upload_batch_id = excluded.upload_batch_id,
            updated_at = CURRENT_TIMESTAMP
        "#,
        params![
            link_id,
            month.month,
            month.year,
            values.net_value.to_string(),
            values.clinic_value.to_string(),
            values.professional_value.to_string(),
            values.fixed_value.to_string(),
            batch_id
        ],
    )?;
    Ok(())
}

/// The batch and values already recorded for a link's month, if any
fn existing_entry_on(
    conn: &Connection,
    link_id: i64,
    month: ReferenceMonth,
) -> Result<Option<(Option<i64>, MonthlyValues)>> {
    let existing = conn
        .query_row(
            r#"
            SELECT upload_batch_id, net_value, clinic_value, professional_value, fixed_value
            FROM monthly_entries
            WHERE link_id = ? AND month = ? AND year = ?
            "#,
            params![link_id, month.month, month.year],
            |row| {
                Ok((
                    row.get(0)?,
                    MonthlyValues {
                        net_value: get_decimal(row, 1)?,
                        clinic_value: get_decimal(row, 2)?,
                        professional_value: get_decimal(row, 3)?,
                        fixed_value: get_decimal(row, 4)?,
                    },
                ))
            },
        )
        .optional()?;
    Ok(existing)
}

/// Counters accumulated while committing
#[derive(Default)]
struct CommitCounts {
    providers_created: usize,
    links_created: usize,
    entries_recorded: usize,
}

fn commit_candidate(
    conn: &Connection,
    provider_id: i64,
    candidate: &LinkCandidate,
    month: ReferenceMonth,
    batch_id: i64,
    counts: &mut CommitCounts,
) -> Result<()> {
    let (link_id, created) = find_or_create_link_on(
        conn,
        provider_id,
        candidate.shift.as_deref(),
        candidate.specialty.as_deref(),
        candidate.unit.as_deref(),
        candidate.monthly_goal,
    )?;
    if created {
        counts.links_created += 1;
    }
    record_values(conn, link_id, candidate, month, batch_id, counts)
}

fn record_values(
    conn: &Connection,
    link_id: i64,
    candidate: &LinkCandidate,
    month: ReferenceMonth,
    batch_id: i64,
    counts: &mut CommitCounts,
) -> Result<()> {
    // a row without values only registers the link, unless it zeroes out
    // a month an earlier upload recorded
    if candidate.values.is_zero() {
        let earlier = existing_entry_on(conn, link_id, month)?
            .is_some_and(|(existing_batch, _)| existing_batch != Some(batch_id));
        if !earlier {
            return Ok(());
        }
    }
    upsert_entry_on(conn, link_id, month, &candidate.values, Some(batch_id))?;
    counts.entries_recorded += 1;
    Ok(())
}

impl Database {
    /// Commit a confirmed preview.
    ///
    /// Runs in a single transaction: creates new providers and their links,
    /// adds new links to existing providers and records the reference month's
    /// values for every touched link. Fails with `Error::Conflict` if the same
    /// upload was already committed or the roster changed since the preview.
    pub fn commit_preview(
        &self,
        preview: &ReconciliationPreview,
        fingerprint: &str,
        user_email: &str,
    ) -> Result<CommitResult> {
        let month = preview.summary.reference_month;
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let already: Option<i64> = tx
            .query_row(
                "SELECT id FROM upload_batches WHERE fingerprint = ?",
                params![fingerprint],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(batch_id) = already {
            return Err(Error::Conflict(format!(
                "This upload was already committed (batch {})",
                batch_id
            )));
        }

        tx.execute(
            "INSERT INTO upload_batches (fingerprint, month, year, user_email) VALUES (?, ?, ?, ?)",
            params![fingerprint, month.month, month.year, user_email],
        )?;
        let batch_id = tx.last_insert_rowid();
        let mut counts = CommitCounts::default();

        for entry in &preview.new_providers {
            let taken: i64 = tx.query_row(
                "SELECT COUNT(*) FROM providers WHERE lower(email) = lower(?)",
                params![entry.email],
                |row| row.get(0),
            )?;
            if taken > 0 {
                return Err(Error::Conflict(format!(
                    "Provider {} was registered after the preview; preview the upload again",
                    entry.email
                )));
            }

            let provider_id =
                insert_provider_on(&tx, &entry.email, &entry.name, ContractType::Prestador)?;
            counts.providers_created += 1;

            for candidate in &entry.links {
                commit_candidate(&tx, provider_id, candidate, month, batch_id, &mut counts)?;
            }
        }

        for entry in &preview.existing_providers {
            let exists: i64 = tx.query_row(
                "SELECT COUNT(*) FROM providers WHERE id = ?",
                params![entry.id],
                |row| row.get(0),
            )?;
            if exists == 0 {
                return Err(Error::Conflict(format!(
                    "Provider {} no longer exists; preview the upload again",
                    entry.id
                )));
            }

            for matched in &entry.existing_links {
                let link_ok: i64 = tx.query_row(
                    "SELECT COUNT(*) FROM provider_links WHERE id = ? AND provider_id = ?",
                    params![matched.link.id, entry.id],
                    |row| row.get(0),
                )?;
                if link_ok == 0 {
                    return Err(Error::Conflict(format!(
                        "Link {} of provider {} no longer exists; preview the upload again",
                        matched.link.id, entry.id
                    )));
                }
                record_values(
                    &tx,
                    matched.link.id,
                    &matched.candidate,
                    month,
                    batch_id,
                    &mut counts,
                )?;
            }

            for candidate in &entry.new_links {
                commit_candidate(&tx, entry.id, candidate, month, batch_id, &mut counts)?;
            }
        }

        tx.execute(
            "UPDATE upload_batches SET providers_created = ?, links_created = ?, entries_recorded = ? WHERE id = ?",
            params![
                counts.providers_created as i64,
                counts.links_created as i64,
                counts.entries_recorded as i64,
                batch_id
            ],
        )?;
        tx.commit()?;

        info!(
            batch_id,
            providers = counts.providers_created,
            links = counts.links_created,
            entries = counts.entries_recorded,
            "Committed upload for {}",
            month
        );

        Ok(CommitResult {
            batch_id,
            providers_created: counts.providers_created,
            links_created: counts.links_created,
            entries_recorded: counts.entries_recorded,
        })
    }

    /// List committed uploads, newest first
    pub fn list_upload_batches(&self, limit: i64) -> Result<Vec<UploadBatch>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT id, fingerprint, month, year, user_email,
                   providers_created, links_created, entries_recorded, created_at
            FROM upload_batches
            ORDER BY id DESC
            LIMIT ?
            "#,
        )?;

        let batches = stmt
            .query_map(params![limit], |row| {
                let created_at_str: String = row.get(8)?;
                Ok(UploadBatch {
                    id: row.get(0)?,
                    fingerprint: row.get(1)?,
                    reference_month: ReferenceMonth {
                        month: row.get(2)?,
                        year: row.get(3)?,
                    },
                    user_email: row.get(4)?,
                    providers_created: row.get(5)?,
                    links_created: row.get(6)?,
                    entries_recorded: row.get(7)?,
                    created_at: parse_datetime(&created_at_str),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(batches)
    }

    /// Whether an upload fingerprint has been committed
    pub fn is_upload_committed(&self, fingerprint: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM upload_batches WHERE fingerprint = ?",
            params![fingerprint],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}
