//! Monthly financial entries and report source data

use std::collections::BTreeSet;

use rusqlite::params;

use super::uploads::upsert_entry_on;
use super::{get_decimal, Database};
use crate::error::{Error, Result};
use crate::models::{MonthlyFinancialEntry, ProviderGroup, ReferenceMonth, ReportPeriod};
use crate::normalize::normalize_email;

impl Database {
    /// Set one month's values for a link, replacing what was recorded
    pub fn upsert_monthly_entry(&self, link_id: i64, entry: &MonthlyFinancialEntry) -> Result<()> {
        let month = ReferenceMonth::new(entry.month, entry.year).map_err(Error::InvalidData)?;
        let values = entry.values();

        let conn = self.conn()?;
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM provider_links WHERE id = ?",
            params![link_id],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(Error::NotFound(format!("Link {}", link_id)));
        }
        upsert_entry_on(&conn, link_id, month, &values, None)
    }

    /// Monthly entries recorded for a link, oldest first
    pub fn list_monthly_entries(&self, link_id: i64) -> Result<Vec<MonthlyFinancialEntry>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT e.month, e.year, e.net_value, e.clinic_value, e.professional_value,
                   e.fixed_value, l.shift
            FROM monthly_entries e
            JOIN provider_links l ON l.id = e.link_id
            WHERE e.link_id = ?
            ORDER BY e.year, e.month
            "#,
        )?;

        let entries = stmt
            .query_map(params![link_id], |row| {
                Ok(MonthlyFinancialEntry {
                    month: row.get(0)?,
                    year: row.get(1)?,
                    net_value: get_decimal(row, 2)?,
                    clinic_value: get_decimal(row, 3)?,
                    professional_value: get_decimal(row, 4)?,
                    fixed_value: get_decimal(row, 5)?,
                    shift_label: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Load one ungrouped record per link with its entries inside `period`.
    ///
    /// Links without entries in the period are left out. When `email` is
    /// given only that provider's links are returned.
    pub fn load_report_groups(
        &self,
        period: &ReportPeriod,
        email: Option<&str>,
    ) -> Result<Vec<ProviderGroup>> {
        let email = email.and_then(normalize_email);
        let from_key = period.from.year * 100 + period.from.month as i32;
        let to_key = period.to.year * 100 + period.to.month as i32;

        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT l.id, p.email, p.name, l.specialty, l.shift,
                   e.month, e.year, e.net_value, e.clinic_value,
                   e.professional_value, e.fixed_value
            FROM monthly_entries e
            JOIN provider_links l ON l.id = e.link_id
            JOIN providers p ON p.id = l.provider_id
            WHERE (e.year * 100 + e.month) BETWEEN ?1 AND ?2
              AND (?3 IS NULL OR lower(p.email) = ?3)
            ORDER BY p.name, l.id, e.year, e.month
            "#,
        )?;

        let rows = stmt
            .query_map(params![from_key, to_key, email], |row| {
                let link_id: i64 = row.get(0)?;
                let email: String = row.get(1)?;
                let name: String = row.get(2)?;
                let specialty: Option<String> = row.get(3)?;
                let shift: Option<String> = row.get(4)?;
                let entry = MonthlyFinancialEntry {
                    month: row.get(5)?,
                    year: row.get(6)?,
                    net_value: get_decimal(row, 7)?,
                    clinic_value: get_decimal(row, 8)?,
                    professional_value: get_decimal(row, 9)?,
                    fixed_value: get_decimal(row, 10)?,
                    shift_label: shift.clone(),
                };
                Ok((link_id, email, name, specialty, shift, entry))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut groups: Vec<ProviderGroup> = Vec::new();
        for (link_id, email, name, specialty, shift, entry) in rows {
            // rows arrive ordered by link, so a new id starts a new group
            match groups.last_mut() {
                Some(group) if group.ids == [link_id] => group.monthly_entries.push(entry),
                _ => groups.push(ProviderGroup {
                    ids: vec![link_id],
                    email: Some(email),
                    display_name: name,
                    specialty,
                    shift_labels: shift.into_iter().collect::<BTreeSet<_>>(),
                    monthly_entries: vec![entry],
                }),
            }
        }

        Ok(groups)
    }
}
