//! Provider roster and link operations

use rusqlite::{params, Connection, OptionalExtension, Row};
use rust_decimal::Decimal;

use super::{get_optional_decimal, parse_datetime, Database};
use crate::error::{Error, Result};
use crate::models::{ContractType, Provider, ProviderLink, ProviderWithLinks};
use crate::normalize::normalize_email;
use crate::reconcile::Roster;

const PROVIDER_COLUMNS: &str = "id, email, name, contract_type, active, created_at";
const LINK_COLUMNS: &str = "id, provider_id, shift, specialty, unit, monthly_goal";

fn provider_from_row(row: &Row) -> rusqlite::Result<Provider> {
    let contract_str: String = row.get(3)?;
    let created_at_str: String = row.get(5)?;
    Ok(Provider {
        id: row.get(0)?,
        email: row.get(1)?,
        name: row.get(2)?,
        contract_type: contract_str.parse().unwrap_or_default(),
        active: row.get(4)?,
        created_at: parse_datetime(&created_at_str),
    })
}

fn link_from_row(row: &Row) -> rusqlite::Result<ProviderLink> {
    Ok(ProviderLink {
        id: row.get(0)?,
        provider_id: row.get(1)?,
        shift: row.get(2)?,
        specialty: row.get(3)?,
        unit: row.get(4)?,
        monthly_goal: get_optional_decimal(row, 5)?,
    })
}

/// Insert a provider on an open connection or transaction
pub(super) fn insert_provider_on(
    conn: &Connection,
    email: &str,
    name: &str,
    contract_type: ContractType,
) -> Result<i64> {
    let email = normalize_email(email)
        .ok_or_else(|| Error::InvalidData("Provider email is required".to_string()))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(Error::InvalidData("Provider name is required".to_string()));
    }

    conn.execute(
        "INSERT INTO providers (email, name, contract_type) VALUES (?, ?, ?)",
        params![email, name, contract_type.as_str()],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Find a link with the exact (shift, specialty, unit) tuple, creating it if missing.
/// Returns the link id and whether it was created.
pub(super) fn find_or_create_link_on(
    conn: &Connection,
    provider_id: i64,
    shift: Option<&str>,
    specialty: Option<&str>,
    unit: Option<&str>,
    monthly_goal: Option<Decimal>,
) -> Result<(i64, bool)> {
    let goal = monthly_goal.map(|g| g.to_string());
    // IS compares NULLs as equal
    let existing: Option<i64> = conn
        .query_row(
            "SELECT id FROM provider_links WHERE provider_id = ? AND shift IS ? AND specialty IS ? AND unit IS ?",
            params![provider_id, shift, specialty, unit],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        if monthly_goal.is_some() {
            conn.execute(
                "UPDATE provider_links SET monthly_goal = ? WHERE id = ?",
                params![goal, id],
            )?;
        }
        return Ok((id, false));
    }

    conn.execute(
        "INSERT INTO provider_links (provider_id, shift, specialty, unit, monthly_goal) VALUES (?, ?, ?, ?, ?)",
        params![provider_id, shift, specialty, unit, goal],
    )?;
    Ok((conn.last_insert_rowid(), true))
}

impl Database {
    /// Create a provider directly (outside of an upload)
    pub fn insert_provider(
        &self,
        email: &str,
        name: &str,
        contract_type: ContractType,
    ) -> Result<i64> {
        let conn = self.conn()?;
        insert_provider_on(&conn, email, name, contract_type)
    }

    /// Add a link to a provider, or return the existing one with the same tuple
    pub fn add_provider_link(
        &self,
        provider_id: i64,
        shift: Option<&str>,
        specialty: Option<&str>,
        unit: Option<&str>,
        monthly_goal: Option<Decimal>,
    ) -> Result<i64> {
        let conn = self.conn()?;
        if self.get_provider(provider_id)?.is_none() {
            return Err(Error::NotFound(format!("Provider {}", provider_id)));
        }
        let (id, _) =
            find_or_create_link_on(&conn, provider_id, shift, specialty, unit, monthly_goal)?;
        Ok(id)
    }

    /// List all providers ordered by name
    pub fn list_providers(&self) -> Result<Vec<Provider>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM providers ORDER BY name, id",
            PROVIDER_COLUMNS
        ))?;

        let providers = stmt
            .query_map([], provider_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(providers)
    }

    /// Get a provider by ID
    pub fn get_provider(&self, id: i64) -> Result<Option<Provider>> {
        let conn = self.conn()?;
        let provider = conn
            .query_row(
                &format!("SELECT {} FROM providers WHERE id = ?", PROVIDER_COLUMNS),
                params![id],
                provider_from_row,
            )
            .optional()?;
        Ok(provider)
    }

    /// Providers registered under an email (normally zero or one)
    pub fn find_providers_by_email(&self, email: &str) -> Result<Vec<Provider>> {
        let Some(email) = normalize_email(email) else {
            return Ok(vec![]);
        };
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM providers WHERE lower(email) = ? ORDER BY id",
            PROVIDER_COLUMNS
        ))?;
        let providers = stmt
            .query_map(params![email], provider_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(providers)
    }

    /// List a provider's links
    pub fn list_provider_links(&self, provider_id: i64) -> Result<Vec<ProviderLink>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM provider_links WHERE provider_id = ? ORDER BY id",
            LINK_COLUMNS
        ))?;

        let links = stmt
            .query_map(params![provider_id], link_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(links)
    }

    /// Get a provider with its links
    pub fn get_provider_with_links(&self, id: i64) -> Result<Option<ProviderWithLinks>> {
        let Some(provider) = self.get_provider(id)? else {
            return Ok(None);
        };
        let links = self.list_provider_links(id)?;
        Ok(Some(ProviderWithLinks { provider, links }))
    }

    /// Deactivate or reactivate a provider. Inactive providers stay in the
    /// roster so re-uploads still match them.
    pub fn set_provider_active(&self, id: i64, active: bool) -> Result<()> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE providers SET active = ? WHERE id = ?",
            params![active, id],
        )?;
        if updated == 0 {
            return Err(Error::NotFound(format!("Provider {}", id)));
        }
        Ok(())
    }

    /// Snapshot of every provider with its links, for reconciliation
    pub fn load_roster(&self) -> Result<Roster> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM providers ORDER BY id",
            PROVIDER_COLUMNS
        ))?;
        let providers = stmt
            .query_map([], provider_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM provider_links ORDER BY provider_id, id",
            LINK_COLUMNS
        ))?;
        let links = stmt
            .query_map([], link_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let entries = providers
            .into_iter()
            .map(|provider| {
                let links = links
                    .iter()
                    .filter(|l| l.provider_id == provider.id)
                    .cloned()
                    .collect();
                ProviderWithLinks { provider, links }
            })
            .collect();

        Ok(Roster::new(entries))
    }
}
