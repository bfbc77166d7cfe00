//! Record normalizer: turns a mapped spreadsheet row into a `ProviderRecord`

use std::sync::OnceLock;

use regex::Regex;

use crate::models::{ProviderRecord, RawRow, RowError, RowErrorKind};

/// Shift qualifiers that spreadsheets append to provider names
fn shift_qualifier_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?i)\(\s*(?:tarde|manhã|manha|indefinido)\s*\)").expect("valid regex")
    })
}

/// Strip known shift qualifiers ("(tarde)", "(manhã)", "(manha)", "(indefinido)")
/// from a name, case-insensitively, and trim the result.
///
/// Other parenthetical content is kept.
pub fn clean_name(raw: &str) -> String {
    let re = shift_qualifier_regex();
    let mut name = raw.to_string();
    // Removing one qualifier can join text into another, e.g. "(ta(manhã)rde)"
    while re.is_match(&name) {
        name = re.replace_all(&name, "").into_owned();
    }
    name.trim().to_string()
}

/// Canonical form of an email used as identity key
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_lowercase();
    if email.is_empty() {
        None
    } else {
        Some(email)
    }
}

fn non_blank(value: Option<&String>) -> Option<String> {
    value
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Normalize one raw row.
///
/// Rows with unreadable cells or without a name are rejected with a
/// validation error. Rows without an email are accepted here; the differ
/// decides what to do with them.
pub fn normalize(raw: &RawRow) -> Result<ProviderRecord, RowError> {
    let email = raw.email.as_deref().and_then(normalize_email);

    if !raw.issues.is_empty() {
        return Err(RowError {
            row: raw.row,
            email,
            kind: RowErrorKind::Validation,
            message: raw.issues.join("; "),
        });
    }

    let raw_name = match non_blank(raw.name.as_ref()) {
        Some(name) => name,
        None => {
            return Err(RowError {
                row: raw.row,
                email,
                kind: RowErrorKind::Validation,
                message: "Missing provider name".to_string(),
            })
        }
    };

    let clean = clean_name(&raw_name);
    if clean.is_empty() {
        return Err(RowError {
            row: raw.row,
            email,
            kind: RowErrorKind::Validation,
            message: format!("Name '{}' is only a shift qualifier", raw_name),
        });
    }

    Ok(ProviderRecord {
        row: raw.row,
        email,
        clean_name: clean,
        raw_name,
        specialty: non_blank(raw.specialty.as_ref()),
        unit: non_blank(raw.unit.as_ref()),
        shift: non_blank(raw.shift.as_ref()),
        monthly_goal: raw.monthly_goal,
        values: raw.values,
    })
}

/// Normalize a batch of rows, splitting accepted records from rejected rows
pub fn normalize_all(rows: &[RawRow]) -> (Vec<ProviderRecord>, Vec<RowError>) {
    let mut records = Vec::with_capacity(rows.len());
    let mut errors = Vec::new();

    for row in rows {
        match normalize(row) {
            Ok(record) => records.push(record),
            Err(err) => errors.push(err),
        }
    }

    (records, errors)
}
