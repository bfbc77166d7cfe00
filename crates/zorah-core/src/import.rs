//! Roster spreadsheet import (CSV export of the monthly sheet)
//!
//! Columns are located by header name, so sheets may reorder or add columns.
//! Portuguese and English headers are accepted, ignoring case and accents.

use std::io::Read;

use csv::{ReaderBuilder, StringRecord};
use rust_decimal::Decimal;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{MonthlyValues, RawRow, ReferenceMonth};

/// Logical columns of a roster sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Name,
    Email,
    Specialty,
    Unit,
    Shift,
    MonthlyGoal,
    NetValue,
    ClinicValue,
    ProfessionalValue,
    FixedValue,
}

impl Column {
    fn from_header(header: &str) -> Option<Self> {
        match header_key(header).as_str() {
            "nome" | "name" | "prestador" | "profissional" | "nomecompleto" => Some(Self::Name),
            "email" | "emailprestador" => Some(Self::Email),
            "especialidade" | "specialty" => Some(Self::Specialty),
            "unidade" | "unit" => Some(Self::Unit),
            "turno" | "shift" | "periodo" => Some(Self::Shift),
            "metamensal" | "meta" | "monthlygoal" | "goal" => Some(Self::MonthlyGoal),
            "valorliquido" | "liquido" | "valorrecebido" | "netvalue" => Some(Self::NetValue),
            "valorclinica" | "clinica" | "valorfaturado" | "faturamento" | "clinicvalue" => {
                Some(Self::ClinicValue)
            }
            "valorprofissional" | "repasse" | "professionalvalue" => Some(Self::ProfessionalValue),
            "valorfixo" | "fixo" | "fixedvalue" => Some(Self::FixedValue),
            _ => None,
        }
    }
}

/// Lower-case, strip accents and drop anything that isn't a letter or digit.
/// Parenthetical suffixes such as "(R$)" are ignored.
fn header_key(header: &str) -> String {
    let header = header.split('(').next().unwrap_or_default();
    header
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| match c {
            'á' | 'à' | 'â' | 'ã' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'í' | 'ì' | 'î' | 'ï' => 'i',
            'ó' | 'ò' | 'ô' | 'õ' | 'ö' => 'o',
            'ú' | 'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            other => other,
        })
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Column positions resolved from the header row
#[derive(Debug, Default)]
struct ColumnMap {
    positions: Vec<(Column, usize)>,
}

impl ColumnMap {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let mut positions: Vec<(Column, usize)> = Vec::new();
        for (i, header) in headers.iter().enumerate() {
            if let Some(col) = Column::from_header(header) {
                // first occurrence wins when a sheet repeats a column
                if !positions.iter().any(|(c, _)| *c == col) {
                    positions.push((col, i));
                }
            }
        }

        let map = Self { positions };
        for required in [Column::Name, Column::Email] {
            if map.index(required).is_none() {
                return Err(Error::Import(format!(
                    "Missing required column {:?} (headers: {})",
                    required,
                    headers.iter().collect::<Vec<_>>().join(", ")
                )));
            }
        }
        Ok(map)
    }

    fn index(&self, col: Column) -> Option<usize> {
        self.positions
            .iter()
            .find(|(c, _)| *c == col)
            .map(|(_, i)| *i)
    }

    fn text(&self, record: &StringRecord, col: Column) -> Option<String> {
        self.index(col)
            .and_then(|i| record.get(i))
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
    }

    /// Read an amount cell. Unparsable cells are noted in `issues` and read as None.
    fn amount(
        &self,
        record: &StringRecord,
        col: Column,
        issues: &mut Vec<String>,
    ) -> Option<Decimal> {
        let raw = self.text(record, col)?;
        match parse_amount(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                issues.push(e);
                None
            }
        }
    }
}

/// Parse a roster CSV into raw rows.
///
/// The name and email columns must exist; individual cells may still be
/// blank or unreadable, which the normalizer and differ report per row.
pub fn parse_roster_csv<R: Read>(reader: R) -> Result<Vec<RawRow>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns = ColumnMap::from_headers(&headers)?;
    let mut rows = Vec::new();

    for (idx, result) in rdr.records().enumerate() {
        let record = result?;
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }

        let row = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(idx + 2);

        let mut issues = Vec::new();
        let values = MonthlyValues {
            net_value: columns
                .amount(&record, Column::NetValue, &mut issues)
                .unwrap_or_default(),
            clinic_value: columns
                .amount(&record, Column::ClinicValue, &mut issues)
                .unwrap_or_default(),
            professional_value: columns
                .amount(&record, Column::ProfessionalValue, &mut issues)
                .unwrap_or_default(),
            fixed_value: columns
                .amount(&record, Column::FixedValue, &mut issues)
                .unwrap_or_default(),
        };
        let monthly_goal = columns.amount(&record, Column::MonthlyGoal, &mut issues);
        if !issues.is_empty() {
            debug!(row, "Row has unreadable cells: {}", issues.join("; "));
        }

        rows.push(RawRow {
            row,
            name: columns.text(&record, Column::Name),
            email: columns.text(&record, Column::Email),
            specialty: columns.text(&record, Column::Specialty),
            unit: columns.text(&record, Column::Unit),
            shift: columns.text(&record, Column::Shift),
            monthly_goal,
            values,
            issues,
        });
    }

    debug!("Parsed {} roster rows", rows.len());
    Ok(rows)
}

/// Parse a monetary amount in Brazilian or plain decimal notation.
///
/// Accepts "R$ 1.234,56", "1.234,56", "1234,56", "1,234.56", "1234.56" and
/// "(100,00)" for negatives.
pub fn parse_amount(s: &str) -> std::result::Result<Decimal, String> {
    let mut cleaned: String = s
        .trim()
        .replace("R$", "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let negative = cleaned.len() >= 2 && cleaned.starts_with('(') && cleaned.ends_with(')');
    if negative {
        cleaned = cleaned[1..cleaned.len() - 1].to_string();
    }

    let last_comma = cleaned.rfind(',');
    let last_dot = cleaned.rfind('.');
    let normalized = match (last_comma, last_dot) {
        // "1.234,56": dots group thousands, comma is the decimal mark
        (Some(c), Some(d)) if c > d => cleaned.replace('.', "").replace(',', "."),
        // "1,234.56"
        (Some(_), Some(_)) => cleaned.replace(',', ""),
        (Some(_), None) if cleaned.matches(',').count() == 1 => cleaned.replace(',', "."),
        (Some(_), None) => cleaned.replace(',', ""),
        (None, Some(_)) if cleaned.matches('.').count() > 1 => cleaned.replace('.', ""),
        _ => cleaned,
    };

    let value = normalized
        .parse::<Decimal>()
        .map_err(|_| format!("Unable to parse amount: {}", s))?;
    Ok(if negative { -value } else { value })
}

/// SHA-256 fingerprint of an upload for a reference month
pub fn upload_fingerprint(data: &[u8], reference_month: ReferenceMonth) -> String {
    let mut hasher = Sha256::new();
    hasher.update(reference_month.year.to_be_bytes());
    hasher.update(reference_month.month.to_be_bytes());
    hasher.update(data);
    hex::encode(hasher.finalize())
}
