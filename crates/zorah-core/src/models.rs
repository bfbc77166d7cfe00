//! Domain models for ZoraH

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Access role of a back-office user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Master,
    Admin,
    Prestador,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Admin => "admin",
            Self::Prestador => "prestador",
        }
    }

    /// Master and admin users manage the roster; prestadores only see their own data
    pub fn is_staff(&self) -> bool {
        matches!(self, Self::Master | Self::Admin)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "master" => Ok(Self::Master),
            "admin" => Ok(Self::Admin),
            "prestador" | "provider" => Ok(Self::Prestador),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Kind of engagement between the clinic and a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ContractType {
    /// Independent contractor, paid against a nota fiscal
    #[default]
    Prestador,
    /// Salaried employee
    Clt,
}

impl ContractType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Prestador => "prestador",
            Self::Clt => "clt",
        }
    }
}

impl std::str::FromStr for ContractType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "prestador" | "pj" => Ok(Self::Prestador),
            "clt" => Ok(Self::Clt),
            _ => Err(format!("Unknown contract type: {}", s)),
        }
    }
}

impl std::fmt::Display for ContractType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A provider in the clinic roster
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub contract_type: ContractType,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A vínculo: the provider's engagement on one (shift, specialty, unit)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderLink {
    pub id: i64,
    pub provider_id: i64,
    pub shift: Option<String>,
    pub specialty: Option<String>,
    pub unit: Option<String>,
    pub monthly_goal: Option<Decimal>,
}

impl ProviderLink {
    /// Exact (shift, specialty, unit) comparison
    pub fn matches(&self, shift: Option<&str>, specialty: Option<&str>, unit: Option<&str>) -> bool {
        self.shift.as_deref() == shift
            && self.specialty.as_deref() == specialty
            && self.unit.as_deref() == unit
    }
}

/// A provider together with its current links
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderWithLinks {
    #[serde(flatten)]
    pub provider: Provider,
    pub links: Vec<ProviderLink>,
}

/// The month an upload or report refers to
///
/// Field order matters: derived ordering is by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReferenceMonth {
    pub year: i32,
    pub month: u32,
}

impl ReferenceMonth {
    pub fn new(month: u32, year: i32) -> std::result::Result<Self, String> {
        if !(1..=12).contains(&month) {
            return Err(format!("Invalid month: {} (expected 1-12)", month));
        }
        if !(1900..=9999).contains(&year) {
            return Err(format!("Invalid year: {}", year));
        }
        Ok(Self { year, month })
    }
}

impl std::str::FromStr for ReferenceMonth {
    type Err = String;

    /// Parses "YYYY-MM" or "MM/YYYY"
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        let (year, month) = if let Some((y, m)) = s.split_once('-') {
            (y, m)
        } else if let Some((m, y)) = s.split_once('/') {
            (y, m)
        } else {
            return Err(format!("Invalid month format: {} (use YYYY-MM)", s));
        };

        let year: i32 = year
            .parse()
            .map_err(|_| format!("Invalid year in: {}", s))?;
        let month: u32 = month
            .parse()
            .map_err(|_| format!("Invalid month in: {}", s))?;
        Self::new(month, year)
    }
}

impl std::fmt::Display for ReferenceMonth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:02}/{}", self.month, self.year)
    }
}

/// Inclusive range of months for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPeriod {
    pub from: ReferenceMonth,
    pub to: ReferenceMonth,
}

impl ReportPeriod {
    pub fn new(from: ReferenceMonth, to: ReferenceMonth) -> std::result::Result<Self, String> {
        if from > to {
            return Err(format!("Period start {} is after end {}", from, to));
        }
        Ok(Self { from, to })
    }

    pub fn single(month: ReferenceMonth) -> Self {
        Self {
            from: month,
            to: month,
        }
    }

    pub fn contains(&self, month: u32, year: i32) -> bool {
        let m = ReferenceMonth { year, month };
        self.from <= m && m <= self.to
    }
}

/// The four disjoint monetary components of one month's billing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MonthlyValues {
    #[serde(default)]
    pub net_value: Decimal,
    #[serde(default)]
    pub clinic_value: Decimal,
    #[serde(default)]
    pub professional_value: Decimal,
    #[serde(default)]
    pub fixed_value: Decimal,
}

impl MonthlyValues {
    pub fn is_zero(&self) -> bool {
        self.net_value.is_zero()
            && self.clinic_value.is_zero()
            && self.professional_value.is_zero()
            && self.fixed_value.is_zero()
    }
}

impl std::ops::AddAssign for MonthlyValues {
    fn add_assign(&mut self, other: Self) {
        self.net_value += other.net_value;
        self.clinic_value += other.clinic_value;
        self.professional_value += other.professional_value;
        self.fixed_value += other.fixed_value;
    }
}

/// A spreadsheet row after column mapping, before normalization
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawRow {
    /// 1-based row number in the source file (header is row 1)
    pub row: usize,
    pub name: Option<String>,
    pub email: Option<String>,
    pub specialty: Option<String>,
    pub unit: Option<String>,
    pub shift: Option<String>,
    pub monthly_goal: Option<Decimal>,
    #[serde(default)]
    pub values: MonthlyValues,
    /// Cells that could not be read; a row with issues is rejected as a whole
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

/// One uploaded row after normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderRecord {
    pub row: usize,
    /// Trimmed and lower-cased; None when the row had no email
    pub email: Option<String>,
    pub raw_name: String,
    pub clean_name: String,
    pub specialty: Option<String>,
    pub unit: Option<String>,
    pub shift: Option<String>,
    pub monthly_goal: Option<Decimal>,
    pub values: MonthlyValues,
}

impl ProviderRecord {
    /// Key for listing and display. Falls back to the raw name when the row
    /// has no email; never use this for merge decisions.
    pub fn identity_key(&self) -> &str {
        self.email.as_deref().unwrap_or(&self.raw_name)
    }
}

/// An uploaded (shift, specialty, unit) engagement proposed for a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkCandidate {
    pub row: usize,
    pub raw_name: String,
    pub shift: Option<String>,
    pub specialty: Option<String>,
    pub unit: Option<String>,
    pub monthly_goal: Option<Decimal>,
    pub values: MonthlyValues,
}

impl From<&ProviderRecord> for LinkCandidate {
    fn from(record: &ProviderRecord) -> Self {
        Self {
            row: record.row,
            raw_name: record.raw_name.clone(),
            shift: record.shift.clone(),
            specialty: record.specialty.clone(),
            unit: record.unit.clone(),
            monthly_goal: record.monthly_goal,
            values: record.values,
        }
    }
}

/// An uploaded row that matched a link the provider already has
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedLink {
    pub link: ProviderLink,
    pub candidate: LinkCandidate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewProviderEntry {
    pub email: String,
    pub name: String,
    pub links: Vec<LinkCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistingProviderEntry {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub existing_links: Vec<MatchedLink>,
    pub new_links: Vec<LinkCandidate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreviewSummary {
    pub total_providers: usize,
    pub new_count: usize,
    pub existing_count: usize,
    pub total_links: usize,
    pub error_count: usize,
    pub reference_month: ReferenceMonth,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowErrorKind {
    /// A required field is missing or malformed
    Validation,
    /// More than one roster provider shares the row's email
    AmbiguousMatch,
}

/// A row excluded from the preview, reported back to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RowError {
    pub row: usize,
    pub email: Option<String>,
    pub kind: RowErrorKind,
    pub message: String,
}

/// Result of diffing an upload against the roster
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconciliationPreview {
    pub new_providers: Vec<NewProviderEntry>,
    pub existing_providers: Vec<ExistingProviderEntry>,
    pub summary: PreviewSummary,
    pub errors: Vec<RowError>,
}

/// Outcome of committing a preview
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CommitResult {
    pub batch_id: i64,
    pub providers_created: usize,
    pub links_created: usize,
    pub entries_recorded: usize,
}

/// One (month, year) observation for a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyFinancialEntry {
    pub month: u32,
    pub year: i32,
    #[serde(default)]
    pub net_value: Decimal,
    #[serde(default)]
    pub clinic_value: Decimal,
    #[serde(default)]
    pub professional_value: Decimal,
    #[serde(default)]
    pub fixed_value: Decimal,
    pub shift_label: Option<String>,
}

impl MonthlyFinancialEntry {
    pub fn new(month: u32, year: i32, values: MonthlyValues, shift_label: Option<String>) -> Self {
        Self {
            month,
            year,
            net_value: values.net_value,
            clinic_value: values.clinic_value,
            professional_value: values.professional_value,
            fixed_value: values.fixed_value,
            shift_label,
        }
    }

    pub fn values(&self) -> MonthlyValues {
        MonthlyValues {
            net_value: self.net_value,
            clinic_value: self.clinic_value,
            professional_value: self.professional_value,
            fixed_value: self.fixed_value,
        }
    }

    pub fn same_period(&self, other: &Self) -> bool {
        self.month == other.month && self.year == other.year
    }
}

/// A provider's shift record, or every shift record sharing one email
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderGroup {
    pub ids: Vec<i64>,
    pub email: Option<String>,
    pub display_name: String,
    pub specialty: Option<String>,
    pub shift_labels: BTreeSet<String>,
    pub monthly_entries: Vec<MonthlyFinancialEntry>,
}

impl ProviderGroup {
    pub fn total_months(&self) -> usize {
        self.monthly_entries.len()
    }

    pub fn total_received(&self) -> Decimal {
        self.monthly_entries.iter().map(|e| e.net_value).sum()
    }

    pub fn total_billed(&self) -> Decimal {
        self.monthly_entries.iter().map(|e| e.clinic_value).sum()
    }

    pub fn total_fixed(&self) -> Decimal {
        self.monthly_entries.iter().map(|e| e.fixed_value).sum()
    }

    pub fn total_professional(&self) -> Decimal {
        self.monthly_entries
            .iter()
            .map(|e| e.professional_value)
            .sum()
    }

    pub fn avg_received(&self) -> Decimal {
        per_month(self.total_received(), self.total_months())
    }

    pub fn avg_billed(&self) -> Decimal {
        per_month(self.total_billed(), self.total_months())
    }
}

/// Divide a total by a month count, yielding 0 for no months
pub(crate) fn per_month(total: Decimal, months: usize) -> Decimal {
    if months == 0 {
        Decimal::ZERO
    } else {
        total / Decimal::from(months)
    }
}

/// A provider group with its derived figures, as shown in reports
#[derive(Debug, Clone, Serialize)]
pub struct ProviderGroupReport {
    #[serde(flatten)]
    pub group: ProviderGroup,
    pub total_months: usize,
    pub total_received: Decimal,
    pub total_billed: Decimal,
    pub total_fixed: Decimal,
    pub total_professional: Decimal,
    pub avg_received: Decimal,
    pub avg_billed: Decimal,
}

impl From<ProviderGroup> for ProviderGroupReport {
    fn from(group: ProviderGroup) -> Self {
        Self {
            total_months: group.total_months(),
            total_received: group.total_received(),
            total_billed: group.total_billed(),
            total_fixed: group.total_fixed(),
            total_professional: group.total_professional(),
            avg_received: group.avg_received(),
            avg_billed: group.avg_billed(),
            group,
        }
    }
}

/// Grand totals over a list of provider groups
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalsSummary {
    pub provider_count: usize,
    pub total_paid: Decimal,
    pub total_billed: Decimal,
    pub total_fixed_value: Decimal,
    pub total_professional_value: Decimal,
    pub total_months_worked: usize,
    pub avg_paid_overall: Decimal,
    pub avg_billed_overall: Decimal,
    pub avg_fixed_overall: Decimal,
    pub avg_professional_overall: Decimal,
}

/// A list response with its total count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn from_items(items: Vec<T>) -> Self {
        let total = items.len() as i64;
        Self { items, total }
    }
}
