//! Roster differ: classifies an upload against the current roster
//!
//! The differ never writes. It produces a `ReconciliationPreview` that is
//! shown for confirmation and only then committed by
//! [`Database::commit_preview`](crate::db::Database::commit_preview).

use std::collections::HashMap;

use tracing::debug;

use crate::models::{
    ExistingProviderEntry, LinkCandidate, MatchedLink, NewProviderEntry, PreviewSummary,
    ProviderRecord, ProviderWithLinks, RawRow, ReconciliationPreview, ReferenceMonth, RowError,
    RowErrorKind,
};
use crate::normalize::{normalize_all, normalize_email};

/// Read-only snapshot of the roster, indexed by normalized email
#[derive(Debug, Clone, Default)]
pub struct Roster {
    providers: Vec<ProviderWithLinks>,
    by_email: HashMap<String, Vec<usize>>,
}

/// Result of looking up an email in the roster
#[derive(Debug)]
pub enum RosterMatch<'a> {
    None,
    One(&'a ProviderWithLinks),
    /// Several providers share the email, which is a data-integrity problem
    Ambiguous(Vec<&'a ProviderWithLinks>),
}

impl Roster {
    pub fn new(providers: Vec<ProviderWithLinks>) -> Self {
        let mut by_email: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in providers.iter().enumerate() {
            if let Some(email) = normalize_email(&entry.provider.email) {
                by_email.entry(email).or_default().push(idx);
            }
        }
        Self {
            providers,
            by_email,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.providers.len()
    }

    /// Look up a normalized email
    pub fn lookup(&self, email: &str) -> RosterMatch<'_> {
        match self.by_email.get(email).map(|v| v.as_slice()) {
            None | Some([]) => RosterMatch::None,
            Some([idx]) => RosterMatch::One(&self.providers[*idx]),
            Some(indices) => {
                RosterMatch::Ambiguous(indices.iter().map(|i| &self.providers[*i]).collect())
            }
        }
    }
}

/// Diff normalized records against the roster.
///
/// Every record lands in exactly one place: a new-provider entry, one of the
/// two link buckets of an existing-provider entry, or the error list. Entries
/// are emitted in first-seen order of their email.
pub fn reconcile(
    records: &[ProviderRecord],
    roster: &Roster,
    reference_month: ReferenceMonth,
) -> ReconciliationPreview {
    let mut new_providers: Vec<NewProviderEntry> = Vec::new();
    let mut new_index: HashMap<String, usize> = HashMap::new();
    let mut existing_providers: Vec<ExistingProviderEntry> = Vec::new();
    let mut existing_index: HashMap<i64, usize> = HashMap::new();
    let mut errors = Vec::new();

    for record in records {
        let Some(email) = record.email.as_deref() else {
            errors.push(RowError {
                row: record.row,
                email: None,
                kind: RowErrorKind::Validation,
                message: format!(
                    "Missing email for '{}'; rows are matched to the roster by email",
                    record.raw_name
                ),
            });
            continue;
        };

        match roster.lookup(email) {
            RosterMatch::None => {
                let idx = *new_index.entry(email.to_string()).or_insert_with(|| {
                    new_providers.push(NewProviderEntry {
                        email: email.to_string(),
                        name: record.clean_name.clone(),
                        links: Vec::new(),
                    });
                    new_providers.len() - 1
                });
                new_providers[idx].links.push(LinkCandidate::from(record));
            }
            RosterMatch::One(existing) => {
                let provider = &existing.provider;
                let idx = *existing_index.entry(provider.id).or_insert_with(|| {
                    existing_providers.push(ExistingProviderEntry {
                        id: provider.id,
                        email: email.to_string(),
                        name: provider.name.clone(),
                        existing_links: Vec::new(),
                        new_links: Vec::new(),
                    });
                    existing_providers.len() - 1
                });

                let candidate = LinkCandidate::from(record);
                let matched = existing.links.iter().find(|link| {
                    link.matches(
                        record.shift.as_deref(),
                        record.specialty.as_deref(),
                        record.unit.as_deref(),
                    )
                });

                let entry = &mut existing_providers[idx];
                match matched {
                    Some(link) => entry.existing_links.push(MatchedLink {
                        link: link.clone(),
                        candidate,
                    }),
                    None => entry.new_links.push(candidate),
                }
            }
            RosterMatch::Ambiguous(matches) => {
                let ids: Vec<String> = matches.iter().map(|m| m.provider.id.to_string()).collect();
                errors.push(RowError {
                    row: record.row,
                    email: Some(email.to_string()),
                    kind: RowErrorKind::AmbiguousMatch,
                    message: format!(
                        "Email {} matches {} providers in the roster (ids {})",
                        email,
                        matches.len(),
                        ids.join(", ")
                    ),
                });
            }
        }
    }

    let summary = summarize(&new_providers, &existing_providers, errors.len(), reference_month);

    debug!(
        new = summary.new_count,
        existing = summary.existing_count,
        links = summary.total_links,
        errors = summary.error_count,
        "Reconciled upload against roster of {}",
        roster.len()
    );

    ReconciliationPreview {
        new_providers,
        existing_providers,
        summary,
        errors,
    }
}

/// Derive the summary from the buckets so counts can never drift from them
fn summarize(
    new_providers: &[NewProviderEntry],
    existing_providers: &[ExistingProviderEntry],
    error_count: usize,
    reference_month: ReferenceMonth,
) -> PreviewSummary {
    let new_links: usize = new_providers.iter().map(|p| p.links.len()).sum();
    let existing_links: usize = existing_providers
        .iter()
        .map(|p| p.existing_links.len() + p.new_links.len())
        .sum();

    PreviewSummary {
        total_providers: new_providers.len() + existing_providers.len(),
        new_count: new_providers.len(),
        existing_count: existing_providers.len(),
        total_links: new_links + existing_links,
        error_count,
        reference_month,
    }
}

/// Normalize raw rows and reconcile them, carrying normalization errors into
/// the preview so a bad row never aborts the rest.
pub fn build_preview(
    rows: &[RawRow],
    roster: &Roster,
    reference_month: ReferenceMonth,
) -> ReconciliationPreview {
    let (records, mut errors) = normalize_all(rows);
    let mut preview = reconcile(&records, roster, reference_month);

    errors.append(&mut preview.errors);
    errors.sort_by_key(|e| e.row);
    preview.summary.error_count = errors.len();
    preview.errors = errors;
    preview
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use chrono::Utc;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::{ContractType, MonthlyValues, Provider, ProviderLink};
    use crate::normalize::normalize;

    fn march() -> ReferenceMonth {
        ReferenceMonth::new(3, 2025).unwrap()
    }

    fn raw(row: usize, name: &str, email: &str, shift: &str, net: Decimal) -> RawRow {
        RawRow {
            row,
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            shift: Some(shift.to_string()),
            specialty: Some("Clínica Geral".to_string()),
            unit: Some("Centro".to_string()),
            monthly_goal: None,
            values: MonthlyValues {
                net_value: net,
                ..Default::default()
            },
            issues: Vec::new(),
        }
    }

    fn record(row: usize, name: &str, email: &str, shift: &str) -> ProviderRecord {
        normalize(&raw(row, name, email, shift, Decimal::ZERO)).unwrap()
    }

    fn provider(id: i64, email: &str, name: &str, shifts: &[&str]) -> ProviderWithLinks {
        ProviderWithLinks {
            provider: Provider {
                id,
                email: email.to_string(),
                name: name.to_string(),
                contract_type: ContractType::Prestador,
                active: true,
                created_at: Utc::now(),
            },
            links: shifts
                .iter()
                .enumerate()
                .map(|(i, shift)| ProviderLink {
                    id: id * 100 + i as i64,
                    provider_id: id,
                    shift: Some(shift.to_string()),
                    specialty: Some("Clínica Geral".to_string()),
                    unit: Some("Centro".to_string()),
                    monthly_goal: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_empty_upload() {
        let preview = reconcile(&[], &Roster::default(), march());
        assert!(preview.new_providers.is_empty());
        assert!(preview.existing_providers.is_empty());
        assert_eq!(preview.summary.total_providers, 0);
        assert_eq!(preview.summary.total_links, 0);
    }

    #[test]
    fn test_new_provider_rows_merge_by_email() {
        let records = vec![
            record(2, "Ana (manhã)", "a@x.com", "Manhã"),
            record(3, "Ana (tarde)", "A@X.com", "Tarde"),
        ];
        let preview = reconcile(&records, &Roster::default(), march());

        assert_eq!(preview.new_providers.len(), 1);
        let entry = &preview.new_providers[0];
        assert_eq!(entry.email, "a@x.com");
        assert_eq!(entry.name, "Ana");
        assert_eq!(entry.links.len(), 2);
        assert_eq!(preview.summary.new_count, 1);
        assert_eq!(preview.summary.total_links, 2);
        assert_eq!(preview.summary.reference_month, march());
    }

    #[test]
    fn test_existing_provider_link_buckets() {
        let roster = Roster::new(vec![provider(7, "Bia@X.com", "Bia Souza", &["Manhã"])]);
        let records = vec![
            record(2, "Bia (manhã)", "bia@x.com", "Manhã"),
            record(3, "Bia (tarde)", "bia@x.com", "Tarde"),
        ];
        let preview = reconcile(&records, &roster, march());

        assert!(preview.new_providers.is_empty());
        assert_eq!(preview.existing_providers.len(), 1);
        let entry = &preview.existing_providers[0];
        assert_eq!(entry.id, 7);
        assert_eq!(entry.name, "Bia Souza");
        assert_eq!(entry.existing_links.len(), 1);
        assert_eq!(entry.existing_links[0].link.id, 700);
        assert_eq!(entry.new_links.len(), 1);
        assert_eq!(entry.new_links[0].shift.as_deref(), Some("Tarde"));
    }

    #[test]
    fn test_link_match_uses_full_tuple() {
        let roster = Roster::new(vec![provider(1, "c@x.com", "Caio", &["Noite"])]);
        let mut rec = record(2, "Caio", "c@x.com", "Noite");
        rec.unit = Some("Zona Sul".to_string());

        let preview = reconcile(&[rec], &roster, march());
        let entry = &preview.existing_providers[0];
        assert!(entry.existing_links.is_empty());
        assert_eq!(entry.new_links.len(), 1);
    }

    #[test]
    fn test_missing_email_is_rejected() {
        let mut rec = record(4, "Sem Email", "x@x.com", "Manhã");
        rec.email = None;
        let preview = reconcile(&[rec], &Roster::default(), march());

        assert!(preview.new_providers.is_empty());
        assert_eq!(preview.errors.len(), 1);
        assert_eq!(preview.errors[0].row, 4);
        assert_eq!(preview.errors[0].kind, RowErrorKind::Validation);
        assert_eq!(preview.summary.error_count, 1);
    }

    #[test]
    fn test_duplicate_roster_email_is_a_conflict() {
        let roster = Roster::new(vec![
            provider(1, "dup@x.com", "Dora", &[]),
            provider(2, "DUP@x.com", "Dora B", &[]),
        ]);
        let preview = reconcile(&[record(2, "Dora", "dup@x.com", "Manhã")], &roster, march());

        assert!(preview.new_providers.is_empty());
        assert!(preview.existing_providers.is_empty());
        assert_eq!(preview.errors.len(), 1);
        assert_eq!(preview.errors[0].kind, RowErrorKind::AmbiguousMatch);
    }

    #[test]
    fn test_partition_invariant() {
        let roster = Roster::new(vec![
            provider(1, "old@x.com", "Old", &["Manhã"]),
            provider(2, "other@x.com", "Other", &[]),
        ]);
        let records = vec![
            record(2, "Old", "old@x.com", "Manhã"),
            record(3, "New", "new@x.com", "Tarde"),
            record(4, "Old", "old@x.com", "Tarde"),
            record(5, "Other", "other@x.com", "Noite"),
            record(6, "New", "new@x.com", "Manhã"),
        ];
        let preview = reconcile(&records, &roster, march());

        let mut rows: Vec<usize> = preview
            .new_providers
            .iter()
            .flat_map(|p| p.links.iter().map(|l| l.row))
            .chain(preview.existing_providers.iter().flat_map(|p| {
                p.existing_links
                    .iter()
                    .map(|m| m.candidate.row)
                    .chain(p.new_links.iter().map(|l| l.row))
            }))
            .collect();
        rows.sort();
        assert_eq!(rows, vec![2, 3, 4, 5, 6]);

        let emails: HashSet<&str> = preview
            .new_providers
            .iter()
            .map(|p| p.email.as_str())
            .chain(preview.existing_providers.iter().map(|p| p.email.as_str()))
            .collect();
        assert_eq!(
            preview.summary.new_count + preview.summary.existing_count,
            emails.len()
        );
        assert_eq!(preview.summary.total_links, records.len());
    }

    #[test]
    fn test_build_preview_collects_normalization_errors() {
        let mut rows = vec![
            raw(2, "Ana (manhã)", "a@x.com", "Manhã", dec!(1000)),
            raw(3, "", "b@x.com", "Tarde", dec!(50)),
            raw(4, "Ana (tarde)", "a@x.com", "Tarde", dec!(1500)),
        ];
        rows[1].name = None;

        let preview = build_preview(&rows, &Roster::default(), march());
        assert_eq!(preview.summary.new_count, 1);
        assert_eq!(preview.summary.total_links, 2);
        assert_eq!(preview.summary.error_count, 1);
        assert_eq!(preview.errors[0].row, 3);
    }

    #[test]
    fn test_build_preview_reports_unreadable_amounts_per_row() {
        let mut rows = vec![
            raw(2, "Ana", "a@x.com", "Manhã", dec!(1000)),
            raw(3, "Bia", "b@x.com", "Tarde", Decimal::ZERO),
            raw(4, "Carla", "c@x.com", "Noite", dec!(700)),
        ];
        rows[1].issues.push("Unable to parse amount: mil reais".to_string());

        let preview = build_preview(&rows, &Roster::default(), march());
        assert_eq!(preview.summary.new_count, 2);
        assert_eq!(preview.summary.error_count, 1);
        assert_eq!(preview.errors[0].row, 3);
        assert_eq!(preview.errors[0].kind, RowErrorKind::Validation);
        assert_eq!(preview.errors[0].email.as_deref(), Some("b@x.com"));
        assert!(preview
            .new_providers
            .iter()
            .all(|p| p.email != "b@x.com"));
    }
}
