//! Grouping aggregator for the custom report
//!
//! Shifts are kept distinct by default. When grouping by email, every shift
//! record of a provider is folded into one `ProviderGroup` whose monthly
//! entries are merged per (month, year).

use std::collections::HashMap;

use crate::models::{MonthlyFinancialEntry, ProviderGroup};
use crate::normalize::normalize_email;

/// Group provider records.
///
/// With `by_email == false` the input is returned unchanged. Otherwise groups
/// sharing an email are merged: the first-seen display name and specialty
/// win, ids and shift labels are unioned, and monthly entries for the same
/// period are summed field by field. Output follows the first-seen order of
/// emails. Groups without an email are never merged with anything.
///
/// Grouping is idempotent: grouping an already grouped list is a no-op.
pub fn group_providers(groups: Vec<ProviderGroup>, by_email: bool) -> Vec<ProviderGroup> {
    if !by_email {
        return groups;
    }

    let mut out: Vec<ProviderGroup> = Vec::with_capacity(groups.len());
    let mut index: HashMap<String, usize> = HashMap::new();

    for group in groups {
        let key = group.email.as_deref().and_then(normalize_email);

        let target = match key {
            Some(key) => match index.get(&key) {
                Some(&idx) => idx,
                None => {
                    index.insert(key, out.len());
                    out.push(empty_like(&group));
                    out.len() - 1
                }
            },
            None => {
                out.push(empty_like(&group));
                out.len() - 1
            }
        };

        absorb(&mut out[target], group);
    }

    out
}

/// A group with the identity fields of `group` and nothing merged into it yet
fn empty_like(group: &ProviderGroup) -> ProviderGroup {
    ProviderGroup {
        ids: Vec::new(),
        email: group.email.clone(),
        display_name: group.display_name.clone(),
        specialty: group.specialty.clone(),
        shift_labels: Default::default(),
        monthly_entries: Vec::new(),
    }
}

fn absorb(target: &mut ProviderGroup, source: ProviderGroup) {
    for id in source.ids {
        if !target.ids.contains(&id) {
            target.ids.push(id);
        }
    }
    if target.specialty.is_none() {
        target.specialty = source.specialty;
    }
    target.shift_labels.extend(source.shift_labels);
    for entry in source.monthly_entries {
        merge_entry(&mut target.monthly_entries, entry);
    }
}

/// Merge an entry into a list keeping at most one entry per (month, year)
pub fn merge_entry(entries: &mut Vec<MonthlyFinancialEntry>, entry: MonthlyFinancialEntry) {
    match entries.iter_mut().find(|e| e.same_period(&entry)) {
        Some(existing) => {
            existing.net_value += entry.net_value;
            existing.clinic_value += entry.clinic_value;
            existing.professional_value += entry.professional_value;
            existing.fixed_value += entry.fixed_value;
            existing.shift_label =
                join_labels(existing.shift_label.as_deref(), entry.shift_label.as_deref());
        }
        None => entries.push(entry),
    }
}

/// Union two comma-joined label lists, preserving first-seen order
fn join_labels(a: Option<&str>, b: Option<&str>) -> Option<String> {
    let mut labels: Vec<&str> = Vec::new();
    for label in a
        .into_iter()
        .chain(b)
        .flat_map(|s| s.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        if !labels.contains(&label) {
            labels.push(label);
        }
    }

    if labels.is_empty() {
        None
    } else {
        Some(labels.join(", "))
    }
}
