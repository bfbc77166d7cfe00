//! Totals calculator for report summary cards and exports

use crate::models::{per_month, ProviderGroup, TotalsSummary};

/// Compute grand totals over a (possibly grouped) list of provider groups.
///
/// Overall averages divide by the total number of months worked across all
/// groups, not by the number of groups: two providers with 3 and 1 months
/// summing to 300 and 100 average 100 per month, not 200.
pub fn compute_totals(groups: &[ProviderGroup]) -> TotalsSummary {
    let mut totals = TotalsSummary {
        provider_count: groups.len(),
        ..Default::default()
    };

    for group in groups {
        totals.total_paid += group.total_received();
        totals.total_billed += group.total_billed();
        totals.total_fixed_value += group.total_fixed();
        totals.total_professional_value += group.total_professional();
        totals.total_months_worked += group.total_months();
    }

    let months = totals.total_months_worked;
    totals.avg_paid_overall = per_month(totals.total_paid, months);
    totals.avg_billed_overall = per_month(totals.total_billed, months);
    totals.avg_fixed_overall = per_month(totals.total_fixed_value, months);
    totals.avg_professional_overall = per_month(totals.total_professional_value, months);

    totals
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::MonthlyFinancialEntry;

    fn group_with_months(id: i64, nets: &[Decimal]) -> ProviderGroup {
        ProviderGroup {
            ids: vec![id],
            email: Some(format!("p{}@x.com", id)),
            display_name: format!("Provider {}", id),
            specialty: None,
            shift_labels: BTreeSet::new(),
            monthly_entries: nets
                .iter()
                .enumerate()
                .map(|(i, net)| MonthlyFinancialEntry {
                    month: i as u32 + 1,
                    year: 2025,
                    net_value: *net,
                    clinic_value: net * dec!(2),
                    professional_value: net / dec!(2),
                    fixed_value: dec!(20),
                    shift_label: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_empty_input_is_all_zero() {
        let totals = compute_totals(&[]);
        assert_eq!(totals, TotalsSummary::default());
        assert_eq!(totals.avg_paid_overall, Decimal::ZERO);
    }

    #[test]
    fn test_overall_average_divides_by_months_not_providers() {
        let groups = vec![
            group_with_months(1, &[dec!(100), dec!(100), dec!(100)]),
            group_with_months(2, &[dec!(100)]),
        ];
        let totals = compute_totals(&groups);

        assert_eq!(totals.provider_count, 2);
        assert_eq!(totals.total_paid, dec!(400));
        assert_eq!(totals.total_months_worked, 4);
        assert_eq!(totals.avg_paid_overall, dec!(100));
        assert_ne!(totals.avg_paid_overall, totals.total_paid / Decimal::from(groups.len()));
    }

    #[test]
    fn test_totals_sum_every_component() {
        let groups = vec![
            group_with_months(1, &[dec!(300), dec!(100)]),
            group_with_months(2, &[dec!(200)]),
        ];
        let totals = compute_totals(&groups);

        assert_eq!(totals.total_paid, dec!(600));
        assert_eq!(totals.total_billed, dec!(1200));
        assert_eq!(totals.total_professional_value, dec!(300));
        assert_eq!(totals.total_fixed_value, dec!(60));
        assert_eq!(totals.avg_billed_overall, dec!(400));
        assert_eq!(totals.avg_fixed_overall, dec!(20));
        assert_eq!(totals.avg_professional_overall, dec!(100));
    }

    #[test]
    fn test_same_calendar_month_counts_per_provider() {
        // both providers worked January; each counts separately
        let groups = vec![group_with_months(1, &[dec!(50)]), group_with_months(2, &[dec!(150)])];
        let totals = compute_totals(&groups);
        assert_eq!(totals.total_months_worked, 2);
        assert_eq!(totals.avg_paid_overall, dec!(100));
    }

    #[test]
    fn test_groups_without_entries() {
        let groups = vec![group_with_months(1, &[])];
        let totals = compute_totals(&groups);
        assert_eq!(totals.provider_count, 1);
        assert_eq!(totals.total_months_worked, 0);
        assert_eq!(totals.avg_paid_overall, Decimal::ZERO);
    }
}
