//! Database tests

use super::*;
use crate::models::*;
use crate::reconcile::build_preview;

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::reconcile::RosterMatch;

    fn march() -> ReferenceMonth {
        ReferenceMonth::new(3, 2025).unwrap()
    }

    fn row(n: usize, name: &str, email: &str, shift: &str, net: Decimal) -> RawRow {
        RawRow {
            row: n,
            name: Some(name.to_string()),
            email: Some(email.to_string()),
            specialty: Some("Pediatria".to_string()),
            shift: Some(shift.to_string()),
            values: MonthlyValues {
                net_value: net,
                clinic_value: net * dec!(2),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    fn preview(db: &Database, rows: &[RawRow], month: ReferenceMonth) -> ReconciliationPreview {
        let roster = db.load_roster().unwrap();
        build_preview(rows, &roster, month)
    }

    #[test]
    fn test_in_memory_db() {
        let db = Database::in_memory().unwrap();
        assert!(db.list_providers().unwrap().is_empty());
        assert_eq!(db.load_roster().unwrap().len(), 0);
        assert!(!db.is_encrypted().unwrap());
    }

    #[test]
    fn test_provider_crud() {
        let db = Database::in_memory().unwrap();

        let id = db
            .insert_provider("  Ana@X.com ", "Ana", ContractType::Prestador)
            .unwrap();
        assert!(id > 0);

        let provider = db.get_provider(id).unwrap().unwrap();
        assert_eq!(provider.email, "ana@x.com");
        assert_eq!(provider.name, "Ana");
        assert!(provider.active);

        assert_eq!(db.find_providers_by_email("ANA@x.com").unwrap().len(), 1);
        assert!(db.get_provider(999).unwrap().is_none());

        db.set_provider_active(id, false).unwrap();
        assert!(!db.get_provider(id).unwrap().unwrap().active);
        assert!(matches!(
            db.set_provider_active(999, false),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_insert_provider_requires_email() {
        let db = Database::in_memory().unwrap();
        let result = db.insert_provider("  ", "Ana", ContractType::Clt);
        assert!(matches!(result, Err(Error::InvalidData(_))));
    }

    #[test]
    fn test_add_provider_link_is_idempotent() {
        let db = Database::in_memory().unwrap();
        let id = db
            .insert_provider("a@x.com", "Ana", ContractType::Prestador)
            .unwrap();

        let link = db
            .add_provider_link(id, Some("Manhã"), Some("Pediatria"), None, None)
            .unwrap();
        let again = db
            .add_provider_link(id, Some("Manhã"), Some("Pediatria"), None, Some(dec!(20)))
            .unwrap();
        assert_eq!(link, again);

        let links = db.list_provider_links(id).unwrap();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].monthly_goal, Some(dec!(20)));

        let other = db
            .add_provider_link(id, Some("Tarde"), Some("Pediatria"), None, None)
            .unwrap();
        assert_ne!(link, other);

        let result = db.add_provider_link(999, Some("Manhã"), None, None, None);
        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[test]
    fn test_load_roster() {
        let db = Database::in_memory().unwrap();
        let id = db
            .insert_provider("a@x.com", "Ana", ContractType::Prestador)
            .unwrap();
        db.add_provider_link(id, Some("Manhã"), Some("Pediatria"), None, None)
            .unwrap();
        db.insert_provider("b@x.com", "Bia", ContractType::Clt)
            .unwrap();

        let roster = db.load_roster().unwrap();
        assert_eq!(roster.len(), 2);
        match roster.lookup("a@x.com") {
            RosterMatch::One(ana) => {
                assert_eq!(ana.provider.id, id);
                assert_eq!(ana.links.len(), 1);
            }
            _ => panic!("expected a single match for a@x.com"),
        }
    }

    #[test]
    fn test_commit_creates_providers_links_and_entries() {
        let db = Database::in_memory().unwrap();
        let rows = vec![
            row(2, "Ana (Manhã)", "a@x.com", "Manhã", dec!(1000)),
            row(3, "Ana (Tarde)", "a@x.com", "Tarde", dec!(1500)),
            row(4, "Bia", "b@x.com", "Manhã", dec!(800)),
        ];
        let preview = preview(&db, &rows, march());
        assert_eq!(preview.summary.new_count, 2);

        let result = db.commit_preview(&preview, "fp-1", "master@zorah").unwrap();
        assert_eq!(result.providers_created, 2);
        assert_eq!(result.links_created, 3);
        assert_eq!(result.entries_recorded, 3);

        let providers = db.list_providers().unwrap();
        assert_eq!(providers.len(), 2);
        assert_eq!(providers[0].name, "Ana");

        let links = db.list_provider_links(providers[0].id).unwrap();
        assert_eq!(links.len(), 2);
        let entries = db.list_monthly_entries(links[0].id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].net_value, dec!(1000));
        assert_eq!(entries[0].clinic_value, dec!(2000));

        let batches = db.list_upload_batches(10).unwrap();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].reference_month, march());
        assert_eq!(batches[0].entries_recorded, 3);
        assert!(db.is_upload_committed("fp-1").unwrap());
    }

    #[test]
    fn test_recommit_same_fingerprint_conflicts() {
        let db = Database::in_memory().unwrap();
        let rows = vec![row(2, "Ana", "a@x.com", "Manhã", dec!(1000))];
        let preview = preview(&db, &rows, march());

        db.commit_preview(&preview, "fp-1", "master@zorah").unwrap();
        let second = db.commit_preview(&preview, "fp-1", "master@zorah");
        assert!(matches!(second, Err(Error::Conflict(_))));

        // the failed commit left nothing behind
        assert_eq!(db.list_providers().unwrap().len(), 1);
        assert_eq!(db.list_upload_batches(10).unwrap().len(), 1);
    }

    #[test]
    fn test_stale_preview_conflicts() {
        let db = Database::in_memory().unwrap();
        let rows = vec![row(2, "Ana", "a@x.com", "Manhã", dec!(1000))];
        let stale = preview(&db, &rows, march());

        db.insert_provider("a@x.com", "Ana", ContractType::Prestador)
            .unwrap();

        let result = db.commit_preview(&stale, "fp-1", "master@zorah");
        assert!(matches!(result, Err(Error::Conflict(_))));
        assert!(!db.is_upload_committed("fp-1").unwrap());
    }

    #[test]
    fn test_repreview_after_commit_matches_existing_links() {
        let db = Database::in_memory().unwrap();
        let rows = vec![
            row(2, "Ana", "a@x.com", "Manhã", dec!(1000)),
            row(3, "Ana", "a@x.com", "Tarde", dec!(1500)),
        ];
        let first = preview(&db, &rows, march());
        db.commit_preview(&first, "fp-1", "master@zorah").unwrap();

        let april = ReferenceMonth::new(4, 2025).unwrap();
        let rows = vec![
            row(2, "Ana", "A@X.com", "Manhã", dec!(1100)),
            row(3, "Ana", "a@x.com", "Noite", dec!(300)),
        ];
        let second = preview(&db, &rows, april);
        assert_eq!(second.summary.new_count, 0);
        assert_eq!(second.summary.existing_count, 1);

        let existing = &second.existing_providers[0];
        assert_eq!(existing.existing_links.len(), 1);
        assert_eq!(existing.new_links.len(), 1);

        let result = db.commit_preview(&second, "fp-2", "master@zorah").unwrap();
        assert_eq!(result.providers_created, 0);
        assert_eq!(result.links_created, 1);
        assert_eq!(result.entries_recorded, 2);

        let links = db.list_provider_links(existing.id).unwrap();
        assert_eq!(links.len(), 3);
    }

    #[test]
    fn test_commit_skips_zero_values() {
        let db = Database::in_memory().unwrap();
        let rows = vec![row(2, "Ana", "a@x.com", "Manhã", Decimal::ZERO)];
        let preview = preview(&db, &rows, march());

        let result = db.commit_preview(&preview, "fp-1", "master@zorah").unwrap();
        assert_eq!(result.links_created, 1);
        assert_eq!(result.entries_recorded, 0);
    }

    #[test]
    fn test_zero_correction_replaces_earlier_upload() {
        let db = Database::in_memory().unwrap();
        let rows = vec![row(2, "Ana", "a@x.com", "Manhã", dec!(500))];
        let first = preview(&db, &rows, march());
        db.commit_preview(&first, "fp-1", "master@zorah").unwrap();

        let rows = vec![row(2, "Ana", "a@x.com", "Manhã", Decimal::ZERO)];
        let corrected = preview(&db, &rows, march());
        let result = db
            .commit_preview(&corrected, "fp-2", "master@zorah")
            .unwrap();
        assert_eq!(result.entries_recorded, 1);

        let provider = &db.list_providers().unwrap()[0];
        let links = db.list_provider_links(provider.id).unwrap();
        let entries = db.list_monthly_entries(links[0].id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].net_value, Decimal::ZERO);
        assert_eq!(entries[0].clinic_value, Decimal::ZERO);
    }

    #[test]
    fn test_cents_are_summed_exactly() {
        let db = Database::in_memory().unwrap();
        let rows = vec![
            row(2, "Ana", "a@x.com", "Manhã", dec!(0.1)),
            row(3, "Ana", "a@x.com", "Manhã", dec!(0.2)),
        ];
        let preview = preview(&db, &rows, march());
        db.commit_preview(&preview, "fp-1", "master@zorah").unwrap();

        let provider = &db.list_providers().unwrap()[0];
        let links = db.list_provider_links(provider.id).unwrap();
        let entries = db.list_monthly_entries(links[0].id).unwrap();
        assert_eq!(entries[0].net_value, dec!(0.3));
        assert_eq!(entries[0].net_value.to_string(), "0.3");
    }

    #[test]
    fn test_same_batch_rows_for_one_link_are_summed() {
        let db = Database::in_memory().unwrap();
        let rows = vec![
            row(2, "Ana", "a@x.com", "Manhã", dec!(1000)),
            row(3, "Ana", "a@x.com", "Manhã", dec!(250)),
        ];
        let preview = preview(&db, &rows, march());
        db.commit_preview(&preview, "fp-1", "master@zorah").unwrap();

        let provider = &db.list_providers().unwrap()[0];
        let links = db.list_provider_links(provider.id).unwrap();
        assert_eq!(links.len(), 1);
        let entries = db.list_monthly_entries(links[0].id).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].net_value, dec!(1250));
    }

    #[test]
    fn test_upsert_monthly_entry_replaces_values() {
        let db = Database::in_memory().unwrap();
        let id = db
            .insert_provider("a@x.com", "Ana", ContractType::Prestador)
            .unwrap();
        let link = db
            .add_provider_link(id, Some("Manhã"), None, None, None)
            .unwrap();

        let mut entry = MonthlyFinancialEntry::new(
            3,
            2025,
            MonthlyValues {
                net_value: dec!(100),
                ..Default::default()
            },
            None,
        );
        db.upsert_monthly_entry(link, &entry).unwrap();
        entry.net_value = dec!(40);
        db.upsert_monthly_entry(link, &entry).unwrap();

        let entries = db.list_monthly_entries(link).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].net_value, dec!(40));
        assert_eq!(entries[0].shift_label.as_deref(), Some("Manhã"));

        entry.month = 13;
        assert!(matches!(
            db.upsert_monthly_entry(link, &entry),
            Err(Error::InvalidData(_))
        ));
        entry.month = 3;
        assert!(matches!(
            db.upsert_monthly_entry(999, &entry),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_load_report_groups_filters_period_and_email() {
        let db = Database::in_memory().unwrap();
        let rows = vec![
            row(2, "Ana", "a@x.com", "Manhã", dec!(1000)),
            row(3, "Ana", "a@x.com", "Tarde", dec!(1500)),
            row(4, "Bia", "b@x.com", "Manhã", dec!(800)),
        ];
        let p = preview(&db, &rows, march());
        db.commit_preview(&p, "fp-1", "master@zorah").unwrap();

        let april = ReferenceMonth::new(4, 2025).unwrap();
        let rows = vec![row(2, "Ana", "a@x.com", "Manhã", dec!(900))];
        let p = preview(&db, &rows, april);
        db.commit_preview(&p, "fp-2", "master@zorah").unwrap();

        let period = ReportPeriod::new(march(), april).unwrap();
        let groups = db.load_report_groups(&period, None).unwrap();
        assert_eq!(groups.len(), 3);
        assert!(groups.iter().all(|g| g.ids.len() == 1));

        let manha = &groups[0];
        assert_eq!(manha.display_name, "Ana");
        assert_eq!(manha.monthly_entries.len(), 2);
        assert_eq!(manha.total_received(), dec!(1900));
        assert!(manha.shift_labels.contains("Manhã"));

        let only_march = db
            .load_report_groups(&ReportPeriod::single(march()), None)
            .unwrap();
        assert_eq!(only_march.len(), 3);
        assert!(only_march.iter().all(|g| g.monthly_entries.len() == 1));

        let bia = db.load_report_groups(&period, Some("B@X.COM")).unwrap();
        assert_eq!(bia.len(), 1);
        assert_eq!(bia[0].email.as_deref(), Some("b@x.com"));

        let later = ReportPeriod::single(ReferenceMonth::new(5, 2025).unwrap());
        assert!(db.load_report_groups(&later, None).unwrap().is_empty());
    }

    #[test]
    fn test_audit_log() {
        let db = Database::in_memory().unwrap();
        db.log_audit("master@zorah", "upload_preview", None, None, Some("fp-1"))
            .unwrap();
        db.log_audit("master@zorah", "upload_commit", Some("upload_batch"), Some(1), None)
            .unwrap();

        assert_eq!(db.count_audit_log().unwrap(), 2);
        let entries = db.list_audit_log(10).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "upload_commit");
        assert_eq!(entries[0].entity_id, Some(1));
        assert_eq!(db.list_audit_log(1).unwrap().len(), 1);
    }

    #[test]
    fn test_schema_tables_exist() {
        let db = Database::in_memory().unwrap();
        let conn = db.conn().unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('providers', 'provider_links', 'upload_batches', 'monthly_entries', 'audit_log')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 5);
    }
}
