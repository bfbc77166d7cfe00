//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::io::Write;

use rust_decimal_macros::dec;
use tempfile::NamedTempFile;
use zorah_core::db::Database;

use crate::commands::{self, brl, truncate};

const MARCH_SHEET: &str = r#"Nome,E-mail,Especialidade,Turno,Valor Líquido (R$),Valor Clínica (R$)
Ana (Manhã),a@x.com,Pediatria,Manhã,"1.000,00","2.000,00"
Ana (Tarde),A@X.COM,Pediatria,Tarde,"1.500,00","3.000,00"
Bia,b@x.com,Clínica Geral,Manhã,"800,00","1.600,00"
"#;

fn setup_test_db() -> Database {
    Database::in_memory().unwrap()
}

fn sheet_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

// ========== Helper Tests ==========

#[test]
fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("a longer provider name", 10), "a longe...");
    // Multi-byte names are cut on char boundaries
    assert_eq!(truncate("Conceição Araújo", 8), "Conce...");
}

#[test]
fn test_brl() {
    assert_eq!(brl(dec!(1500)), "R$ 1500.00");
    assert_eq!(brl(dec!(0.5)), "R$ 0.50");
    assert_eq!(brl(dec!(0.005)), "R$ 0.01");
}

// ========== Period Tests ==========

#[test]
fn test_resolve_period_single_month() {
    let period = commands::resolve_period("2025-03", None).unwrap();
    assert_eq!(period.from, period.to);
    assert_eq!(period.from.month, 3);
    assert_eq!(period.from.year, 2025);
}

#[test]
fn test_resolve_period_range() {
    let period = commands::resolve_period("2025-01", Some("03/2025")).unwrap();
    assert_eq!(period.from.month, 1);
    assert_eq!(period.to.month, 3);
}

#[test]
fn test_resolve_period_rejects_inverted_range() {
    assert!(commands::resolve_period("2025-04", Some("2025-03")).is_err());
}

#[test]
fn test_resolve_period_rejects_garbage() {
    assert!(commands::resolve_period("march", None).is_err());
    assert!(commands::resolve_period("2025-13", None).is_err());
}

// ========== Upload Command Tests ==========

#[test]
fn test_load_preview_does_not_write() {
    let db = setup_test_db();
    let file = sheet_file(MARCH_SHEET);

    let (preview, fingerprint) = commands::load_preview(&db, file.path(), 3, 2025).unwrap();

    assert_eq!(preview.summary.new_count, 2);
    assert_eq!(preview.summary.existing_count, 0);
    assert!(!fingerprint.is_empty());
    assert!(db.list_providers().unwrap().is_empty());
}

#[test]
fn test_load_preview_rejects_bad_month() {
    let db = setup_test_db();
    let file = sheet_file(MARCH_SHEET);

    assert!(commands::load_preview(&db, file.path(), 13, 2025).is_err());
}

#[test]
fn test_load_preview_missing_file() {
    let db = setup_test_db();
    let result = commands::load_preview(&db, std::path::Path::new("/nonexistent/sheet.csv"), 3, 2025);
    assert!(result.is_err());
}

#[test]
fn test_cmd_preview_json() {
    let db = setup_test_db();
    let file = sheet_file(MARCH_SHEET);

    assert!(commands::cmd_preview(&db, file.path(), 3, 2025, true).is_ok());
    assert!(commands::cmd_preview(&db, file.path(), 3, 2025, false).is_ok());
}

#[test]
fn test_cmd_commit_creates_roster() {
    let db = setup_test_db();
    let file = sheet_file(MARCH_SHEET);

    let result = commands::cmd_commit(&db, file.path(), 3, 2025).unwrap();
    assert_eq!(result.providers_created, 2);
    assert_eq!(result.links_created, 3);
    assert_eq!(result.entries_recorded, 3);

    let providers = db.list_providers().unwrap();
    assert_eq!(providers.len(), 2);

    let audit = db.list_audit_log(10).unwrap();
    assert!(audit
        .iter()
        .any(|e| e.action == "upload_commit" && e.user_email == "cli"));
}

#[test]
fn test_cmd_commit_twice_is_rejected() {
    let db = setup_test_db();
    let file = sheet_file(MARCH_SHEET);

    commands::cmd_commit(&db, file.path(), 3, 2025).unwrap();
    let err = commands::cmd_commit(&db, file.path(), 3, 2025).unwrap_err();
    assert!(err.to_string().contains("Upload rejected"));

    // The preview now sees everyone as existing
    let (preview, _) = commands::load_preview(&db, file.path(), 3, 2025).unwrap();
    assert_eq!(preview.summary.new_count, 0);
    assert_eq!(preview.summary.existing_count, 2);
}

// ========== Provider Command Tests ==========

#[test]
fn test_cmd_providers() {
    let db = setup_test_db();
    assert!(commands::cmd_providers_list(&db).is_ok());

    let file = sheet_file(MARCH_SHEET);
    commands::cmd_commit(&db, file.path(), 3, 2025).unwrap();

    assert!(commands::cmd_providers_list(&db).is_ok());
    let id = db.list_providers().unwrap()[0].id;
    assert!(commands::cmd_provider_show(&db, id).is_ok());
}

#[test]
fn test_cmd_provider_show_not_found() {
    let db = setup_test_db();
    assert!(commands::cmd_provider_show(&db, 99999).is_err());
}

// ========== Report Command Tests ==========

#[test]
fn test_build_report_keeps_shifts_apart() {
    let db = setup_test_db();
    let file = sheet_file(MARCH_SHEET);
    commands::cmd_commit(&db, file.path(), 3, 2025).unwrap();

    let period = commands::resolve_period("2025-03", None).unwrap();
    let (groups, totals) = commands::build_report(&db, &period, false, None).unwrap();

    assert_eq!(groups.len(), 3);
    assert_eq!(totals.provider_count, 3);
    assert_eq!(totals.total_paid, dec!(3300));
}

#[test]
fn test_build_report_grouped_by_email() {
    let db = setup_test_db();
    let file = sheet_file(MARCH_SHEET);
    commands::cmd_commit(&db, file.path(), 3, 2025).unwrap();

    let period = commands::resolve_period("2025-03", None).unwrap();
    let (groups, totals) = commands::build_report(&db, &period, true, None).unwrap();

    assert_eq!(groups.len(), 2);
    assert_eq!(totals.provider_count, 2);
    assert_eq!(totals.total_paid, dec!(3300));

    let ana = groups.iter().find(|g| g.email.as_deref() == Some("a@x.com")).unwrap();
    assert_eq!(ana.shift_labels.len(), 2);
    assert_eq!(ana.total_received(), dec!(2500));
}

#[test]
fn test_build_report_email_filter() {
    let db = setup_test_db();
    let file = sheet_file(MARCH_SHEET);
    commands::cmd_commit(&db, file.path(), 3, 2025).unwrap();

    let period = commands::resolve_period("2025-03", None).unwrap();
    let (groups, totals) = commands::build_report(&db, &period, true, Some("B@X.com")).unwrap();

    assert_eq!(groups.len(), 1);
    assert_eq!(totals.total_paid, dec!(800));
}

#[test]
fn test_cmd_report_empty_period() {
    let db = setup_test_db();
    let period = commands::resolve_period("2024-01", Some("2024-12")).unwrap();
    assert!(commands::cmd_report(&db, &period, false, None, None).is_ok());
}

#[test]
fn test_cmd_report_csv_export() {
    let db = setup_test_db();
    let file = sheet_file(MARCH_SHEET);
    commands::cmd_commit(&db, file.path(), 3, 2025).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let out = dir.path().join("report.csv");
    let period = commands::resolve_period("2025-03", None).unwrap();

    commands::cmd_report(&db, &period, true, None, Some(out.as_path())).unwrap();

    let csv = std::fs::read_to_string(&out).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    // Header, two providers, TOTAL
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("name,email"));
    assert!(lines[3].starts_with("TOTAL"));
}

// ========== Audit / Init Tests ==========

#[test]
fn test_cmd_audit() {
    let db = setup_test_db();
    assert!(commands::cmd_audit(&db, 20).is_ok());

    db.log_audit("master@clinic", "report", Some("custom_report"), None, Some("from=03/2025"))
        .unwrap();
    assert!(commands::cmd_audit(&db, 20).is_ok());
}

#[test]
fn test_cmd_init_unencrypted() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("zorah.db");

    commands::cmd_init(&path, true).unwrap();
    assert!(path.exists());

    // Reopening sees the same (empty) roster
    let db = commands::open_db(&path, true).unwrap();
    assert!(db.list_providers().unwrap().is_empty());
    assert!(!db.is_encrypted().unwrap());
}
