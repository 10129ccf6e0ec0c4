use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn agro(db: &Path) -> Command {
    let mut cmd = Command::cargo_bin("agro").unwrap();
    cmd.env_remove("AGRO_DB");
    cmd.arg("--db").arg(db);
    cmd
}

fn setup() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("farm.db");
    agro(&db)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded demonstration data"));
    (temp_dir, db)
}

#[test]
fn test_init_is_idempotent() {
    let (_temp, db) = setup();

    agro(&db)
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Existing data kept"));

    agro(&db)
        .args(["check", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("001234"))
        .stdout(predicate::str::contains("003456"));
}

#[test]
fn test_dashboard() {
    let (_temp, db) = setup();

    agro(&db)
        .arg("dashboard")
        .assert()
        .success()
        .stdout(predicate::str::contains("Checks due within 7 days: 1"))
        .stdout(predicate::str::contains("Providers:          3"))
        .stdout(predicate::str::contains("330.00 ha"));

    agro(&db)
        .args(["dashboard", "--days", "30"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Checks due within 30 days: 3"));
}

#[test]
fn test_check_cannot_be_paid_twice() {
    let (_temp, db) = setup();

    agro(&db)
        .args(["check", "pay", "1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Check #1 marked as paid"));

    agro(&db)
        .args(["check", "pay", "1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already paid"));

    agro(&db)
        .args(["check", "delete", "1"])
        .assert()
        .failure();

    agro(&db)
        .args(["check", "list", "--pending"])
        .assert()
        .success()
        .stdout(predicate::str::contains("001234").not());
}

#[test]
fn test_invalid_input_is_rejected() {
    let (_temp, db) = setup();

    agro(&db)
        .args(["expense", "add", "agro", "Seed", "lots"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("amount must be a number"));

    agro(&db)
        .args(["expense", "add", "crops", "Seed", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("category must be one of"));

    agro(&db)
        .args(["income", "add", "agro", "  ", "100"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("concept is required"));

    agro(&db)
        .args(["margin", "calc", "Soja", "0", "100", "200"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("quantity"));
}

#[test]
fn test_margin_commands() {
    let (_temp, db) = setup();

    agro(&db)
        .args(["margin", "summary"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$4,600,000.00"))
        .stdout(predicate::str::contains("$1,370,000.00"))
        .stdout(predicate::str::contains("$3,230,000.00"));

    agro(&db)
        .args(["margin", "calc", "Soja", "100", "30000", "45000"])
        .assert()
        .success()
        .stdout(predicate::str::contains("$15,000.00"))
        .stdout(predicate::str::contains("Per unit: $150.00"));

    agro(&db)
        .args(["margin", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("custom"));
}

#[test]
fn test_orphaned_invoices() {
    let (_temp, db) = setup();

    agro(&db)
        .args(["invoice", "add", "A-1", "1000", "--provider", "99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Provider #99 does not exist"));

    agro(&db)
        .args(["invoice", "add", "A-1", "1000", "--provider", "1"])
        .assert()
        .success();

    agro(&db)
        .args(["provider", "delete", "1"])
        .assert()
        .success();

    agro(&db)
        .args(["invoice", "orphans"])
        .assert()
        .success()
        .stdout(predicate::str::contains("A-1"));
}

#[test]
fn test_purge_requires_confirmation() {
    let (_temp, db) = setup();
    agro(&db)
        .args(["expense", "add", "agro", "Old seed", "100", "--date", "2001-01-01"])
        .assert()
        .success();

    agro(&db)
        .args(["purge", "--days", "365"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Nothing deleted"));

    agro(&db)
        .args(["expense", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Old seed"));

    agro(&db)
        .args(["purge", "--days", "365", "--yes"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Expenses:      1"));

    agro(&db)
        .args(["expense", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Old seed").not());
}

#[test]
fn test_export_backup_report() {
    let (temp, db) = setup();
    let exports = temp.path().join("exports");
    let backups = temp.path().join("backups");
    let reports = temp.path().join("reports");

    agro(&db)
        .arg("export")
        .arg("--dir")
        .arg(&exports)
        .assert()
        .success()
        .stdout(predicate::str::contains("Exported 6 tables"));
    assert_eq!(fs::read_dir(&exports).unwrap().count(), 6);

    agro(&db)
        .arg("backup")
        .arg("--dir")
        .arg(&backups)
        .assert()
        .success()
        .stdout(predicate::str::contains("agroledger_backup_"));
    assert_eq!(fs::read_dir(&backups).unwrap().count(), 1);

    agro(&db)
        .arg("report")
        .arg("--dir")
        .arg(&reports)
        .assert()
        .success()
        .stdout(predicate::str::contains("FINANCIAL REPORT"))
        .stdout(predicate::str::contains("Profitability"));
    assert_eq!(fs::read_dir(&reports).unwrap().count(), 1);
}

#[test]
fn test_quote_failure_is_not_fatal() {
    let (_temp, db) = setup();

    agro(&db)
        .args([
            "quote",
            "--url",
            "http://127.0.0.1:9/quote",
            "--timeout-secs",
            "1",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Could not fetch dollar quote"))
        .stdout(predicate::str::contains("No previous quote available"))
        .stdout(predicate::str::contains("Reference prices"));
}

#[test]
fn test_config_round_trip() {
    let (_temp, db) = setup();

    agro(&db)
        .args(["config", "get", "due_horizon_days"])
        .assert()
        .success()
        .stdout(predicate::str::contains("7"));

    agro(&db)
        .args(["config", "set", "due_horizon_days", "15"])
        .assert()
        .success();

    agro(&db)
        .arg("dashboard")
        .assert()
        .success()
        .stdout(predicate::str::contains("Checks due within 15 days: 2"));

    agro(&db)
        .args(["config", "set", "last_quote", "{}"])
        .assert()
        .failure();
}

#[test]
fn test_unopenable_database_is_fatal() {
    let temp_dir = TempDir::new().unwrap();
    let db = temp_dir.path().join("missing").join("farm.db");

    agro(&db)
        .arg("dashboard")
        .assert()
        .failure()
        .stderr(predicate::str::contains("cannot open database"));
}
