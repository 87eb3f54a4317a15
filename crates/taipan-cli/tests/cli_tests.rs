use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const FIELDS: &str = "\
id ra dec
1 10.0 -30.0
2 13.0 -30.0
3 90.0 10.0
";

const SCIENCE: &str = "\
target_id ra dec pm_ra pm_dec mag priority difficulty is_h0_target is_vpec_target is_lowz_target
101 10.1 -30.0 0.0 0.0 17.0 3 1 1 0 0
102 90.1 10.0 0.0 0.0 nan 6 1 0 1 0
";

/// Helper function to create a Command with --no-color and a database in
/// the given directory
fn taipan_cmd(temp_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("taipan").expect("Failed to find taipan binary");
    cmd.env("XDG_CONFIG_HOME", temp_dir.path())
        .arg("--no-color")
        .arg("--database-file")
        .arg(temp_dir.path().join("cli_test.db"));
    cmd
}

/// Helper function to create a database with fields and science targets loaded
fn loaded_environment() -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let fields = temp_dir.path().join("fields.txt");
    let science = temp_dir.path().join("science.txt");
    fs::write(&fields, FIELDS).expect("Failed to write fields");
    fs::write(&science, SCIENCE).expect("Failed to write science");

    taipan_cmd(&temp_dir)
        .arg("ingest")
        .arg("fields")
        .arg(&fields)
        .assert()
        .success()
        .stdout(predicate::str::contains("3 rows read, 3 inserted"));
    taipan_cmd(&temp_dir)
        .arg("ingest")
        .arg("science-v2")
        .arg(&science)
        .assert()
        .success();
    temp_dir
}

#[test]
fn test_cli_migrate_reports_current_version() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");

    taipan_cmd(&temp_dir)
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date at version 0.0.3"));
}

#[test]
fn test_cli_version_lists_migrations() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");

    taipan_cmd(&temp_dir)
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.0.1"))
        .stdout(predicate::str::contains("0.0.3"));
}

#[test]
fn test_cli_formats() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");

    taipan_cmd(&temp_dir)
        .arg("formats")
        .assert()
        .success()
        .stdout(predicate::str::contains("`science-v2`"))
        .stdout(predicate::str::contains("`guides`"));
}

#[test]
fn test_cli_summary_is_default_command() {
    let temp_dir = loaded_environment();

    taipan_cmd(&temp_dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("Fields: 3 (3 active)"))
        .stdout(predicate::str::contains("Science targets: 2 (0 done)"));
}

#[test]
fn test_cli_positions_and_reconcile() {
    let temp_dir = loaded_environment();

    taipan_cmd(&temp_dir)
        .arg("positions")
        .assert()
        .success()
        .stdout(predicate::str::contains("in 3 fields"));

    taipan_cmd(&temp_dir)
        .args(["reconcile", "--fields", "1", "--no-expand"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Reconciled 1 fields from 1 requested fields"));
}

#[test]
fn test_cli_reconcile_unknown_field_fails() {
    let temp_dir = loaded_environment();

    taipan_cmd(&temp_dir)
        .args(["reconcile", "--fields", "1,99"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Field IDs not present in the database: [99]"));
}

#[test]
fn test_cli_reconcile_unobserved_only_without_tiles() {
    let temp_dir = loaded_environment();

    taipan_cmd(&temp_dir)
        .args(["reconcile", "--unobserved-only"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No unqueued, unobserved tiles"));
}

#[test]
fn test_cli_field_activation() {
    let temp_dir = loaded_environment();

    taipan_cmd(&temp_dir)
        .args(["fields", "deactivate", "2", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Success: Deactivated 2 of 2 fields"));

    taipan_cmd(&temp_dir)
        .args(["fields", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Field 3 at (90.0000, 10.0000) (inactive)"));

    taipan_cmd(&temp_dir)
        .args(["fields", "list", "--active"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Field 1").and(predicate::str::contains("Field 2").not()));
}

#[test]
fn test_cli_activation_reports_missing_fields() {
    let temp_dir = loaded_environment();

    taipan_cmd(&temp_dir)
        .args(["fields", "activate", "1", "1", "42"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "Error: Activated 1 of 2 fields; 1 IDs not found",
        ));
}

#[test]
fn test_cli_ingest_unknown_format_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let path = temp_dir.path().join("targets.fits");
    fs::write(&path, "").expect("Failed to write file");

    taipan_cmd(&temp_dir)
        .arg("ingest")
        .arg("fits")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown catalogue format 'fits'"));
}

#[test]
fn test_cli_ingest_reports_bad_line() {
    let temp_dir = TempDir::new().expect("Failed to create temporary directory");
    let path = temp_dir.path().join("fields.txt");
    fs::write(&path, "id ra dec\n1 10.0 -30.0\n2 ten -30.0\n").expect("Failed to write file");

    taipan_cmd(&temp_dir)
        .arg("ingest")
        .arg("fields")
        .arg(&path)
        .assert()
        .failure()
        .stderr(predicate::str::contains("line 3"));
}
