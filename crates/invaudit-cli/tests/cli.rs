use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn invaudit(dir: &Path) -> Command {
    let config = dir.join("invaudit.conf");
    if !config.exists() {
        std::fs::write(&config, "{}").unwrap();
    }

    let mut cmd = Command::cargo_bin("invaudit").unwrap();
    cmd.arg("--config").arg(&config).current_dir(dir);
    cmd
}

fn write_invoice(dir: &Path, rate: &str) -> std::path::PathBuf {
    let path = dir.join("invoice.json");
    let json = format!(
        r#"[{{
            "number": 1,
            "text": "Invoice Number: 4062217350\nInvoice Date: 03/14/2024",
            "tables": [{{
                "page": 1,
                "rows": [
                    ["Wearer #", "Wearer", "Item", "Description", "Size", "Type", "Qty", "Rate", "Total"],
                    ["9", "MARIA LOPEZ", "GS0448", "SHIRT WORK LS BTN COTTON", "M", "Rent", "2", "{rate}", "0.70"]
                ]
            }}]
        }}]"#
    );
    std::fs::write(&path, json).unwrap();
    path
}

fn add_shirt(dir: &Path) {
    invaudit(dir)
        .args(["parts", "--db", "parts.db", "add"])
        .args(["--item-code", "gs0448"])
        .args(["--description", "Shirt work ls btn cotton"])
        .args(["--charge-type", "rent"])
        .args(["--price", "0.350"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added"));
}

#[test]
fn test_help_lists_commands() {
    Command::cargo_bin("invaudit")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("batch"))
        .stdout(predicate::str::contains("parts"));
}

#[test]
fn test_config_show_prints_defaults() {
    let dir = TempDir::new().unwrap();
    invaudit(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"tolerance\""))
        .stdout(predicate::str::contains("\"min_text_length\": 100"));
}

#[test]
fn test_config_init_refuses_overwrite() {
    let dir = TempDir::new().unwrap();
    let target = dir.path().join("new-config.json");

    invaudit(dir.path())
        .args(["config", "init", "--output"])
        .arg(&target)
        .assert()
        .success();
    assert!(target.exists());

    invaudit(dir.path())
        .args(["config", "init", "--output"])
        .arg(&target)
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
}

#[test]
fn test_parts_add_and_list() {
    let dir = TempDir::new().unwrap();
    add_shirt(dir.path());

    invaudit(dir.path())
        .args(["parts", "--db", "parts.db", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("GS0448"))
        .stdout(predicate::str::contains("1 parts"));

    // Same key with different spelling is a duplicate
    invaudit(dir.path())
        .args(["parts", "--db", "parts.db", "add"])
        .args(["--item-code", "GS0448"])
        .args(["--description", "SHIRT WORK LS BTN COTTON"])
        .args(["--price", "0.400"])
        .assert()
        .failure();
}

#[test]
fn test_process_passes_known_part() {
    let dir = TempDir::new().unwrap();
    add_shirt(dir.path());
    let invoice = write_invoice(dir.path(), "0.350");

    invaudit(dir.path())
        .args(["process", "--db", "parts.db", "--non-interactive", "--format", "csv"])
        .arg(&invoice)
        .assert()
        .success()
        .stdout(predicate::str::contains("4062217350,2024-03-14"))
        .stdout(predicate::str::contains(",PASSED,"));
}

#[test]
fn test_process_flags_overcharge() {
    let dir = TempDir::new().unwrap();
    add_shirt(dir.path());
    let invoice = write_invoice(dir.path(), "0.400");

    invaudit(dir.path())
        .args(["process", "--db", "parts.db", "--non-interactive", "--format", "text"])
        .arg(&invoice)
        .assert()
        .success()
        .stdout(predicate::str::contains("FAILED"))
        .stdout(predicate::str::contains("difference +0.050"));
}

#[test]
fn test_process_unknown_part_non_interactive() {
    let dir = TempDir::new().unwrap();
    let invoice = write_invoice(dir.path(), "0.350");
    let output = dir.path().join("report.json");

    invaudit(dir.path())
        .args(["process", "--db", "parts.db", "--non-interactive", "--output"])
        .arg(&output)
        .arg(&invoice)
        .assert()
        .success();

    let report = std::fs::read_to_string(&output).unwrap();
    assert!(report.contains("\"UNKNOWN\""));

    invaudit(dir.path())
        .args(["parts", "--db", "parts.db", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No parts"));
}

#[test]
fn test_process_without_terminal_never_adds_parts() {
    let dir = TempDir::new().unwrap();
    let invoice = write_invoice(dir.path(), "9.99");

    invaudit(dir.path())
        .args(["process", "--db", "parts.db", "--format", "csv"])
        .arg(&invoice)
        .write_stdin("")
        .assert()
        .success()
        .stdout(predicate::str::contains(",UNKNOWN,"))
        .stdout(predicate::str::contains(",PASSED,").not());

    invaudit(dir.path())
        .args(["parts", "--db", "parts.db", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No parts"));
}

#[test]
fn test_process_missing_input() {
    let dir = TempDir::new().unwrap();
    invaudit(dir.path())
        .args(["process", "--non-interactive", "missing.pdf"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));
}

#[test]
fn test_batch_writes_summary() {
    let dir = TempDir::new().unwrap();
    add_shirt(dir.path());
    write_invoice(dir.path(), "0.350");
    let out = dir.path().join("reports");

    invaudit(dir.path())
        .args(["batch", "--db", "parts.db", "--summary", "--output-dir"])
        .arg(&out)
        .arg(dir.path().join("*.json").to_string_lossy().to_string())
        .assert()
        .success();

    assert!(out.join("invoice.json").exists());
    let summary = std::fs::read_to_string(out.join("summary.csv")).unwrap();
    assert!(summary.contains("invoice.json,success,4062217350"));
}
