use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::TempDir;

fn docaudit(workspace: &Path) -> Command {
    let mut cmd = Command::cargo_bin("docaudit").unwrap();
    cmd.arg("--path").arg(workspace).env_remove("RUST_LOG");
    cmd
}

fn write_snapshot(dir: &Path, name: &str, path: &str, codes: &[&str]) {
    let children: Vec<_> = codes
        .iter()
        .map(|code| serde_json::json!({ "type": "code", "lang": "python", "value": code }))
        .collect();
    let snapshot = serde_json::json!({
        "type": "page",
        "data": {
            "page_id": format!("manual/docsworker/master/{}", path),
            "ast": { "type": "root", "children": children }
        }
    });
    std::fs::write(dir.join(name), snapshot.to_string()).unwrap();
}

fn audit_args(pages: &Path) -> Vec<String> {
    vec![
        "audit".to_string(),
        pages.display().to_string(),
        "--project".to_string(),
        "manual".to_string(),
        "--site-url".to_string(),
        "https://docs.example.com/manual".to_string(),
        "--no-llm".to_string(),
    ]
}

#[test]
fn test_init_creates_workspace() {
    let temp = TempDir::new().unwrap();

    docaudit(temp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("✓ Initialized docaudit"));

    assert!(temp.path().join(".docaudit/config.toml").exists());
    assert!(temp.path().join(".docaudit/docaudit.db").exists());

    docaudit(temp.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"));

    docaudit(temp.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn test_audit_requires_init() {
    let temp = TempDir::new().unwrap();
    let pages = temp.path().join("pages");
    std::fs::create_dir(&pages).unwrap();

    docaudit(temp.path())
        .args(audit_args(&pages))
        .assert()
        .failure()
        .stderr(predicate::str::contains("not initialized"));
}

#[test]
fn test_audit_then_status() {
    let temp = TempDir::new().unwrap();
    let pages = temp.path().join("pages");
    std::fs::create_dir(&pages).unwrap();
    write_snapshot(&pages, "insert.json", "crud/insert", &["x = 1", "print(x)"]);
    write_snapshot(&pages, "update.json", "crud/update", &["y = 2"]);

    docaudit(temp.path()).arg("init").assert().success();

    docaudit(temp.path())
        .args(audit_args(&pages))
        .assert()
        .success()
        .stdout(predicate::str::contains("Audit of manual (master)"))
        .stdout(predicate::str::contains("New: 2  Updated: 0  Removed: 0"))
        .stdout(predicate::str::contains("✓ No issues"));

    // Second run sees no changes
    let output = docaudit(temp.path())
        .args(["-o", "json"])
        .args(audit_args(&pages))
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["counters"]["unchanged_examples"], 3);
    assert_eq!(report["changes"].as_array().unwrap().len(), 0);

    std::fs::remove_file(pages.join("update.json")).unwrap();
    docaudit(temp.path())
        .args(audit_args(&pages))
        .assert()
        .success()
        .stdout(predicate::str::contains("New: 0  Updated: 0  Removed: 1"));

    docaudit(temp.path())
        .args(["status", "--project", "manual"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pages: 1"))
        .stdout(predicate::str::contains("Removed pages: 1"))
        .stdout(predicate::str::contains("Audit runs: 3"));
}

#[test]
fn test_audit_rejects_bad_threshold() {
    let temp = TempDir::new().unwrap();
    let pages = temp.path().join("pages");
    std::fs::create_dir(&pages).unwrap();
    docaudit(temp.path()).arg("init").assert().success();

    docaudit(temp.path())
        .args(audit_args(&pages))
        .args(["--threshold", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid fuzzy-match threshold"));
}

#[test]
fn test_compare() {
    let temp = TempDir::new().unwrap();
    let original = temp.path().join("original.txt");
    let candidate = temp.path().join("candidate.txt");
    std::fs::write(&original, "1234567890\n").unwrap();
    std::fs::write(&candidate, "123456789\n").unwrap();

    docaudit(temp.path())
        .arg("compare")
        .arg(&original)
        .arg(&candidate)
        .assert()
        .success()
        .stdout(predicate::str::contains("Changed: 10.0%"))
        .stdout(predicate::str::contains("✓ Counts as an update"));

    docaudit(temp.path())
        .arg("compare")
        .arg(&original)
        .arg(&candidate)
        .args(["--threshold", "5"])
        .assert()
        .success()
        .stdout(predicate::str::contains("⚠ Counts as a new example"));
}

#[test]
fn test_config_show_and_reset() {
    let temp = TempDir::new().unwrap();

    docaudit(temp.path())
        .args(["config", "--show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Fuzzy threshold: 30"));

    docaudit(temp.path())
        .args(["config", "--reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("reset to defaults"));
    assert!(temp.path().join(".docaudit/config.toml").exists());
}
