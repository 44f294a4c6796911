//! Purpose: Smoke tests for the `placementd` CLI commands.
//! Role: Validate init-db and outbox behavior plus exit codes end to end.
//! Invariants: Each test works in its own temp directory.

use std::process::Command;

use serde_json::Value;

type TestResult = Result<(), Box<dyn std::error::Error>>;

fn placementd() -> Command {
    Command::new(env!("CARGO_BIN_EXE_placementd"))
}

#[test]
fn init_db_creates_the_database() -> TestResult {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("portal.db");

    let output = placementd().arg("--db").arg(&db).arg("init-db").output()?;

    assert!(output.status.success(), "stderr: {:?}", output.stderr);
    assert!(db.exists());
    let payload: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(payload["ok"], Value::Bool(true));
    Ok(())
}

#[test]
fn init_db_is_idempotent() -> TestResult {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("portal.db");

    let first = placementd().arg("--db").arg(&db).arg("init-db").output()?;
    assert!(first.status.success());
    let second = placementd().arg("--db").arg(&db).arg("init-db").output()?;
    assert!(second.status.success());
    Ok(())
}

#[test]
fn outbox_list_starts_empty() -> TestResult {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("portal.db");

    let output = placementd()
        .arg("--db")
        .arg(&db)
        .args(["outbox", "list"])
        .output()?;

    assert!(output.status.success(), "stderr: {:?}", output.stderr);
    let payload: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(payload["outbox"], Value::Array(Vec::new()));
    Ok(())
}

#[test]
fn outbox_mark_sent_on_missing_entry_exits_not_found() -> TestResult {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("portal.db");

    let output = placementd()
        .arg("--db")
        .arg(&db)
        .args(["outbox", "mark-sent", "42"])
        .output()?;

    assert_eq!(output.status.code(), Some(3));
    let payload: Value = serde_json::from_slice(&output.stderr)?;
    assert_eq!(payload["error"]["kind"], Value::String("NotFound".into()));
    Ok(())
}

#[test]
fn serve_rejects_non_loopback_bind_without_opt_in() -> TestResult {
    let dir = tempfile::tempdir()?;
    let db = dir.path().join("portal.db");

    let output = placementd()
        .arg("--db")
        .arg(&db)
        .args(["serve", "--bind", "0.0.0.0:0"])
        .output()?;

    assert_eq!(output.status.code(), Some(2));
    let payload: Value = serde_json::from_slice(&output.stderr)?;
    assert_eq!(payload["error"]["kind"], Value::String("Usage".into()));
    Ok(())
}
