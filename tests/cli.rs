//! End-to-end checks of the `ljdump` binary that need no network.

use assert_cmd::Command;
use ljdump::state::{CommentMeta, JournalState, SyncCursor};
use std::path::Path;

fn ljdump(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ljdump").unwrap();
    cmd.current_dir(dir)
        .env_remove("LJDUMP_CONFIG")
        .env_remove("LJDUMP_DUMP_DIR")
        .env_remove("LJDUMP_SERVER")
        .env_remove("LJDUMP_USERNAME")
        .env_remove("LJDUMP_PASSWORD_FILE")
        .env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_commands() {
    let dir = tempfile::tempdir().unwrap();
    let output = ljdump(dir.path()).arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("dump"));
    assert!(stdout.contains("status"));
}

#[test]
fn version_prints_package_version() {
    let dir = tempfile::tempdir().unwrap();
    let output = ljdump(dir.path()).arg("version").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn missing_username_is_a_config_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("empty.json");
    std::fs::write(&config, "{}").unwrap();

    ljdump(dir.path())
        .arg("--config")
        .arg(&config)
        .assert()
        .code(7);
}

#[test]
fn dump_without_password_fails_before_network() {
    let dir = tempfile::tempdir().unwrap();
    let output = ljdump(dir.path())
        .args(["--username", "alice", "--server", "http://127.0.0.1:9", "--json"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(7));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("CONFIG_ERROR"));
    assert!(!dir.path().join("alice").exists());
}

#[test]
fn status_reports_archived_journal() {
    let dir = tempfile::tempdir().unwrap();
    let journal_dir = dir.path().join("alice");
    let mut state = JournalState {
        cursor: SyncCursor::new("2024-03-01 12:00:00"),
        ..JournalState::default()
    };
    state.users.insert(7, "bob".into());
    state.comments.insert(
        41,
        CommentMeta {
            poster_id: 7,
            state: String::new(),
        },
    );
    state.save(&journal_dir).unwrap();

    let output = ljdump(dir.path())
        .args(["--username", "alice", "--journal", "alice", "--journal", "carol"])
        .args(["status", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let journals = value["journals"].as_array().unwrap();
    assert_eq!(journals.len(), 2);
    assert_eq!(journals[0]["journal"], "alice");
    assert_eq!(journals[0]["archived"], true);
    assert_eq!(journals[0]["cursor"], "2024-03-01 12:00:00");
    assert_eq!(journals[0]["comments"], 1);
    assert_eq!(journals[0]["max_comment_id"], 41);
    assert_eq!(journals[1]["archived"], false);
    assert_eq!(value["account"]["pictures"], 0);
}
