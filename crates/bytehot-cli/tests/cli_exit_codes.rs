//! End-to-end exit-code checks for the standalone `bytehot` binary.

use assert_cmd::Command;
use predicates::str::contains;
use tempfile::tempdir;

#[test]
fn start_dry_run_with_valid_config_exits_ok() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("bytehot.yaml");
    let watch_dir = dir.path().join("classes");
    std::fs::create_dir_all(&watch_dir).unwrap();
    std::fs::write(
        &config_path,
        format!(
            "watchPaths:\n  - path: {}\n    patterns: [\"*.class\"]\n    recursive: true\n",
            watch_dir.display()
        ),
    )
    .unwrap();

    Command::cargo_bin("bytehot")
        .unwrap()
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "start",
            "--dry-run",
        ])
        .assert()
        .success();
}

#[test]
fn start_dry_run_with_missing_watch_paths_exits_with_config_error() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("bytehot.yaml");
    std::fs::write(&config_path, "watchPaths: []\n").unwrap();

    Command::cargo_bin("bytehot")
        .unwrap()
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "start",
            "--dry-run",
        ])
        .assert()
        .code(2);
}

#[test]
fn start_dry_run_with_no_config_file_exits_with_config_error() {
    let dir = tempdir().unwrap();

    Command::cargo_bin("bytehot")
        .unwrap()
        .args([
            "--config",
            dir.path().join("does-not-exist.yaml").to_str().unwrap(),
            "start",
            "--dry-run",
        ])
        .assert()
        .code(2);
}

#[test]
fn status_with_no_event_store_reports_not_running() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("bytehot.yaml");
    let watch_dir = dir.path().join("classes");
    std::fs::create_dir_all(&watch_dir).unwrap();
    std::fs::write(
        &config_path,
        format!(
            "watchPaths:\n  - path: {}\n",
            watch_dir.display()
        ),
    )
    .unwrap();

    Command::cargo_bin("bytehot")
        .unwrap()
        .args([
            "--config",
            config_path.to_str().unwrap(),
            "status",
            "--event-store",
            dir.path().join("bytehot-events").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("running: false"));
}

#[test]
fn stop_with_no_running_agent_reports_none_found() {
    let dir = tempdir().unwrap();

    Command::cargo_bin("bytehot")
        .unwrap()
        .args([
            "stop",
            "--event-store",
            dir.path().join("bytehot-events").to_str().unwrap(),
        ])
        .assert()
        .success()
        .stdout(contains("no running agent found"));
}
