// tests/cli_test.rs
use std::process::Command;
use tempfile::TempDir;

fn deviate() -> Command {
    Command::new(env!("CARGO_BIN_EXE_deviate"))
}

#[test]
fn test_help_lists_sync() {
    let output = deviate().arg("--help").output().expect("run deviate");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("sync"));
    assert!(stdout.contains("--config"));
}

#[test]
fn test_version() {
    let output = deviate().arg("--version").output().expect("run deviate");

    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_sync_outside_repository_exits_with_config_error() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join(".deviate.yaml");
    std::fs::write(&config, "dryRun: true\n").unwrap();

    let output = deviate()
        .arg("--config")
        .arg(&config)
        .arg("sync")
        .env("NO_COLOR", "1")
        .output()
        .expect("run deviate");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("not a git repository"));
}

#[test]
fn test_missing_config_file_exits_with_config_error() {
    let dir = TempDir::new().unwrap();
    git2::Repository::init(dir.path()).unwrap();

    let output = deviate()
        .arg("sync")
        .arg(dir.path())
        .current_dir(dir.path())
        .output()
        .expect("run deviate");

    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("can't be read"));
}
