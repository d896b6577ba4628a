//! CLI integration tests for the storefront command-line interface.
//!
//! These tests cover help output, argument parsing and the offline commands.
//! Every invocation points the config and data directories at a temp dir and
//! the API at an unroutable address, so no server is needed.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the storefront binary, isolated in `dir`.
fn storefront(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("storefront").unwrap();
    cmd.current_dir(dir.path())
        .env("STOREFRONT_CONFIG_DIR", dir.path().join("config"))
        .env("STOREFRONT_DATA_DIR", dir.path().join("data"))
        .env("STOREFRONT_BASE_URL", "http://127.0.0.1:9/api/v1")
        .env_remove("STOREFRONT_PASSWORD")
        .env_remove("STOREFRONT_TIMEOUT_SECS");
    cmd
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("storefront API"))
        .stdout(predicate::str::contains("auth"))
        .stdout(predicate::str::contains("request"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("storefront"));
}

#[test]
fn test_auth_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["auth", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("login"))
        .stdout(predicate::str::contains("logout"))
        .stdout(predicate::str::contains("status"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .arg("checkout")
        .assert()
        .failure()
        .stderr(predicate::str::contains("unrecognized subcommand"));
}

#[test]
fn test_request_requires_method_and_path() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["request", "GET"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("PATH"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Offline Commands
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_status_without_session() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in"));
}

#[test]
fn test_status_json_reports_base_url_override() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["--json", "--base-url", "http://127.0.0.1:9/shop", "auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"authenticated\": false"))
        .stdout(predicate::str::contains("http://127.0.0.1:9/shop/"));
}

#[test]
fn test_status_reads_stored_session() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(
        data.join("session.json"),
        r#"{
            "accessToken": "a1",
            "refreshToken": "r1",
            "user": "{\"username\":\"mei\"}",
            "issuedAt": "2026-01-01T00:00:00Z"
        }"#,
    )
    .unwrap();

    storefront(&dir)
        .args(["auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed in as: mei"));
}

#[test]
fn test_logout_clears_session_when_server_unreachable() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    let session_file = data.join("session.json");
    std::fs::write(
        &session_file,
        r#"{"accessToken": "a1", "refreshToken": "r1"}"#,
    )
    .unwrap();

    storefront(&dir)
        .args(["auth", "logout"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .success()
        .stdout(predicate::str::contains("Signed out."));

    assert!(!session_file.exists());
}

#[test]
fn test_logout_recovers_from_corrupt_session_file() {
    let dir = TempDir::new().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("session.json"), "{truncated").unwrap();

    storefront(&dir)
        .args(["auth", "logout"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No stored session."));

    storefront(&dir)
        .args(["auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Not signed in"));
}

#[test]
fn test_project_config_is_applied() {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("storefront.toml"),
        "[session]\nfile_name = \"other.json\"\n",
    )
    .unwrap();

    storefront(&dir)
        .args(["--json", "auth", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("other.json"));
}

#[test]
fn test_request_rejects_invalid_body() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["request", "POST", "orders", "--body", "{oops"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not valid JSON"));
}

#[test]
fn test_request_reports_network_failure() {
    let dir = TempDir::new().unwrap();
    storefront(&dir)
        .args(["request", "GET", "products"])
        .timeout(std::time::Duration::from_secs(30))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Network connection error"));
}
