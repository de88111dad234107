//! Smoke tests -- verify the binary runs and key subcommands work.

use assert_cmd::Command;

#[test]
fn test_cli_help() {
    Command::cargo_bin("wayguard")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("safe-zone alerts"));
}

#[test]
fn test_cli_version() {
    Command::cargo_bin("wayguard")
        .unwrap()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("wayguard"));
}

#[test]
fn test_serve_subcommand_exists() {
    Command::cargo_bin("wayguard")
        .unwrap()
        .args(["serve", "--help"])
        .assert()
        .success();
}

#[test]
fn test_code_prints_six_characters() {
    let out = Command::cargo_bin("wayguard")
        .unwrap()
        .arg("code")
        .env_remove("WAYGUARD_CONFIG")
        .output()
        .unwrap();
    assert!(out.status.success());
    let code = String::from_utf8(out.stdout).unwrap();
    assert_eq!(code.trim().len(), 6);
}

#[test]
fn test_evaluate_from_stdin_json() {
    let input = r#"{
        "current": {"latitude": 0.0, "longitude": 0.0, "timestampMillis": 300000},
        "history": [
            {"latitude": 0.0, "longitude": 0.0, "timestampMillis": 0},
            {"latitude": 0.0, "longitude": 0.0, "timestampMillis": 299000}
        ],
        "inactivityThresholdMinutes": 5
    }"#;

    Command::cargo_bin("wayguard")
        .unwrap()
        .args(["evaluate", "--json"])
        .env_remove("WAYGUARD_CONFIG")
        .write_stdin(input)
        .assert()
        .success()
        .stdout(predicates::str::contains("\"inactivityDurationMinutes\": 5"))
        .stdout(predicates::str::contains("\"anomalyDetected\": true"));
}

#[test]
fn test_evaluate_rejects_bad_threshold() {
    let input = r#"{
        "current": {"latitude": 0.0, "longitude": 0.0, "timestampMillis": 0},
        "inactivityThresholdMinutes": 0
    }"#;

    Command::cargo_bin("wayguard")
        .unwrap()
        .arg("evaluate")
        .env_remove("WAYGUARD_CONFIG")
        .write_stdin(input)
        .assert()
        .failure()
        .stderr(predicates::str::contains("inactivity threshold"));
}

#[test]
fn test_config_prints_defaults() {
    Command::cargo_bin("wayguard")
        .unwrap()
        .arg("config")
        .env_remove("WAYGUARD_CONFIG")
        .assert()
        .success()
        .stdout(predicates::str::contains("[detection]"))
        .stdout(predicates::str::contains("poll_interval_secs = 5"));
}

#[test]
fn test_config_path_from_environment() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    std::io::Write::write_all(&mut file, b"[monitor]\npoll_interval_secs = 9\n").unwrap();

    Command::cargo_bin("wayguard")
        .unwrap()
        .arg("config")
        .env("WAYGUARD_CONFIG", file.path())
        .assert()
        .success()
        .stdout(predicates::str::contains("poll_interval_secs = 9"));
}

#[test]
fn test_missing_config_from_environment_fails() {
    Command::cargo_bin("wayguard")
        .unwrap()
        .arg("config")
        .env("WAYGUARD_CONFIG", "/nonexistent/wayguard.toml")
        .assert()
        .failure()
        .stderr(predicates::str::contains("failed to read config file"));
}
