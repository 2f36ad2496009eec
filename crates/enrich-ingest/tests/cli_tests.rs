//! End-to-end tests for the enrich-ingest binary
//!
//! These tests validate:
//! - Missing input handling and exit status
//! - A full run against a mock endpoint
//! - Log sink separation on disk

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const LINE: &str =
    "ID1;01/15/1980;John Middle Doe;123 Main St;Springfield;IL;62704;217-555-0101|;john@doe.com|;";

fn ingest_cmd(log_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("enrich-ingest").unwrap();
    cmd.arg("--log-dir")
        .arg(log_dir.path())
        .env_remove("RUST_LOG")
        .env_remove("LOG_OUTPUT")
        .env_remove("LOG_LEVEL");
    cmd
}

#[test]
fn test_help() {
    let mut cmd = Command::cargo_bin("enrich-ingest").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--workers"))
        .stdout(predicate::str::contains("--output"));
}

#[test]
fn test_missing_input_fails_without_processing() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("output.txt");

    ingest_cmd(&dir)
        .arg(dir.path().join("missing.txt"))
        .arg("--output")
        .arg(&output)
        .env("ENRICH_CREDENTIALS", "key:secret")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("Input file does not exist"));

    assert!(!output.exists());
    let errors = fs::read_to_string(dir.path().join("error_log.json")).unwrap();
    assert!(errors.contains("Input file does not exist"));
}

#[test]
fn test_missing_credentials_is_a_config_error() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.txt");
    fs::write(&input, format!("{}\n", LINE)).unwrap();

    ingest_cmd(&dir)
        .arg(&input)
        .env_remove("ENRICH_CREDENTIALS")
        .env("ENRICH_OUTPUT", dir.path().join("output.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("ENRICH_CREDENTIALS"));
}

#[tokio::test]
async fn test_full_run_against_mock_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/Contact/Enrich"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "person": {
                "emails": [{ "email": "jd@gmail.com" }],
                "phones": [],
                "addresses": []
            }
        })))
        .expect(2)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let input = dir.path().join("input.txt");
    let output = dir.path().join("output.txt");
    fs::write(&input, format!("{}\n{}\nshort;line\n", LINE, LINE.replace("ID1", "ID2"))).unwrap();

    ingest_cmd(&dir)
        .arg(&input)
        .arg("--output")
        .arg(&output)
        .arg("--workers")
        .arg("2")
        .env("ENRICH_ENDPOINT", format!("{}/Contact/Enrich", server.uri()))
        .env("ENRICH_CREDENTIALS", "key:secret")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total lines: 3"))
        .stdout(predicate::str::contains("Total execution time"));

    let mut lines: Vec<String> = fs::read_to_string(&output)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    lines.sort();
    assert_eq!(
        lines,
        vec![
            "ID1;01/15/1980;John Middle Doe;123 Main St;Springfield;IL;62704;2175550101;jd@gmail.com|john@doe.com",
            "ID2;01/15/1980;John Middle Doe;123 Main St;Springfield;IL;62704;2175550101;jd@gmail.com|john@doe.com",
        ]
    );

    let raw = fs::read_to_string(dir.path().join("raw_log.json")).unwrap();
    assert!(raw.contains("jd@gmail.com"));
    let general = fs::read_to_string(dir.path().join("log.json")).unwrap();
    assert!(general.contains("File processing completed"));
    assert!(!general.contains("Enrichment response"));
    let errors = fs::read_to_string(dir.path().join("error_log.json")).unwrap();
    assert!(errors.contains("No valid data parsed from line"));
}
