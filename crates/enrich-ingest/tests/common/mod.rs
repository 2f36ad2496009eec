//! Shared fixtures for the ingest integration tests

#![allow(dead_code)]

use enrich_common::types::Credential;
use enrich_ingest::client::ClientSettings;
use enrich_ingest::pipeline::{EnrichmentPipeline, PipelineSettings};
use enrich_ingest::sink::OutputSink;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::MockServer;

pub const ENRICH_PATH: &str = "/Contact/Enrich";

pub const SAMPLE_LINE: &str =
    "ID1;01/15/1980;John Middle Doe;123 Main St;Springfield;IL;62704;217-555-0101|;john@doe.com|;";

/// Output line for [`SAMPLE_LINE`] merged with [`enriched_response`].
pub const SAMPLE_OUTPUT: &str = "ID1;01/15/1980;John Middle Doe;9 Elm St;Chicago;IL;60601;\
(312) 555-0199|2175550101;jd@gmail.com|john@doe.com";

pub fn enriched_response() -> serde_json::Value {
    serde_json::json!({
        "person": {
            "name": { "firstName": "John", "lastName": "Doe" },
            "emails": [{ "email": "jd@gmail.com", "isValidated": true }],
            "phones": [{ "number": "(312) 555-0199", "type": "mobile" }],
            "addresses": [{
                "street": "9 Elm St",
                "city": "Chicago",
                "state": "IL",
                "zip": "60601"
            }]
        },
        "message": "",
        "isError": false
    })
}

/// A valid input line for person number `n`
pub fn person_line(n: usize) -> String {
    format!(
        "P{n};03/04/1975;Person Number{n};{n} Oak Ave;Dayton;OH;45402;937-555-{:04};p{n}@example.com",
        n % 10_000
    )
}

pub fn settings(server: &MockServer) -> PipelineSettings {
    PipelineSettings {
        client: ClientSettings {
            endpoint: format!("{}{}", server.uri(), ENRICH_PATH),
            timeout: Duration::from_secs(5),
            ..ClientSettings::default()
        },
        ..PipelineSettings::default()
    }
}

pub fn credentials(keys: &[&str]) -> Vec<Credential> {
    keys.iter()
        .map(|key| Credential::new(*key, format!("{}-secret", key)))
        .collect()
}

pub async fn sink(dir: &TempDir) -> (Arc<OutputSink>, PathBuf) {
    let path = dir.path().join("output.txt");
    let sink = OutputSink::open(&path).await.expect("open output sink");
    (Arc::new(sink), path)
}

pub async fn pipeline(
    settings: PipelineSettings,
    keys: &[&str],
    dir: &TempDir,
) -> (EnrichmentPipeline, PathBuf) {
    let (sink, path) = sink(dir).await;
    let pipeline = EnrichmentPipeline::new(0, settings, Arc::from(credentials(keys)), sink)
        .expect("build pipeline");
    (pipeline, path)
}

pub fn output_lines(path: &PathBuf) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}
