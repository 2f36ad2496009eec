//! Per-record enrichment pipeline
//!
//! One [`EnrichmentPipeline`] belongs to one worker. It owns the worker's
//! throttle and its position in the credential list, and takes a single
//! input line through parse, validate, enrich (with retries), merge and
//! persist. Every failure is contained in the returned [`RecordOutcome`].

use crate::client::{ClientSettings, EnrichmentClient};
use crate::record::parse_record;
use crate::sink::OutputSink;
use crate::throttle::{Adjustment, Throttle, DEFAULT_ERROR_THRESHOLD, DEFAULT_MAX_CONCURRENCY};
use crate::validation::validate;
use enrich_common::logging::RAW_RESPONSE_TARGET;
use enrich_common::types::{
    Credential, EnrichedRecord, EnrichmentRequest, EnrichmentResponse,
};
use enrich_common::{EnrichError, Result};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Default number of attempts per record.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Knobs for one worker's pipeline
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub client: ClientSettings,
    pub max_concurrency: usize,
    pub error_threshold: u32,
    pub max_attempts: u32,
    /// Base delay before a retry; zero retries immediately
    pub retry_backoff: Duration,
    pub retry_backoff_max: Duration,
    /// Advance to the next credential whenever the throttle shrinks
    pub rotate_on_shrink: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            client: ClientSettings::default(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_backoff: Duration::ZERO,
            retry_backoff_max: Duration::from_secs(5),
            rotate_on_shrink: false,
        }
    }
}

/// What happened to one input line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Enriched and written to the output sink
    Enriched { name: String, emails: Vec<String> },
    /// Too few fields to parse
    ParseDrop,
    /// Failed validation; never sent
    ValidationDrop(Vec<String>),
    /// Every attempt failed; nothing written
    Exhausted { attempts: u32, last_error: String },
    /// Enriched but the output append failed
    WriteFailed(String),
}

/// Credential currently in use and the client bound to it
#[derive(Debug)]
struct ActiveCredential {
    index: usize,
    client: Arc<EnrichmentClient>,
}

pub struct EnrichmentPipeline {
    worker_id: usize,
    settings: PipelineSettings,
    credentials: Arc<[Credential]>,
    active: RwLock<ActiveCredential>,
    throttle: Throttle,
    sink: Arc<OutputSink>,
}

impl EnrichmentPipeline {
    /// Build a pipeline starting at the first credential.
    pub fn new(
        worker_id: usize,
        settings: PipelineSettings,
        credentials: Arc<[Credential]>,
        sink: Arc<OutputSink>,
    ) -> Result<Self> {
        let first = credentials
            .first()
            .ok_or_else(|| EnrichError::config("at least one API credential is required"))?;
        let client = EnrichmentClient::new(first, &settings.client)?;
        let throttle = Throttle::new(settings.max_concurrency, settings.error_threshold);

        Ok(Self {
            worker_id,
            settings,
            credentials,
            active: RwLock::new(ActiveCredential {
                index: 0,
                client: Arc::new(client),
            }),
            throttle,
            sink,
        })
    }

    pub fn worker_id(&self) -> usize {
        self.worker_id
    }

    pub fn throttle(&self) -> &Throttle {
        &self.throttle
    }

    /// Index of the credential new calls are sent with
    pub fn credential_index(&self) -> usize {
        self.active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .index
    }

    fn current_client(&self) -> Arc<EnrichmentClient> {
        let active = self
            .active
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&active.client)
    }

    /// Switch to the next credential in the ring. Calls already in flight
    /// finish with the credential they started with.
    pub fn rotate_credentials(&self) -> Result<usize> {
        let mut active = self
            .active
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let next = (active.index + 1) % self.credentials.len();
        let credential = &self.credentials[next];
        let client = EnrichmentClient::new(credential, &self.settings.client)?;

        active.index = next;
        active.client = Arc::new(client);
        info!(
            worker = self.worker_id,
            index = next,
            key = %credential.key,
            "Switched to API key {}", credential.key
        );
        Ok(next)
    }

    /// Take one input line through the whole pipeline.
    pub async fn process_line(&self, line: &str) -> RecordOutcome {
        let Some(person) = parse_record(line) else {
            warn!(worker = self.worker_id, line, "No valid data parsed from line");
            return RecordOutcome::ParseDrop;
        };

        let name = person.full_name();

        if let Err(reasons) = validate(&person) {
            warn!(
                worker = self.worker_id,
                name = %name,
                errors = %reasons.join(" "),
                "Validation errors for {}", name
            );
            return RecordOutcome::ValidationDrop(reasons);
        }

        info!(worker = self.worker_id, name = %name, "Sending data for {}", name);

        let request = EnrichmentRequest::from_person(&person);
        let response = match self.enrich_with_retries(&request, &name).await {
            Ok(response) => response,
            Err(last_error) => {
                error!(
                    worker = self.worker_id,
                    name = %name,
                    attempts = self.max_attempts(),
                    error = %last_error,
                    "Failed to process {} after {} attempts", name, self.max_attempts()
                );
                return RecordOutcome::Exhausted {
                    attempts: self.max_attempts(),
                    last_error: last_error.to_string(),
                };
            },
        };

        let emails = response.person.email_addresses();
        let record = EnrichedRecord::merge(&response.person, &person);
        if let Err(e) = self.sink.append_line(&record.to_line()).await {
            error!(
                worker = self.worker_id,
                name = %name,
                path = %self.sink.path().display(),
                error = %e,
                "Failed to write enriched record"
            );
            return RecordOutcome::WriteFailed(e.to_string());
        }

        debug!(worker = self.worker_id, name = %name, "Enriched record written");
        RecordOutcome::Enriched { name, emails }
    }

    fn max_attempts(&self) -> u32 {
        self.settings.max_attempts.max(1)
    }

    /// Send `request` until it succeeds or the attempts run out, returning
    /// the last error in the latter case.
    async fn enrich_with_retries(
        &self,
        request: &EnrichmentRequest,
        name: &str,
    ) -> std::result::Result<EnrichmentResponse, EnrichError> {
        let max_attempts = self.max_attempts();
        let mut attempt = 1;

        loop {
            let client = self.current_client();
            let permit = self.throttle.acquire().await;
            let result = client.enrich(request).await;
            let adjustment = permit.release(result.is_ok());
            self.on_adjustment(adjustment);

            match result {
                Ok(reply) => {
                    info!(
                        target: RAW_RESPONSE_TARGET,
                        worker = self.worker_id,
                        name,
                        body = %reply.raw,
                        "Enrichment response for {}", name
                    );
                    return Ok(reply.response);
                },
                Err(e) => {
                    let retries_left = max_attempts - attempt;
                    warn!(
                        worker = self.worker_id,
                        name,
                        attempt,
                        retries_left,
                        key = client.key(),
                        error = %e,
                        "Error processing {}. Retries left: {}", name, retries_left
                    );

                    if retries_left == 0 {
                        return Err(e);
                    }

                    let delay = retry_delay(
                        self.settings.retry_backoff,
                        self.settings.retry_backoff_max,
                        attempt,
                    );
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    attempt += 1;
                },
            }
        }
    }

    fn on_adjustment(&self, adjustment: Adjustment) {
        if let Adjustment::Shrunk(_) = adjustment {
            if self.settings.rotate_on_shrink && self.credentials.len() > 1 {
                if let Err(e) = self.rotate_credentials() {
                    error!(worker = self.worker_id, error = %e, "Failed to rotate API key");
                }
            }
        }
    }
}

/// Delay before retry number `attempt` (1-based): `base * 2^(attempt-1)`,
/// capped at `cap`. A zero base never waits.
pub fn retry_delay(base: Duration, cap: Duration, attempt: u32) -> Duration {
    if base.is_zero() {
        return Duration::ZERO;
    }
    let factor = 1u32 << attempt.saturating_sub(1).min(16);
    base.saturating_mul(factor).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_delay() {
        let base = Duration::from_millis(100);
        let cap = Duration::from_millis(1_000);

        assert_eq!(retry_delay(Duration::ZERO, cap, 3), Duration::ZERO);
        assert_eq!(retry_delay(base, cap, 1), Duration::from_millis(100));
        assert_eq!(retry_delay(base, cap, 2), Duration::from_millis(200));
        assert_eq!(retry_delay(base, cap, 3), Duration::from_millis(400));
        assert_eq!(retry_delay(base, cap, 10), cap);
        assert_eq!(retry_delay(base, cap, u32::MAX), cap);
    }

    #[tokio::test]
    async fn test_requires_a_credential() {
        let dir = tempfile::TempDir::new().unwrap();
        let sink = Arc::new(OutputSink::open(dir.path().join("out.txt")).await.unwrap());
        let credentials: Arc<[Credential]> = Arc::from(Vec::new());

        let result = EnrichmentPipeline::new(0, PipelineSettings::default(), credentials, sink);
        assert!(matches!(result, Err(EnrichError::Config(_))));
    }

    #[tokio::test]
    async fn test_rotation_wraps_around() {
        let dir = tempfile::TempDir::new().unwrap();
        let sink = Arc::new(OutputSink::open(dir.path().join("out.txt")).await.unwrap());
        let credentials: Arc<[Credential]> = Arc::from(vec![
            Credential::new("k1", "s1"),
            Credential::new("k2", "s2"),
            Credential::new("k3", "s3"),
        ]);

        let pipeline =
            EnrichmentPipeline::new(4, PipelineSettings::default(), credentials, sink).unwrap();
        assert_eq!(pipeline.worker_id(), 4);
        assert_eq!(pipeline.credential_index(), 0);
        assert_eq!(pipeline.rotate_credentials().unwrap(), 1);
        assert_eq!(pipeline.rotate_credentials().unwrap(), 2);
        assert_eq!(pipeline.rotate_credentials().unwrap(), 0);
        assert_eq!(pipeline.current_client().key(), "k1");
    }

    #[tokio::test]
    async fn test_unparseable_line_is_dropped() {
        let dir = tempfile::TempDir::new().unwrap();
        let sink = Arc::new(OutputSink::open(dir.path().join("out.txt")).await.unwrap());
        let credentials: Arc<[Credential]> = Arc::from(vec![Credential::new("k1", "s1")]);

        let pipeline =
            EnrichmentPipeline::new(0, PipelineSettings::default(), credentials, sink).unwrap();
        assert_eq!(pipeline.process_line("too;short").await, RecordOutcome::ParseDrop);
        assert_eq!(pipeline.throttle().in_flight(), 0);
    }
}
