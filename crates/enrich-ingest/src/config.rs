//! Configuration management
//!
//! Values come from the environment (optionally via a `.env` file) over the
//! defaults below; command-line flags are applied on top by the binary.

use crate::client::{ClientSettings, DEFAULT_ENDPOINT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_SEARCH_TYPE};
use crate::dispatcher::DEFAULT_TARGET_LOAD;
use crate::pipeline::{PipelineSettings, DEFAULT_MAX_ATTEMPTS};
use crate::throttle::{DEFAULT_ERROR_THRESHOLD, DEFAULT_MAX_CONCURRENCY};
use enrich_common::types::Credential;
use enrich_common::{EnrichError, Result};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

// ============================================================================
// Ingest Configuration Constants
// ============================================================================

/// Default output sink path.
pub const DEFAULT_OUTPUT_PATH: &str = "output.txt";

/// Default base delay between attempts; zero retries immediately.
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 0;

/// Default upper bound on the delay between attempts.
pub const DEFAULT_RETRY_BACKOFF_MAX_MS: u64 = 5_000;

/// Ingest configuration
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Full URL of the enrichment endpoint
    pub endpoint: String,

    /// Ordered credential list shared by every worker
    pub credentials: Vec<Credential>,

    /// Value of the operation-tag header
    pub search_type: String,

    /// Throttle ceiling per worker
    pub max_concurrency: usize,

    /// Failures that shrink a worker's throttle budget
    pub error_threshold: u32,

    /// Attempts per record before it is dropped
    pub max_attempts: u32,

    pub request_timeout_secs: u64,
    pub retry_backoff_ms: u64,
    pub retry_backoff_max_ms: u64,

    /// Host load the worker count is sized for
    pub target_load: f64,

    /// Fixed worker count; sized from host load when unset
    pub workers: Option<usize>,

    pub output_path: PathBuf,

    /// Advance to the next credential whenever a throttle shrinks
    pub rotate_on_shrink: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            credentials: Vec::new(),
            search_type: DEFAULT_SEARCH_TYPE.to_string(),
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            error_threshold: DEFAULT_ERROR_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            retry_backoff_max_ms: DEFAULT_RETRY_BACKOFF_MAX_MS,
            target_load: DEFAULT_TARGET_LOAD,
            workers: None,
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            rotate_on_shrink: false,
        }
    }
}

impl IngestConfig {
    /// Load configuration from `.env`, the environment and defaults
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_env()
    }

    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `ENRICH_ENDPOINT`: enrichment URL
    /// - `ENRICH_CREDENTIALS`: `key:secret[,key:secret...]`
    /// - `ENRICH_SEARCH_TYPE`: operation-tag header value
    /// - `ENRICH_MAX_CONCURRENCY`: throttle ceiling per worker
    /// - `ENRICH_ERROR_THRESHOLD`: failures before the throttle shrinks
    /// - `ENRICH_MAX_ATTEMPTS`: attempts per record
    /// - `ENRICH_TIMEOUT_SECS`: per-request timeout
    /// - `ENRICH_RETRY_BACKOFF_MS` / `ENRICH_RETRY_BACKOFF_MAX_MS`: retry delay
    /// - `ENRICH_TARGET_LOAD`: worker sizing target
    /// - `ENRICH_WORKERS`: fixed worker count
    /// - `ENRICH_OUTPUT`: output sink path
    /// - `ENRICH_ROTATE_ON_SHRINK`: rotate credentials on throttle shrink
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(endpoint) = std::env::var("ENRICH_ENDPOINT") {
            config.endpoint = endpoint;
        }

        if let Ok(raw) = std::env::var("ENRICH_CREDENTIALS") {
            config.credentials = Credential::parse_list(&raw)?;
        }

        if let Ok(search_type) = std::env::var("ENRICH_SEARCH_TYPE") {
            config.search_type = search_type;
        }

        if let Some(value) = env_parse("ENRICH_MAX_CONCURRENCY")? {
            config.max_concurrency = value;
        }

        if let Some(value) = env_parse("ENRICH_ERROR_THRESHOLD")? {
            config.error_threshold = value;
        }

        if let Some(value) = env_parse("ENRICH_MAX_ATTEMPTS")? {
            config.max_attempts = value;
        }

        if let Some(value) = env_parse("ENRICH_TIMEOUT_SECS")? {
            config.request_timeout_secs = value;
        }

        if let Some(value) = env_parse("ENRICH_RETRY_BACKOFF_MS")? {
            config.retry_backoff_ms = value;
        }

        if let Some(value) = env_parse("ENRICH_RETRY_BACKOFF_MAX_MS")? {
            config.retry_backoff_max_ms = value;
        }

        if let Some(value) = env_parse("ENRICH_TARGET_LOAD")? {
            config.target_load = value;
        }

        if let Some(value) = env_parse("ENRICH_WORKERS")? {
            config.workers = Some(value);
        }

        if let Ok(path) = std::env::var("ENRICH_OUTPUT") {
            config.output_path = PathBuf::from(path);
        }

        if let Some(value) = env_parse("ENRICH_ROTATE_ON_SHRINK")? {
            config.rotate_on_shrink = value;
        }

        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.credentials.is_empty() {
            return Err(EnrichError::config(
                "no API credentials configured; set ENRICH_CREDENTIALS to 'key:secret'",
            ));
        }
        if self.max_concurrency == 0 {
            return Err(EnrichError::config("max_concurrency must be at least 1"));
        }
        if self.error_threshold == 0 {
            return Err(EnrichError::config("error_threshold must be at least 1"));
        }
        if self.max_attempts == 0 {
            return Err(EnrichError::config("max_attempts must be at least 1"));
        }
        if self.request_timeout_secs == 0 {
            return Err(EnrichError::config("request_timeout_secs must be at least 1"));
        }
        if !(self.target_load > 0.0 && self.target_load <= 1.0) {
            return Err(EnrichError::config("target_load must be within (0, 1]"));
        }
        if self.workers == Some(0) {
            return Err(EnrichError::config("workers must be at least 1"));
        }
        Ok(())
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            endpoint: self.endpoint.clone(),
            search_type: self.search_type.clone(),
            timeout: Duration::from_secs(self.request_timeout_secs),
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            client: self.client_settings(),
            max_concurrency: self.max_concurrency,
            error_threshold: self.error_threshold,
            max_attempts: self.max_attempts,
            retry_backoff: Duration::from_millis(self.retry_backoff_ms),
            retry_backoff_max: Duration::from_millis(self.retry_backoff_max_ms),
            rotate_on_shrink: self.rotate_on_shrink,
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| EnrichError::config(format!("{} has an invalid value: '{}'", name, raw))),
        Err(_) => Ok(None),
    }
}
