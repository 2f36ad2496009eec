//! HTTP client for the contact enrichment API
//!
//! One client is bound to one credential. Rotating credentials means
//! building a new client.

use enrich_common::types::{Credential, EnrichmentRequest, EnrichmentResponse};
use enrich_common::{EnrichError, Result};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::time::Duration;

// ============================================================================
// API Client Constants
// ============================================================================

/// Default enrichment endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://devapi.endato.com/Contact/Enrich";

/// Default operation-tag header value.
pub const DEFAULT_SEARCH_TYPE: &str = "DevAPIContactEnrich";

/// Default per-request timeout in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Header carrying the API key.
pub const KEY_HEADER: &str = "galaxy-ap-name";

/// Header carrying the API password.
pub const PASSWORD_HEADER: &str = "galaxy-ap-password";

/// Header carrying the operation tag.
pub const SEARCH_TYPE_HEADER: &str = "galaxy-search-type";

/// Longest error body kept in an [`EnrichError::Http`].
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Endpoint, operation tag and timeout shared by every client of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub endpoint: String,
    pub search_type: String,
    pub timeout: Duration,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            search_type: DEFAULT_SEARCH_TYPE.to_string(),
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
        }
    }
}

/// Parsed response plus the raw JSON body it came from
#[derive(Debug, Clone)]
pub struct EnrichmentReply {
    pub raw: serde_json::Value,
    pub response: EnrichmentResponse,
}

/// API client for the enrichment endpoint
#[derive(Debug, Clone)]
pub struct EnrichmentClient {
    client: Client,
    endpoint: String,
    key: String,
}

impl EnrichmentClient {
    /// Create a client whose every request carries `credential`
    pub fn new(credential: &Credential, settings: &ClientSettings) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(KEY_HEADER, header_value(&credential.key, "API key")?);

        let mut password = header_value(&credential.secret, "API password")?;
        password.set_sensitive(true);
        headers.insert(PASSWORD_HEADER, password);

        headers.insert(
            SEARCH_TYPE_HEADER,
            header_value(&settings.search_type, "search type")?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(settings.timeout)
            .build()
            .map_err(|e| EnrichError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: settings.endpoint.clone(),
            key: credential.key.clone(),
        })
    }

    /// Issue one enrichment call
    pub async fn enrich(&self, request: &EnrichmentRequest) -> Result<EnrichmentReply> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| EnrichError::Network(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EnrichError::Network(e.to_string()))?;

        if !status.is_success() {
            return Err(EnrichError::Http {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let raw: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| EnrichError::MalformedResponse(format!("invalid JSON: {}", e)))?;
        let response: EnrichmentResponse = serde_json::from_value(raw.clone())
            .map_err(|e| EnrichError::MalformedResponse(e.to_string()))?;

        Ok(EnrichmentReply { raw, response })
    }

    /// API key this client sends
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn header_value(value: &str, what: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| EnrichError::config(format!("{} contains characters not allowed in a header", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use enrich_common::types::{Address, Person};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn settings(server: &MockServer) -> ClientSettings {
        ClientSettings {
            endpoint: format!("{}/Contact/Enrich", server.uri()),
            timeout: Duration::from_secs(5),
            ..ClientSettings::default()
        }
    }

    fn request() -> EnrichmentRequest {
        EnrichmentRequest::from_person(&Person {
            id: "ID1".to_string(),
            first_name: Some("John".to_string()),
            middle_name: None,
            last_name: Some("Doe".to_string()),
            dob: Some("01/15/1980".to_string()),
            age: Some(44),
            address: Address::new("123 Main St", "Springfield, IL 62704"),
            phone: Some("2175550101".to_string()),
            email: None,
        })
    }

    #[test]
    fn test_client_creation() {
        let client =
            EnrichmentClient::new(&Credential::new("key", "secret"), &ClientSettings::default())
                .unwrap();
        assert_eq!(client.key(), "key");
        assert_eq!(client.endpoint(), DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_rejects_unsendable_credentials() {
        let result = EnrichmentClient::new(
            &Credential::new("key", "line\nbreak"),
            &ClientSettings::default(),
        );
        assert!(matches!(result, Err(EnrichError::Config(_))));
    }

    #[tokio::test]
    async fn test_sends_required_headers_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/Contact/Enrich"))
            .and(header("accept", "application/json"))
            .and(header("content-type", "application/json"))
            .and(header(KEY_HEADER, "key"))
            .and(header(PASSWORD_HEADER, "secret"))
            .and(header(SEARCH_TYPE_HEADER, DEFAULT_SEARCH_TYPE))
            .and(body_partial_json(serde_json::json!({
                "firstName": "John",
                "lastName": "Doe",
                "phone": "217-555-0101",
                "address": { "addressLine1": "123 Main St" }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "person": { "emails": [{ "email": "john@doe.com" }] }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client =
            EnrichmentClient::new(&Credential::new("key", "secret"), &settings(&server)).unwrap();
        let reply = client.enrich(&request()).await.unwrap();

        assert_eq!(reply.response.person.email_addresses(), vec!["john@doe.com"]);
        assert_eq!(reply.raw["person"]["emails"][0]["email"], "john@doe.com");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("busy"))
            .mount(&server)
            .await;

        let client =
            EnrichmentClient::new(&Credential::new("key", "secret"), &settings(&server)).unwrap();
        match client.enrich(&request()).await {
            Err(EnrichError::Http { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "busy");
            },
            other => panic!("expected HTTP error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_response_without_person_is_malformed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "error": "none" })),
            )
            .mount(&server)
            .await;

        let client =
            EnrichmentClient::new(&Credential::new("key", "secret"), &settings(&server)).unwrap();
        let result = client.enrich(&request()).await;
        assert!(matches!(result, Err(EnrichError::MalformedResponse(_))));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_network_error() {
        let settings = ClientSettings {
            endpoint: "http://127.0.0.1:9/Contact/Enrich".to_string(),
            timeout: Duration::from_secs(2),
            ..ClientSettings::default()
        };
        let client = EnrichmentClient::new(&Credential::new("key", "secret"), &settings).unwrap();
        let result = client.enrich(&request()).await;
        assert!(matches!(result, Err(EnrichError::Network(_))));
    }
}
