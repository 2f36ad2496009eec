//! Common types used across the enrichment workspace

use crate::error::EnrichError;
use serde::{Deserialize, Serialize};

// ============================================================================
// Parsed Input Types
// ============================================================================

/// Two-line postal address as read from an input record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Street line, e.g. "123 Main St"
    pub line1: String,

    /// Locality line in the form "city, state zip"
    pub line2: String,
}

impl Address {
    pub fn new(line1: impl Into<String>, line2: impl Into<String>) -> Self {
        Self {
            line1: line1.into(),
            line2: line2.into(),
        }
    }

    /// Split `line2` back into `(city, state, zip)`.
    ///
    /// Missing parts come back as empty strings.
    pub fn locality(&self) -> (String, String, String) {
        let mut halves = self.line2.splitn(2, ',');
        let city = halves.next().unwrap_or_default().trim().to_string();
        let rest = halves.next().unwrap_or_default().trim();

        let mut tokens = rest.split_whitespace();
        let state = tokens.next().unwrap_or_default().to_string();
        let zip = tokens.next().unwrap_or_default().to_string();

        (city, state, zip)
    }
}

/// One person parsed from one input line.
///
/// Immutable once parsed; the enrichment merge produces an [`EnrichedRecord`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    /// Record identifier (field 1), carried through to the output line
    pub id: String,

    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,

    /// Date of birth exactly as given in the input (expected mm/dd/yyyy)
    pub dob: Option<String>,

    /// Age derived from `dob`; `None` when the date does not parse
    pub age: Option<i32>,

    pub address: Address,

    /// First accepted phone candidate, 10 digits
    pub phone: Option<String>,

    /// First accepted email candidate
    pub email: Option<String>,
}

impl Person {
    /// First, middle and last name joined by single spaces.
    pub fn full_name(&self) -> String {
        [&self.first_name, &self.middle_name, &self.last_name]
            .into_iter()
            .flatten()
            .map(|part| part.as_str())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

// ============================================================================
// Credentials
// ============================================================================

/// API key/secret pair used for the enrichment endpoint.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    pub key: String,
    pub secret: String,
}

impl Credential {
    pub fn new(key: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            secret: secret.into(),
        }
    }

    /// Parse a comma-separated list of `key:secret` entries.
    ///
    /// Blank entries are skipped.
    pub fn parse_list(raw: &str) -> Result<Vec<Self>, EnrichError> {
        raw.split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(str::parse)
            .collect()
    }
}

impl std::str::FromStr for Credential {
    type Err = EnrichError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().split_once(':') {
            Some((key, secret)) if !key.trim().is_empty() && !secret.trim().is_empty() => {
                Ok(Self::new(key.trim(), secret.trim()))
            },
            _ => Err(EnrichError::config(
                "credential entries must look like 'key:secret'",
            )),
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("key", &self.key)
            .field("secret", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Enrichment API Wire Types
// ============================================================================

/// Address block of an enrichment request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestAddress {
    pub address_line1: Option<String>,
    pub address_line2: Option<String>,
}

/// Body of `POST /Contact/Enrich`.
///
/// Absent values are sent as explicit JSON nulls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichmentRequest {
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub dob: Option<String>,
    pub age: Option<i32>,
    pub address: RequestAddress,
    pub phone: Option<String>,
    pub email: Option<String>,
}

impl EnrichmentRequest {
    pub fn from_person(person: &Person) -> Self {
        let non_empty = |s: &str| (!s.is_empty()).then(|| s.to_string());

        Self {
            first_name: person.first_name.clone(),
            middle_name: person.middle_name.clone(),
            last_name: person.last_name.clone(),
            dob: person.dob.clone(),
            age: person.age,
            address: RequestAddress {
                address_line1: non_empty(&person.address.line1),
                address_line2: non_empty(&person.address.line2),
            },
            phone: person.phone.as_deref().and_then(format_phone),
            email: person.email.clone(),
        }
    }
}

/// Format a phone number as `###-###-####`.
///
/// Returns `None` unless exactly 10 digits remain after stripping everything else.
pub fn format_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if digits.len() != 10 {
        return None;
    }
    Some(format!("{}-{}-{}", &digits[..3], &digits[3..6], &digits[6..]))
}

/// Successful enrichment response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResponse {
    pub person: ResponsePerson,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePerson {
    #[serde(default)]
    pub emails: Vec<ResponseEmail>,
    #[serde(default)]
    pub phones: Vec<ResponsePhone>,
    #[serde(default)]
    pub addresses: Vec<ResponseAddress>,
}

impl ResponsePerson {
    pub fn email_addresses(&self) -> Vec<String> {
        self.emails
            .iter()
            .filter_map(|e| e.email.clone())
            .filter(|e| !e.is_empty())
            .collect()
    }

    pub fn phone_numbers(&self) -> Vec<String> {
        self.phones
            .iter()
            .filter_map(|p| p.number.clone())
            .filter(|p| !p.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseEmail {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponsePhone {
    #[serde(default)]
    pub number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseAddress {
    #[serde(default)]
    pub street: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub zip: Option<String>,
}

// ============================================================================
// Output Types
// ============================================================================

/// A person merged with the enrichment response, ready for the output sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichedRecord {
    pub id: String,
    pub dob: String,
    pub full_name: String,
    pub street: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    /// Response phones first, then the original phone
    pub phones: Vec<String>,
    /// Response emails first, then the original email
    pub emails: Vec<String>,
}

impl EnrichedRecord {
    /// Merge an enrichment response with the person it was requested for.
    ///
    /// The first response address wins over the input address. Original
    /// phone and email are appended after the response values.
    pub fn merge(response: &ResponsePerson, original: &Person) -> Self {
        let (street, city, state, zip) = match response.addresses.first() {
            Some(addr) => (
                addr.street.clone().unwrap_or_default(),
                addr.city.clone().unwrap_or_default(),
                addr.state.clone().unwrap_or_default(),
                addr.zip.clone().unwrap_or_default(),
            ),
            None => {
                let (city, state, zip) = original.address.locality();
                (original.address.line1.clone(), city, state, zip)
            },
        };

        let mut phones = response.phone_numbers();
        phones.extend(original.phone.iter().cloned());

        let mut emails = response.email_addresses();
        emails.extend(original.email.iter().cloned());

        Self {
            id: original.id.clone(),
            dob: original.dob.clone().unwrap_or_default(),
            full_name: original.full_name(),
            street,
            city,
            state,
            zip,
            phones,
            emails,
        }
    }

    /// Render in the input line format: 9 `;`-separated fields with
    /// `|`-joined phone and email lists.
    pub fn to_line(&self) -> String {
        [
            self.id.as_str(),
            self.dob.as_str(),
            self.full_name.as_str(),
            self.street.as_str(),
            self.city.as_str(),
            self.state.as_str(),
            self.zip.as_str(),
            &self.phones.join("|"),
            &self.emails.join("|"),
        ]
        .join(";")
    }
}
