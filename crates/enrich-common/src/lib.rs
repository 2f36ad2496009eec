//! Enrichment Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging, and error handling for the contact enrichment workspace.
//!
//! # Overview
//!
//! - **Error Handling**: [`EnrichError`] and the [`Result`] alias
//! - **Logging**: operator console plus the general, error and raw-response sinks
//! - **Types**: parsed people, credentials, enriched output records and the
//!   wire shapes of the enrichment API
//!
//! # Example
//!
//! ```no_run
//! use enrich_common::types::{Address, Person};
//!
//! let person = Person {
//!     id: "ID1".to_string(),
//!     first_name: Some("John".to_string()),
//!     middle_name: None,
//!     last_name: Some("Doe".to_string()),
//!     dob: Some("01/15/1980".to_string()),
//!     age: Some(44),
//!     address: Address::new("123 Main St", "Springfield, IL 62704"),
//!     phone: Some("2175550101".to_string()),
//!     email: None,
//! };
//! assert_eq!(person.full_name(), "John Doe");
//! ```

pub mod error;
pub mod logging;
pub mod types;

// Re-export commonly used types
pub use error::{EnrichError, Result};
