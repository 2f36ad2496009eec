//! Pre-send validation of parsed records
//!
//! Missing names, phones and emails are allowed; only the date of birth and
//! the derived age are checked.

use enrich_common::types::Person;
use regex::Regex;
use std::sync::LazyLock;

/// Youngest age accepted by the enrichment endpoint.
pub const MIN_AGE: i32 = 1;

/// Oldest age accepted by the enrichment endpoint.
pub const MAX_AGE: i32 = 120;

static DOB_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(0[1-9]|1[0-2])/(0[1-9]|[12]\d|3[01])/(19|20)\d\d$")
        .expect("dob pattern is a valid regex")
});

/// Check a parsed record, returning every problem found.
pub fn validate(person: &Person) -> Result<(), Vec<String>> {
    let mut errors = Vec::new();

    if let Some(dob) = person.dob.as_deref() {
        if !DOB_PATTERN.is_match(dob) {
            errors.push(format!("Dob '{}' must be in mm/dd/yyyy format.", dob));
        }
    }

    if let Some(age) = person.age {
        if !(MIN_AGE..=MAX_AGE).contains(&age) {
            errors.push(format!(
                "Age {} must be a valid number between {} and {}.",
                age, MIN_AGE, MAX_AGE
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
