//! Input record parsing
//!
//! One input line is `;`-separated:
//!
//! ```text
//! ID;mm/dd/yyyy;First Middle Last;street;city;state;zip;phone|phone;email|email
//! ```
//!
//! Lines with fewer than [`MIN_FIELDS`] fields are dropped without error.

use chrono::{Datelike, Local, NaiveDate};
use enrich_common::types::{Address, Person};
use regex::Regex;
use std::sync::LazyLock;

/// Minimum number of `;`-separated fields in a usable line.
pub const MIN_FIELDS: usize = 9;

/// Date format of the date-of-birth field.
pub const DOB_FORMAT: &str = "%m/%d/%Y";

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Parse one input line, computing age against today's local date.
pub fn parse_record(line: &str) -> Option<Person> {
    parse_record_at(line, Local::now().date_naive())
}

/// Parse one input line, computing age as of `today`.
pub fn parse_record_at(line: &str, today: NaiveDate) -> Option<Person> {
    let fields: Vec<&str> = line.trim().split(';').map(str::trim).collect();
    if fields.len() < MIN_FIELDS {
        return None;
    }

    let (first_name, middle_name, last_name) = split_name(fields[2]);

    let dob = (!fields[1].is_empty()).then(|| fields[1].to_string());
    let age = dob.as_deref().and_then(|d| age_on(d, today));

    let address = Address::new(
        fields[3],
        format!("{}, {} {}", fields[4], fields[5], fields[6]),
    );

    Some(Person {
        id: fields[0].to_string(),
        first_name,
        middle_name,
        last_name,
        dob,
        age,
        address,
        phone: extract_phones(fields[7]).into_iter().next(),
        email: extract_emails(fields[8]).into_iter().next(),
    })
}

/// First token is the first name, last token the last name, anything in
/// between is the middle name.
fn split_name(full: &str) -> (Option<String>, Option<String>, Option<String>) {
    let tokens: Vec<&str> = full.split_whitespace().collect();

    let first = tokens.first().map(|t| t.to_string());
    let last = tokens.last().map(|t| t.to_string());
    let middle = (tokens.len() > 2).then(|| tokens[1..tokens.len() - 1].join(" "));

    (first, middle, last)
}

/// All phone candidates that are exactly 10 digits once non-digits are stripped.
pub fn extract_phones(field: &str) -> Vec<String> {
    candidates(field)
        .map(|c| c.chars().filter(char::is_ascii_digit).collect::<String>())
        .filter(|digits| digits.len() == 10)
        .collect()
}

/// All email candidates shaped like `local@domain.tld`.
pub fn extract_emails(field: &str) -> Vec<String> {
    candidates(field)
        .filter(|c| EMAIL_PATTERN.is_match(c))
        .map(str::to_string)
        .collect()
}

fn candidates(field: &str) -> impl Iterator<Item = &str> {
    field
        .split(['|', ';'])
        .map(str::trim)
        .filter(|c| !c.is_empty())
}

/// Whole years between a mm/dd/yyyy date and `today`.
///
/// Returns `None` when the date does not parse.
pub fn age_on(dob: &str, today: NaiveDate) -> Option<i32> {
    let born = NaiveDate::parse_from_str(dob.trim(), DOB_FORMAT).ok()?;

    let mut age = today.year() - born.year();
    if (today.month(), today.day()) < (born.month(), born.day()) {
        age -= 1;
    }
    Some(age)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str =
        "ID1;01/15/1980;John Middle Doe;123 Main St;Springfield;IL;62704;217-555-0101|;john@doe.com|;";

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_parse_sample_line() {
        let person = parse_record_at(SAMPLE, date(2024, 6, 1)).unwrap();

        assert_eq!(person.id, "ID1");
        assert_eq!(person.first_name.as_deref(), Some("John"));
        assert_eq!(person.middle_name.as_deref(), Some("Middle"));
        assert_eq!(person.last_name.as_deref(), Some("Doe"));
        assert_eq!(person.dob.as_deref(), Some("01/15/1980"));
        assert_eq!(person.age, Some(44));
        assert_eq!(person.address.line1, "123 Main St");
        assert_eq!(person.address.line2, "Springfield, IL 62704");
        assert_eq!(person.phone.as_deref(), Some("2175550101"));
        assert_eq!(person.email.as_deref(), Some("john@doe.com"));
    }

    #[test]
    fn test_parse_sample_line_today() {
        let person = parse_record(SAMPLE).unwrap();
        let today = Local::now().date_naive();
        let expected = today.year() - 1980 - i32::from((today.month(), today.day()) < (1, 15));
        assert_eq!(person.age, Some(expected));
    }

    #[test]
    fn test_short_lines_are_dropped() {
        assert!(parse_record("").is_none());
        assert!(parse_record("ID1;01/15/1980;John Doe").is_none());
        assert!(parse_record("a;b;c;d;e;f;g;h").is_none());
        assert!(parse_record("a;b;c;d;e;f;g;h;i").is_some());
    }

    #[test]
    fn test_name_splitting() {
        let today = date(2024, 6, 1);
        let line = |name: &str| format!("X;01/01/1990;{};s;c;ST;00000;;", name);

        let two = parse_record_at(&line("Jane Roe"), today).unwrap();
        assert_eq!(two.first_name.as_deref(), Some("Jane"));
        assert_eq!(two.middle_name, None);
        assert_eq!(two.last_name.as_deref(), Some("Roe"));

        let many = parse_record_at(&line("Mary  Ann   Lee Smith"), today).unwrap();
        assert_eq!(many.middle_name.as_deref(), Some("Ann Lee"));
        assert_eq!(many.last_name.as_deref(), Some("Smith"));

        let one = parse_record_at(&line("Cher"), today).unwrap();
        assert_eq!(one.first_name.as_deref(), Some("Cher"));
        assert_eq!(one.middle_name, None);

        let none = parse_record_at(&line(""), today).unwrap();
        assert_eq!(none.first_name, None);
        assert_eq!(none.last_name, None);
    }

    #[test]
    fn test_first_accepted_phone_wins() {
        assert_eq!(
            extract_phones("555-0101|(217) 555-0101|312.555.0199"),
            vec!["2175550101", "3125550199"]
        );

        let line = "X;01/01/1990;A B;s;c;ST;00000;123|+1 217 555 0101|3125550199;";
        let person = parse_record_at(line, date(2024, 6, 1)).unwrap();
        assert_eq!(person.phone.as_deref(), Some("3125550199"));
    }

    #[test]
    fn test_email_candidates() {
        assert_eq!(
            extract_emails("not-an-email| a@b.co |x@y|spaced out@mail.com|ok@mail.org"),
            vec!["a@b.co", "ok@mail.org"]
        );
    }

    #[test]
    fn test_age_accounts_for_birthday_not_reached() {
        assert_eq!(age_on("06/02/1990", date(2024, 6, 1)), Some(33));
        assert_eq!(age_on("06/01/1990", date(2024, 6, 1)), Some(34));
        assert_eq!(age_on("05/31/1990", date(2024, 6, 1)), Some(34));
    }

    #[test]
    fn test_unparseable_dob_keeps_raw_value() {
        let line = "X;13/01/2000;A B;s;c;ST;00000;;";
        let person = parse_record_at(line, date(2024, 6, 1)).unwrap();
        assert_eq!(person.dob.as_deref(), Some("13/01/2000"));
        assert_eq!(person.age, None);
    }
}
