//! Reporting of returned email addresses
//!
//! Addresses at a small set of consumer mailbox providers are called out
//! separately in the log.

use tracing::info;

/// Mailbox providers whose addresses are reported individually.
pub const WATCHED_DOMAINS: [&str; 5] = [
    "aol.com",
    "gmail.com",
    "outlook.com",
    "hotmail.com",
    "yahoo.com",
];

/// Domain part of an address, lowercased.
pub fn domain_of(email: &str) -> Option<String> {
    let (_, domain) = email.rsplit_once('@')?;
    let domain = domain.trim();
    (!domain.is_empty()).then(|| domain.to_ascii_lowercase())
}

pub fn is_watched(email: &str) -> bool {
    domain_of(email).is_some_and(|d| WATCHED_DOMAINS.contains(&d.as_str()))
}

/// Addresses from `emails` hosted at a watched provider, in input order.
pub fn watched_addresses(emails: &[String]) -> Vec<&str> {
    emails
        .iter()
        .map(String::as_str)
        .filter(|e| is_watched(e))
        .collect()
}

/// Log the addresses returned for `name` and which of them are watched.
pub fn report(worker_id: usize, name: &str, emails: &[String]) {
    info!(
        worker = worker_id,
        name,
        emails = %emails.join(", "),
        "Extracted emails for {}", name
    );

    let watched = watched_addresses(emails);
    if watched.is_empty() {
        info!(worker = worker_id, name, "No watched mailbox addresses for {}", name);
        return;
    }
    for email in watched {
        info!(worker = worker_id, name, email, "Found email: {}", email);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_of() {
        assert_eq!(domain_of("john@Gmail.COM").as_deref(), Some("gmail.com"));
        assert_eq!(domain_of("no-at-sign"), None);
        assert_eq!(domain_of("trailing@"), None);
    }

    #[test]
    fn test_watched_addresses() {
        let emails = vec![
            "a@gmail.com".to_string(),
            "b@company.com".to_string(),
            "c@Yahoo.com".to_string(),
            "d@mail.aol.com".to_string(),
        ];
        assert_eq!(watched_addresses(&emails), vec!["a@gmail.com", "c@Yahoo.com"]);
    }
}
