//! Sender allow-list matching.
//!
//! Entries take three forms:
//! - a full address (`john.doe@gmail.com`), matched case-insensitively
//! - a bare domain (`hotmail.com`), matched against the sender's domain
//! - a wildcard domain (`*.apple.com`), matching subdomains only; the base
//!   domain `apple.com` must be listed separately to match

use tracing::debug;

/// Whether `email` is exempt from classification under `allowed`.
///
/// An address that does not split into exactly one local part and one
/// domain on `@` never matches.
pub fn is_allowlisted(email: &str, allowed: &[String]) -> bool {
    let mut parts = email.split('@');
    let domain = match (parts.next(), parts.next(), parts.next()) {
        (Some(_), Some(domain), None) => domain.to_lowercase(),
        _ => return false,
    };

    let address = email.to_lowercase();

    let matched = allowed.iter().find(|entry| {
        let entry = entry.to_lowercase();
        if address == entry {
            return true;
        }
        if entry.contains('@') {
            return false;
        }

        match entry.strip_prefix("*.") {
            Some(base) => domain.ends_with(&format!(".{base}")),
            None => domain == entry,
        }
    });

    if let Some(entry) = matched {
        debug!(sender = email, entry = %entry, "allowlist_matched");
    }

    matched.is_some()
}
