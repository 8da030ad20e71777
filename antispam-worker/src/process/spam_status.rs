//! Prior spam score left by an upstream filter.

use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use super::email::Email;

/// Header carrying the upstream filter verdict (SpamAssassin style).
pub const SPAM_STATUS_HEADER: &str = "X-Spam-Status";

static HITS_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"hits=(-?[\d.]+)").expect("Invalid hits pattern"));

/// Extract `hits=<float>` from the spam status header.
///
/// Best effort: an absent header, a missing pattern, or an unparseable
/// number all yield `0.0`. The value is only logged for comparison.
pub fn prior_spam_score(email: &Email) -> f64 {
    parse_hits(email.header(SPAM_STATUS_HEADER))
}

fn parse_hits(value: &str) -> f64 {
    let Some(captures) = HITS_PATTERN.captures(value) else {
        return 0.0;
    };

    match captures[1].parse::<f64>() {
        Ok(hits) => hits,
        Err(e) => {
            warn!(raw_value = &captures[1], error = %e, "spam_status_hits_invalid");
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn email(raw: &str) -> Email {
        Email::parse(raw.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_positive_hits() {
        let email = email("X-Spam-Status: Yes, hits=5.5 required=5.0 tests=TEST\r\n\r\nBody");
        assert_eq!(prior_spam_score(&email), 5.5);
    }

    #[test]
    fn test_negative_hits() {
        let email = email("X-Spam-Status: No, hits=-2.0 required=5.0 tests=TEST\r\n\r\nBody");
        assert_eq!(prior_spam_score(&email), -2.0);
    }

    #[test]
    fn test_no_hits_is_zero() {
        let email = email("X-Spam-Status: Unknown\r\n\r\nBody");
        assert_eq!(prior_spam_score(&email), 0.0);
    }

    #[test]
    fn test_missing_header_is_zero() {
        let email = email("Subject: Clean\r\n\r\nBody");
        assert_eq!(prior_spam_score(&email), 0.0);
    }

    #[test]
    fn test_malformed_number_is_zero() {
        assert_eq!(parse_hits("Yes, hits=1.2.3 required=5.0"), 0.0);
    }
}
