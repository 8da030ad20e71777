//! Configuration module for environment variable parsing.
//!
//! Every setting has a default so a bare environment still yields a usable
//! (if rule-less) configuration.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;

use crate::runner::Rule;
use crate::scoring::{LlmConfig, Provider};

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Senders exempt from classification (addresses, domains, `*.` wildcards)
    pub allowlist: Vec<String>,

    /// Score all eligible messages of a batch at once instead of one by one
    pub concurrency: bool,

    /// Directory holding one watermark file per origin mailbox
    pub uid_files_path: PathBuf,

    /// Mailboxes to monitor
    pub rules: Vec<Rule>,

    /// Scoring model connection
    pub llm: LlmConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            allowlist: Vec::new(),
            concurrency: false,
            uid_files_path: PathBuf::from("."),
            rules: Vec::new(),
            llm: LlmConfig {
                provider: Provider::default(),
                model_id: "llama3".to_string(),
                base_url: None,
                api_key: None,
                timeout: None,
            },
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Config::default();

        Config {
            allowlist: parse_csv("ANTISPAM_ALLOWLIST").unwrap_or_default(),

            concurrency: parse_var("ANTISPAM_CONCURRENCY").unwrap_or(defaults.concurrency),

            uid_files_path: env::var("ANTISPAM_UID_FILES_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.uid_files_path),

            rules: parse_rules("ANTISPAM_RULES"),

            llm: LlmConfig {
                provider: parse_var("LLM_PROVIDER").unwrap_or(defaults.llm.provider),
                model_id: env::var("LLM_MODEL_ID").unwrap_or(defaults.llm.model_id),
                base_url: env::var("LLM_BASE_URL").ok(),
                api_key: env::var("LLM_API_KEY").ok(),
                timeout: parse_var("LLM_TIMEOUT_MS").map(Duration::from_millis),
            },
        }
    }
}

/// Parse a variable with `FromStr`, warning and returning `None` when it is invalid.
fn parse_var<T>(name: &str) -> Option<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(env_var = name, value = %raw, error = %e, "Invalid value, using default");
            None
        }
    }
}

/// Parse a comma-separated list of strings.
fn parse_csv(name: &str) -> Option<Vec<String>> {
    env::var(name).ok().map(|raw| {
        raw.split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    })
}

/// Parse a JSON array of rules.
fn parse_rules(name: &str) -> Vec<Rule> {
    let raw = match env::var(name) {
        Ok(v) => v,
        Err(_) => return Vec::new(),
    };

    match serde_json::from_str(&raw) {
        Ok(rules) => rules,
        Err(e) => {
            warn!(env_var = name, error = %e, "Invalid rules JSON, no rules loaded");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_csv() {
        env::set_var("TEST_ALLOWLIST_CSV", "gmail.com, *.apple.com, ,boss@work.com");
        let result = parse_csv("TEST_ALLOWLIST_CSV");
        assert_eq!(
            result,
            Some(vec![
                "gmail.com".to_string(),
                "*.apple.com".to_string(),
                "boss@work.com".to_string()
            ])
        );
        env::remove_var("TEST_ALLOWLIST_CSV");
    }

    #[test]
    fn test_parse_var_valid_and_invalid() {
        env::set_var("TEST_CONCURRENCY_FLAG", "true");
        assert_eq!(parse_var::<bool>("TEST_CONCURRENCY_FLAG"), Some(true));
        env::set_var("TEST_CONCURRENCY_FLAG", "maybe");
        assert_eq!(parse_var::<bool>("TEST_CONCURRENCY_FLAG"), None);
        env::remove_var("TEST_CONCURRENCY_FLAG");

        assert_eq!(parse_var::<u64>("NONEXISTENT_INTERVAL_VAR"), None);
    }

    #[test]
    fn test_parse_provider() {
        env::set_var("TEST_LLM_PROVIDER", "openai");
        assert_eq!(parse_var::<Provider>("TEST_LLM_PROVIDER"), Some(Provider::OpenAi));
        env::remove_var("TEST_LLM_PROVIDER");
    }

    #[test]
    fn test_parse_rules() {
        env::set_var(
            "TEST_RULES_JSON",
            r#"[
                {"origin": "INBOX", "destination": "Junk", "threshold": 5.0},
                {"origin": "Junk", "destination": "INBOX", "threshold": 2.5, "move_not_spam": true}
            ]"#,
        );
        let rules = parse_rules("TEST_RULES_JSON");
        env::remove_var("TEST_RULES_JSON");

        assert_eq!(rules.len(), 2);
        assert_eq!(rules[0].origin, "INBOX");
        assert!(!rules[0].move_not_spam);
        assert_eq!(rules[1].threshold, 2.5);
        assert!(rules[1].move_not_spam);
    }

    #[test]
    fn test_parse_rules_invalid_json() {
        env::set_var("TEST_RULES_BROKEN", "[{not json");
        assert!(parse_rules("TEST_RULES_BROKEN").is_empty());
        env::remove_var("TEST_RULES_BROKEN");
    }

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert!(!config.concurrency);
        assert_eq!(config.llm.provider, Provider::Ollama);
        assert_eq!(config.llm.timeout, None);
    }
}
