//! LLM-backed scorer over an OpenAI-compatible chat completions API.
//!
//! Works against OpenAI itself and against Ollama's `/v1` endpoint. The
//! model is asked for a JSON object with a `SpamScore` between 0 and 10 and
//! a one-line `Reason`.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use super::{Score, Scorer};
use crate::classifier::ClassificationTask;
use crate::error::{Error, Result};

/// Sampling temperature; low so repeated runs agree.
const TEMPERATURE: f64 = 0.1;

/// Supported model providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Provider {
    OpenAi,
    #[default]
    Ollama,
}

impl Provider {
    /// Base URL used when none is configured.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAi => "https://api.openai.com/v1",
            Provider::Ollama => "http://localhost:11434/v1",
        }
    }
}

impl FromStr for Provider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Provider::OpenAi),
            "ollama" => Ok(Provider::Ollama),
            other => Err(Error::Classification(format!("provider {other} not found"))),
        }
    }
}

/// Connection settings for [`LlmScorer`].
#[derive(Debug, Clone, PartialEq)]
pub struct LlmConfig {
    pub provider: Provider,
    pub model_id: String,
    /// Overrides the provider's default base URL
    pub base_url: Option<String>,
    pub api_key: Option<String>,
    /// Per-request timeout. `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl LlmConfig {
    /// Full chat completions URL.
    pub fn endpoint(&self) -> String {
        let base = self
            .base_url
            .as_deref()
            .unwrap_or_else(|| self.provider.default_base_url());
        format!("{}/chat/completions", base.trim_end_matches('/'))
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f64,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct Verdict {
    #[serde(rename = "SpamScore")]
    spam_score: Value,
    #[serde(rename = "Reason", default)]
    reason: String,
}

/// Scores messages by asking a chat model.
pub struct LlmScorer {
    client: Client,
    endpoint: String,
    model_id: String,
    api_key: Option<String>,
    timeout: Option<Duration>,
}

impl LlmScorer {
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| Error::Classification(format!("error creating LLM client: {e}")))?;

        info!(
            provider = ?config.provider,
            model_id = %config.model_id,
            endpoint = %config.endpoint(),
            "llm_scorer_created"
        );

        Ok(Self {
            client,
            endpoint: config.endpoint(),
            model_id: config.model_id.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
        })
    }
}

#[async_trait]
impl Scorer for LlmScorer {
    async fn score(&self, task: &ClassificationTask) -> Result<Score> {
        let request = ChatRequest {
            model: &self.model_id,
            temperature: TEMPERATURE,
            messages: [ChatMessage {
                role: "user",
                content: build_prompt(task),
            }],
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Classification(format!("LLM request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Classification(format!(
                "LLM returned status {}: {}",
                status.as_u16(),
                preview(&body)
            )));
        }

        let completion: ChatResponse = response
            .json()
            .await
            .map_err(|e| Error::Classification(format!("invalid LLM response: {e}")))?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| Error::Classification("empty response from model".to_string()))?;

        debug!(sender = %task.sender, content_length = content.len(), "llm_response_received");

        parse_verdict(&content)
    }
}

/// Build the classification prompt for one message.
pub fn build_prompt(task: &ClassificationTask) -> String {
    format!(
        r#"You are an email spam classifier. Analyze the email below and assign it a numeric spam score.
Focus on the content and intent of the email, and check whether it comes from a well-known domain or company.
Do not classify as spam mail from well-known organizations such as github.com or meetup.com, or from well-known providers such as hotmail.com or gmail.com.
Check any links in the body and judge whether they are legitimate.
HTML tags and images have already been removed.
Reply only with a JSON object in this exact shape:

```json
{{
    "SpamScore": "spam score as a number between 0 and 10 written as a string; below 5 is not spam",
    "Reason": "one short sentence explaining the score"
}}
```

Email:
{}"#,
        task.render()
    )
}

/// Parse a model reply into a [`Score`].
///
/// Accepts the JSON object bare or inside a fenced code block, with
/// `SpamScore` as either a string or a number.
pub fn parse_verdict(content: &str) -> Result<Score> {
    let (start, end) = match (content.find('{'), content.rfind('}')) {
        (Some(start), Some(end)) if start < end => (start, end),
        _ => {
            return Err(Error::Classification(format!(
                "no JSON object in LLM result: {}",
                preview(content)
            )))
        }
    };

    let verdict: Verdict = serde_json::from_str(&content[start..=end])
        .map_err(|e| Error::Classification(format!("error parsing LLM result: {e}")))?;

    let score = match &verdict.spam_score {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| {
        Error::Classification(format!(
            "error converting score to float: {}",
            verdict.spam_score
        ))
    })?;

    Ok(Score {
        score,
        reason: verdict.reason,
    })
}

/// First 200 characters of a reply, for error messages.
fn preview(text: &str) -> String {
    text.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> ClassificationTask {
        ClassificationTask {
            sender: "user@example.com".to_string(),
            from: "<user@example.com>".to_string(),
            subject: "Cheap pills".to_string(),
            body: "Buy now ".to_string(),
        }
    }

    #[test]
    fn test_parse_fenced_verdict() {
        let content = "```json\n{\n        \"SpamScore\": \"10\",\n        \"Reason\": \"SPAM\"\n}```";

        let score = parse_verdict(content).unwrap();
        assert_eq!(score.score, 10.0);
        assert_eq!(score.reason, "SPAM");
    }

    #[test]
    fn test_parse_numeric_score() {
        let score = parse_verdict(r#"{"SpamScore": 2.5, "Reason": "newsletter"}"#).unwrap();
        assert_eq!(score.score, 2.5);
    }

    #[test]
    fn test_parse_missing_reason_defaults_empty() {
        let score = parse_verdict(r#"{"SpamScore": "0"}"#).unwrap();
        assert_eq!(score.score, 0.0);
        assert_eq!(score.reason, "");
    }

    #[test]
    fn test_parse_rejects_non_numeric_score() {
        let result = parse_verdict(r#"{"SpamScore": "high", "Reason": "?"}"#);
        assert!(matches!(result, Err(Error::Classification(_))));
    }

    #[test]
    fn test_parse_rejects_missing_json() {
        assert!(matches!(parse_verdict("I think it is spam."), Err(Error::Classification(_))));
        assert!(matches!(parse_verdict(""), Err(Error::Classification(_))));
    }

    #[test]
    fn test_prompt_embeds_message() {
        let prompt = build_prompt(&task());
        assert!(prompt.contains("FROM: <user@example.com>\nSUBJECT: Cheap pills\n\nBuy now "));
        assert!(prompt.contains("\"SpamScore\""));
    }

    #[test]
    fn test_provider_from_str() {
        assert_eq!("OpenAI".parse::<Provider>().unwrap(), Provider::OpenAi);
        assert_eq!("ollama".parse::<Provider>().unwrap(), Provider::Ollama);
        assert!("bedrock".parse::<Provider>().is_err());
    }

    #[test]
    fn test_endpoint() {
        let mut config = LlmConfig {
            provider: Provider::Ollama,
            model_id: "llama3".to_string(),
            base_url: None,
            api_key: None,
            timeout: None,
        };
        assert_eq!(config.endpoint(), "http://localhost:11434/v1/chat/completions");

        config.base_url = Some("http://gpu-box:8080/v1/".to_string());
        assert_eq!(config.endpoint(), "http://gpu-box:8080/v1/chat/completions");
    }
}
