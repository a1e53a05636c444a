//! OpenRouter adapter (chat completions for the auto-reply feature).
//!
//! Uses the OpenAI-compatible `chat/completions` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use bulkmod_core::{
    chat::{ChatCompletion, ChatMessage},
    errors::Error,
    Result,
};

pub const OPENROUTER_API_URL: &str = "https://openrouter.ai/api/v1/chat/completions";

const MAX_ATTEMPTS: u32 = 3;
const RETRY_STEP: Duration = Duration::from_secs(2);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct OpenRouterClient {
    api_key: String,
    model: String,
    url: String,
    http: reqwest::Client,
}

impl OpenRouterClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::External(format!("openrouter client build error: {e}")))?;
        Ok(Self {
            api_key: api_key.into(),
            model: model.into(),
            url: OPENROUTER_API_URL.to_string(),
            http,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn payload(&self, messages: &[ChatMessage]) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": messages,
        })
    }

    async fn attempt(&self, body: &serde_json::Value) -> Result<String> {
        let resp = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| Error::External(format!("openrouter request error: {e}")))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "openrouter http {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let v: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| Error::External(format!("openrouter json error: {e}")))?;
        Ok(extract_content(&v))
    }
}

#[async_trait]
impl ChatCompletion for OpenRouterClient {
    /// Up to three attempts with a linear backoff; an exhausted run yields "".
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = self.payload(messages);

        for attempt in 1..=MAX_ATTEMPTS {
            match self.attempt(&body).await {
                Ok(text) if !text.is_empty() => {
                    tracing::debug!(attempt, "openrouter completion ok");
                    return Ok(text);
                }
                Ok(_) => tracing::warn!(attempt, "openrouter returned an empty completion"),
                Err(e) => tracing::warn!(attempt, error = %e, "openrouter attempt failed"),
            }
            if attempt < MAX_ATTEMPTS {
                tokio::time::sleep(RETRY_STEP * attempt).await;
            }
        }

        tracing::warn!(attempts = MAX_ATTEMPTS, "openrouter gave up");
        Ok(String::new())
    }
}

/// `choices[0].message.content`, trimmed; empty when absent.
pub fn extract_content(v: &serde_json::Value) -> String {
    v.get("choices")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|t| t.as_str())
        .unwrap_or("")
        .trim()
        .to_string()
}
