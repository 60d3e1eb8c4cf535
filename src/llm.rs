//! Generation Adapter
//!
//! Wraps the text-generation backend behind `TextGenerator`. The pipeline only
//! ever sees `prompt -> Result<String>`, so tests can swap in a scripted
//! generator.

use crate::config::EvalConfig;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

/// Opaque prompt-to-text function. Implementations must not panic; any
/// backend problem is reported as `Err`.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Model identifier reported in the run summary.
    fn model(&self) -> &str;

    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// OpenAI-compatible chat completions client.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmClient {
    pub fn new(config: &EvalConfig) -> Result<Self> {
        let api_key = config.require_api_key()?.to_string();
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }

    async fn call_llm(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": prompt}
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| EvalError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(EvalError::Llm(format!("LLM API error ({}): {}", status, error_text)));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| EvalError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        extract_content(&response_json)
    }
}

#[async_trait]
impl TextGenerator for LlmClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        debug!("LLM request ({} chars)", prompt.len());
        let content = self.call_llm(prompt).await?;
        debug!("LLM response ({} chars)", content.len());
        Ok(content)
    }
}

/// Pull the first choice's message content out of a chat completions payload.
fn extract_content(response_json: &serde_json::Value) -> Result<String> {
    if let Some(error) = response_json.get("error") {
        return Err(EvalError::Llm(format!("LLM API error: {}", error)));
    }

    let choice = response_json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| EvalError::Llm("No choices in LLM response".to_string()))?;

    match choice.get("finish_reason").and_then(|r| r.as_str()) {
        Some("length") => warn!("LLM response was truncated at the token limit"),
        Some("content_filter") => {
            return Err(EvalError::Llm(
                "LLM response was filtered by content policy".to_string(),
            ))
        }
        _ => {}
    }

    let content = choice["message"]["content"]
        .as_str()
        .map(str::trim)
        .ok_or_else(|| EvalError::Llm("No content in LLM response".to_string()))?;

    if content.is_empty() {
        return Err(EvalError::Llm("Empty content in LLM response".to_string()));
    }

    Ok(content.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_content_trims() {
        let payload = json!({
            "choices": [{"message": {"content": "  SELECT 1  "}, "finish_reason": "stop"}]
        });
        assert_eq!(extract_content(&payload).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_extract_content_rejects_empty_and_errors() {
        let empty = json!({"choices": [{"message": {"content": "   "}}]});
        assert!(extract_content(&empty).is_err());

        let api_error = json!({"error": {"message": "rate limited"}});
        assert!(extract_content(&api_error).is_err());

        let no_choices = json!({"choices": []});
        assert!(extract_content(&no_choices).is_err());
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = EvalConfig::default();
        assert!(LlmClient::new(&config).is_err());
    }
}
