use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, error};

use crate::config::LlmConfig;

/// One conversation turn in OpenAI chat format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<CompletionChoice>,
}

#[derive(Deserialize)]
struct CompletionChoice {
    message: ChatMessage,
}

/// Client for an OpenAI-compatible chat completion endpoint.
#[derive(Clone)]
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    pub fn new(config: LlmConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client for the LLM")?;
        Ok(LlmClient { http, config })
    }

    /// Run a completion constrained to a JSON object and parse the reply.
    pub async fn complete_json(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<Value> {
        let content = self.send(system_prompt, messages, true).await?;
        extract_json_object(&content)
    }

    /// Run a plain-text completion.
    pub async fn complete_text(&self, system_prompt: &str, messages: &[ChatMessage]) -> Result<String> {
        self.send(system_prompt, messages, false).await
    }

    async fn send(&self, system_prompt: &str, messages: &[ChatMessage], json_mode: bool) -> Result<String> {
        let mut conversation = Vec::with_capacity(messages.len() + 1);
        conversation.push(ChatMessage::system(system_prompt));
        conversation.extend_from_slice(messages);

        let mut body = serde_json::json!({
            "model": self.config.model,
            "temperature": self.config.temperature,
            "messages": conversation,
        });
        if json_mode {
            body["response_format"] = serde_json::json!({"type": "json_object"});
        }

        let mut request = self
            .http
            .post(format!("{}/chat/completions", self.config.api_base))
            .json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .context("Failed to reach the LLM endpoint")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            error!("[LLM] Completion failed {}: {}", status, error_text);
            return Err(anyhow!("LLM returned error {}: {}", status, error_text));
        }

        let completion: CompletionResponse = response
            .json()
            .await
            .context("Failed to parse LLM completion response")?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("LLM returned no choices"))?;

        debug!("[LLM] Reply: {}", content);
        Ok(content)
    }
}

/// Parse a JSON object out of model text, tolerating markdown fences and
/// prose around the object.
pub fn extract_json_object(text: &str) -> Result<Value> {
    let trimmed = text.trim();
    let unfenced = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .map(|rest| rest.trim_end().trim_end_matches("```").trim())
        .unwrap_or(trimmed);

    if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(unfenced) {
        return Ok(value);
    }

    let start = unfenced.find('{');
    let end = unfenced.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => serde_json::from_str::<Value>(&unfenced[start..=end])
            .ok()
            .filter(|v| v.is_object())
            .ok_or_else(|| anyhow!("LLM reply is not a JSON object")),
        _ => Err(anyhow!("LLM reply contains no JSON object")),
    }
}
