//! Chat-completion client used by the `ask` flow.
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (OpenAI,
//! DeepSeek, local gateways) selected by configuration. Answer generation
//! is best-effort: callers degrade to showing the retrieved context when
//! the completion call fails.

use std::time::Duration;

use anyhow::{anyhow, bail, Result};

use crate::config::LlmConfig;

pub struct LlmClient {
    model: String,
    base_url: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl LlmClient {
    /// Build a client from configuration.
    ///
    /// Fails if the configured API key environment variable is unset.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| anyhow!("{} environment variable not set", config.api_key_env))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            temperature: config.temperature,
            client,
        })
    }

    /// Send `prompt` as a single user message and return the completion text.
    pub async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [
                {"role": "user", "content": prompt}
            ],
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("chat API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_completion_response(&json)
    }
}

/// Fill the prompt template's `{context}` and `{query}` slots.
pub fn render_prompt(template: &str, context: &str, query: &str) -> String {
    template
        .replace("{context}", context)
        .replace("{query}", query)
}

fn parse_completion_response(json: &serde_json::Value) -> Result<String> {
    json.get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .and_then(|m| m.get("content"))
        .and_then(|c| c.as_str())
        .map(|s| s.trim().to_string())
        .ok_or_else(|| anyhow!("invalid chat response: missing choices[0].message.content"))
}
