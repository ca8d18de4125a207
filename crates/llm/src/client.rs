//! OpenAI-compatible JSON-mode chat client.
//!
//! One pooled `reqwest::Client`, one endpoint, `response_format:
//! json_object`. Errors are returned, never retried here: the extractor
//! swallows them and the classifier degrades to nulls, so a retry loop
//! would only add latency to a dying call.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use sl_domain::config::LlmConfig;
use sl_domain::error::{Error, Result};

use crate::JsonCompleter;

#[derive(Debug, Clone)]
pub struct OpenAiCompatClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl OpenAiCompatClient {
    /// Build a client for the extraction/classification model. The API
    /// key is read once from the configured env var.
    pub fn new(cfg: &LlmConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;

        let api_key = std::env::var(&cfg.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            tracing::warn!(env = %cfg.api_key_env, "LLM API key not set");
        }

        Ok(Self {
            http,
            base_url: cfg.base_url.trim_end_matches('/').to_owned(),
            api_key,
            model: cfg.extraction_model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl JsonCompleter for OpenAiCompatClient {
    async fn complete_json(&self, system: &str, user: &str) -> Result<Value> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": 0.0,
            "response_format": { "type": "json_object" },
        });

        let start = Instant::now();
        let mut rb = self.http.post(&url).json(&body);
        if let Some(ref key) = self.api_key {
            rb = rb.bearer_auth(key);
        }

        let resp = rb
            .send()
            .await
            .map_err(|e| Error::Llm(format!("request failed: {e}")))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| Error::Llm(format!("reading response: {e}")))?;

        if !status.is_success() {
            return Err(Error::Llm(format!("HTTP {} - {}", status.as_u16(), text)));
        }

        let json: Value = serde_json::from_str(&text)
            .map_err(|e| Error::Llm(format!("parsing response: {e}")))?;

        let content = json
            .get("choices")
            .and_then(|c| c.get(0))
            .and_then(|c| c.get("message"))
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .ok_or_else(|| Error::Llm("no message content in response".into()))?;

        tracing::debug!(
            model = %self.model,
            duration_ms = start.elapsed().as_millis() as u64,
            "json completion"
        );

        serde_json::from_str(content)
            .map_err(|e| Error::Llm(format!("model returned invalid JSON: {e}: {content}")))
    }
}
