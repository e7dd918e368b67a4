// src/genai/mod.rs
//
// Client for the text-generation service used to extract and summarize
// invoice data. The client is constructed explicitly and passed into the
// components that need it; there is no shared global instance.

pub mod justification;
pub mod parser;
pub mod regions;
pub mod risk;

use crate::config::ExtractionSection;
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tracing::warn;

/// Anything that can turn a prompt into generated text. The production
/// implementation is `GenAiClient`; tests substitute canned responders.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, Box<dyn std::error::Error>>;
}

/// Ordered pool of API credentials with a round-robin cursor. The client
/// advances the cursor on every transient failure so retries spread across
/// the available keys.
pub struct KeyPool {
    keys: Vec<String>,
    cursor: AtomicUsize,
}

impl KeyPool {
    pub fn new(keys: Vec<String>) -> KeyPool {
        KeyPool {
            keys,
            cursor: AtomicUsize::new(0),
        }
    }

    /// Load keys from numbered environment variables (`PREFIX_1`, `PREFIX_2`,
    /// ...), falling back to the bare `PREFIX` when no numbered key exists.
    pub fn from_env(prefix: &str) -> Result<KeyPool, Box<dyn std::error::Error>> {
        let mut keys = Vec::new();
        for i in 1usize.. {
            match std::env::var(format!("{prefix}_{i}")) {
                Ok(key) => keys.push(key),
                Err(_) => break,
            }
        }
        if keys.is_empty() {
            if let Ok(key) = std::env::var(prefix) {
                keys.push(key);
            }
        }
        if keys.is_empty() {
            return Err(format!(
                "no extraction API keys found: set {prefix} or {prefix}_1, {prefix}_2, ..."
            )
            .into());
        }
        Ok(KeyPool::new(keys))
    }

    pub fn current(&self) -> &str {
        &self.keys[self.cursor.load(Ordering::Relaxed) % self.keys.len()]
    }

    pub fn rotate(&self) {
        self.cursor.fetch_add(1, Ordering::Relaxed);
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

/// Client for an OpenAI-compatible chat completions endpoint with bounded
/// retries, fixed backoff, and key rotation on failure. After exhausting
/// retries it reports terminal unavailability rather than partial data.
pub struct GenAiClient {
    http: Client,
    base_url: String,
    model: String,
    keys: KeyPool,
    max_retries: u32,
    retry_delay: Duration,
}

impl GenAiClient {
    pub fn new(cfg: &ExtractionSection) -> Result<GenAiClient, Box<dyn std::error::Error>> {
        let keys = KeyPool::from_env(&cfg.api_key_env)?;
        Ok(GenAiClient::with_key_pool(cfg, keys))
    }

    pub fn with_key_pool(cfg: &ExtractionSection, keys: KeyPool) -> GenAiClient {
        GenAiClient {
            http: Client::new(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            model: cfg.model.clone(),
            keys,
            max_retries: cfg.max_retries.max(1),
            retry_delay: Duration::from_secs(cfg.retry_delay_secs),
        }
    }

    async fn attempt(&self, prompt: &str) -> Result<String, String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            temperature: 0.0,
        };
        let url = format!("{}/chat/completions", self.base_url);

        let response = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.keys.current()))
            .json(&request)
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(format!("service returned {status}: {body}"));
        }

        let chat: ChatResponse = response
            .json()
            .await
            .map_err(|e| format!("unreadable response body: {e}"))?;
        chat.choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| "empty response from service".to_string())
    }
}

#[async_trait]
impl Generator for GenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String, Box<dyn std::error::Error>> {
        let mut last_error = String::new();
        for attempt in 1..=self.max_retries {
            match self.attempt(prompt).await {
                Ok(text) => return Ok(text),
                Err(e) => {
                    warn!(attempt, keys = self.keys.len(), error = %e, "Generation attempt failed; rotating key");
                    last_error = e;
                    self.keys.rotate();
                    if attempt < self.max_retries {
                        tokio::time::sleep(self.retry_delay).await;
                    }
                }
            }
        }
        Err(format!(
            "extraction service unavailable after {} attempts: {last_error}",
            self.max_retries
        )
        .into())
    }
}

/// Strip markdown code fences the model may wrap around a JSON payload
/// despite instructions.
pub fn strip_code_fences(raw: &str) -> &str {
    raw.trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim()
}

/// Extract the outermost JSON object from a string that may carry
/// surrounding prose.
pub fn extract_json_object(s: &str) -> Result<&str, Box<dyn std::error::Error>> {
    let start = s.find('{').ok_or("no '{' found in generated text")?;
    let end = s.rfind('}').ok_or("no '}' found in generated text")?;
    if end <= start {
        return Err("malformed JSON in generated text".into());
    }
    Ok(&s[start..=end])
}

/// Parse a generated response as JSON after unfencing. A failure here is a
/// parse error on a response we did receive, reported distinctly from
/// service unavailability.
pub fn parse_json_response<T: DeserializeOwned>(raw: &str) -> Result<T, Box<dyn std::error::Error>> {
    let json = extract_json_object(strip_code_fences(raw))?;
    serde_json::from_str(json)
        .map_err(|e| format!("malformed JSON from extraction service: {e}").into())
}
