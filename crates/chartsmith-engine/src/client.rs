use std::thread;
use std::time::Duration;

use chartsmith_contracts::RecommendError;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Value};
use tracing::warn;

pub const DEFAULT_API_BASE: &str = "https://api.groq.com/openai/v1";
pub const DEFAULT_MODEL: &str = "llama-3.3-70b-versatile";
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2000;
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Explicit credentials and model selection, sourced once at process start
/// and passed in. The client itself never reads the environment.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub api_base: String,
    pub model: String,
}

impl ClientConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
            model: DEFAULT_MODEL.to_string(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }
}

pub trait TextCompletion {
    fn complete(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, RecommendError>;
}

/// OpenAI-style chat-completions client over blocking HTTP.
pub struct ChatCompletionsClient {
    http: HttpClient,
    config: ClientConfig,
}

impl ChatCompletionsClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: HttpClient::new(),
            config,
        }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.api_base.trim_end_matches('/')
        )
    }
}

impl TextCompletion for ChatCompletionsClient {
    fn complete(
        &self,
        prompt: &str,
        temperature: f64,
        max_tokens: u32,
    ) -> Result<String, RecommendError> {
        let endpoint = self.endpoint();
        let payload = json!({
            "model": self.config.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature,
            "max_tokens": max_tokens,
        });
        let response = self
            .http
            .post(&endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&payload)
            .send()
            .map_err(|err| RecommendError::Network(format!("request to {endpoint} failed: {err}")))?;
        let parsed = response_json_or_error(&response_label(&endpoint), response)?;

        parsed
            .get("choices")
            .and_then(Value::as_array)
            .and_then(|choices| choices.first())
            .and_then(|choice| choice.get("message"))
            .and_then(|message| message.get("content"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                RecommendError::Network("completion response missing message content".to_string())
            })
    }
}

/// Blocking retry wrapper around a single completion call. Errors whose
/// text mentions rate limiting (case-insensitive "rate", "limit", or the
/// code 429) back off `2^(attempt+1)` seconds and try again while attempts
/// remain; everything else surfaces immediately.
pub fn complete_with_retry(
    provider: &dyn TextCompletion,
    prompt: &str,
    temperature: f64,
    max_tokens: u32,
    max_retries: u32,
) -> Result<String, RecommendError> {
    retry_with_sleeper(
        provider,
        prompt,
        temperature,
        max_tokens,
        max_retries,
        &mut |delay| thread::sleep(delay),
    )
}

pub(crate) fn retry_with_sleeper(
    provider: &dyn TextCompletion,
    prompt: &str,
    temperature: f64,
    max_tokens: u32,
    max_retries: u32,
    sleep: &mut dyn FnMut(Duration),
) -> Result<String, RecommendError> {
    let attempts = max_retries.max(1);
    for attempt in 0..attempts {
        match provider.complete(prompt, temperature, max_tokens) {
            Ok(text) => return Ok(text),
            Err(err) => {
                let last_attempt = attempt + 1 == attempts;
                if is_rate_limited(&err.to_string()) && !last_attempt {
                    let wait = Duration::from_secs(1u64 << (attempt + 1));
                    warn!("rate limit hit, waiting {}s before retry", wait.as_secs());
                    sleep(wait);
                    continue;
                }
                return Err(err);
            }
        }
    }
    Err(RecommendError::Network("retries exhausted".to_string()))
}

pub fn is_rate_limited(message: &str) -> bool {
    let lowered = message.to_lowercase();
    lowered.contains("rate") || lowered.contains("limit") || lowered.contains("429")
}

fn response_label(endpoint: &str) -> String {
    format!("completion endpoint {endpoint}")
}

fn response_json_or_error(label: &str, response: HttpResponse) -> Result<Value, RecommendError> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .map_err(|err| RecommendError::Network(format!("{label} body read failed: {err}")))?;
    if !status.is_success() {
        return Err(RecommendError::Network(format!(
            "{label} request failed ({code}): {}",
            truncate_text(&body, 512)
        )));
    }
    serde_json::from_str(&body)
        .map_err(|err| RecommendError::Network(format!("{label} returned invalid JSON: {err}")))
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}
