//! Gemini `generateContent` client with model fallback.

use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com";

/// Built-in model candidates, in priority order.
pub const DEFAULT_MODELS: &[&str] = &["gemini-3-flash", "gemini-2.5-flash", "gemini-2.0-flash"];

/// Substrings of an error message that mean "try the next model".
const RETRYABLE_KEYWORDS: &[&str] = &[
    "404",
    "not found",
    "unsupported",
    "invalid model",
    "resource has been exhausted",
    "quota",
    "permission denied",
];

/// Error type for oracle requests. Never escapes the oracle implementation.
#[derive(Debug)]
pub enum OracleError {
    /// HTTP client could not be built
    Client(String),
    /// Network error
    Network(String),
    /// HTTP error with status code
    Http(u16, String),
    /// Response body or model answer could not be parsed
    Parse(String),
    /// The model answered with no text
    EmptyResponse,
    /// Every model candidate failed
    Exhausted { tried: Vec<String>, last: String },
}

impl OracleError {
    /// Failures that another model might not have.
    pub fn is_retryable(&self) -> bool {
        let message = match self {
            OracleError::Http(status, _) if matches!(*status, 403 | 404 | 429) => return true,
            OracleError::Http(_, body) => body,
            OracleError::Network(msg) => msg,
            _ => return false,
        };
        let message = message.to_lowercase();
        RETRYABLE_KEYWORDS.iter().any(|k| message.contains(k))
    }
}

impl std::fmt::Display for OracleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OracleError::Client(msg) => write!(f, "HTTP client error: {}", msg),
            OracleError::Network(msg) => write!(f, "Network error: {}", msg),
            OracleError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            OracleError::Parse(msg) => write!(f, "Parse error: {}", msg),
            OracleError::EmptyResponse => write!(f, "model returned no text"),
            OracleError::Exhausted { tried, last } => {
                write!(f, "all models failed (tried: {}): {}", tried.join(", "), last)
            }
        }
    }
}

impl std::error::Error for OracleError {}

/// Connection and model settings.
#[derive(Debug, Clone)]
pub struct GeminiOptions {
    /// Primary model; `None` uses the first built-in candidate.
    pub model: Option<String>,
    pub fallback_models: Vec<String>,
    pub endpoint: String,
    /// Fixed pause after every remote call.
    pub throttle: Duration,
    pub timeout: Duration,
}

impl Default for GeminiOptions {
    fn default() -> Self {
        Self {
            model: None,
            fallback_models: Vec::new(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            throttle: Duration::from_millis(100),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Ordered, de-duplicated model list: primary, explicit fallbacks, then the
/// built-in defaults.
pub fn model_candidates(primary: Option<&str>, fallbacks: &[String]) -> Vec<String> {
    let primary = primary
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or(DEFAULT_MODELS[0]);

    let mut candidates: Vec<String> = Vec::new();
    let all = std::iter::once(primary)
        .chain(fallbacks.iter().map(|m| m.trim()))
        .chain(DEFAULT_MODELS.iter().copied());
    for name in all {
        if !name.is_empty() && !candidates.iter().any(|c| c == name) {
            candidates.push(name.to_string());
        }
    }
    candidates
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

/// Blocking Gemini client. The model that last answered stays active.
pub struct GeminiClient {
    http: reqwest::blocking::Client,
    api_base: String,
    api_key: String,
    models: Vec<String>,
    active: Mutex<usize>,
    throttle: Duration,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, options: &GeminiOptions) -> Result<Self, OracleError> {
        let http = reqwest::blocking::Client::builder()
            .user_agent(format!("sheetmerge/{}", env!("CARGO_PKG_VERSION")))
            .timeout(options.timeout)
            .build()
            .map_err(|e| OracleError::Client(e.to_string()))?;

        let models = model_candidates(options.model.as_deref(), &options.fallback_models);
        log::info!("Gemini oracle enabled, model {}", models[0]);

        Ok(Self {
            http,
            api_base: options.endpoint.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            models,
            active: Mutex::new(0),
            throttle: options.throttle,
        })
    }

    /// Point the client at another server (tests, proxies).
    pub fn with_base_url(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }

    pub fn models(&self) -> &[String] {
        &self.models
    }

    pub fn active_model(&self) -> &str {
        &self.models[self.active_index()]
    }

    /// Send one prompt, walking the model list on retryable failures.
    pub fn generate(&self, prompt: &str) -> Result<String, OracleError> {
        let start = self.active_index();
        let order = std::iter::once(start).chain((0..self.models.len()).filter(|&i| i != start));

        let mut tried = Vec::new();
        let mut last = None;
        for idx in order {
            let model = &self.models[idx];
            tried.push(model.clone());
            let result = self.call_model(model, prompt);
            thread::sleep(self.throttle);
            match result {
                Ok(text) => {
                    if idx != start {
                        log::info!("Gemini model switched to {}", model);
                        *self.active.lock().unwrap_or_else(|p| p.into_inner()) = idx;
                    }
                    return Ok(text);
                }
                Err(e) if e.is_retryable() => {
                    log::warn!("model '{}' failed, trying next: {}", model, e);
                    last = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(OracleError::Exhausted {
            tried,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }

    // ── Internal helpers ────────────────────────────────────────────

    fn active_index(&self) -> usize {
        *self.active.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn call_model(&self, model: &str, prompt: &str) -> Result<String, OracleError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.api_base, model);
        let body = serde_json::json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
        });

        let response = self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .map_err(|e| OracleError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let body = response.text().unwrap_or_default();
            return Err(OracleError::Http(status, body));
        }

        let parsed: GenerateResponse = response
            .json()
            .map_err(|e| OracleError::Parse(e.to_string()))?;

        let text = parsed
            .candidates
            .into_iter()
            .filter_map(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .filter(|t| !t.is_empty())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .find(|t| !t.is_empty())
            .ok_or(OracleError::EmptyResponse)?;
        Ok(text)
    }
}
