use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiMessage {
    pub role: String,
    pub content: String,
}

impl AiMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AiConfig {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
}

/// Which backend call convention a provider speaks.
///
/// Chosen once when the configuration is loaded; the classification engine
/// only ever sees the resulting `AiProvider` trait object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProviderKind {
    /// `POST /chat/completions` with a bearer token (OpenAI and compatible gateways).
    OpenAi,
    /// `POST /v1/messages` with `x-api-key`.
    Anthropic,
    /// `POST /api/generate` on a local model server.
    Local,
}

impl LlmProviderKind {
    pub fn default_base_url(&self) -> &'static str {
        match self {
            LlmProviderKind::OpenAi => "https://api.openai.com/v1",
            LlmProviderKind::Anthropic => "https://api.anthropic.com",
            LlmProviderKind::Local => "http://localhost:11434",
        }
    }
}

impl fmt::Display for LlmProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LlmProviderKind::OpenAi => "openai",
            LlmProviderKind::Anthropic => "anthropic",
            LlmProviderKind::Local => "local",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for LlmProviderKind {
    type Err = AiError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "openai-compatible" | "openai_compatible" => Ok(LlmProviderKind::OpenAi),
            "anthropic" | "claude" => Ok(LlmProviderKind::Anthropic),
            "local" | "ollama" => Ok(LlmProviderKind::Local),
            other => Err(AiError::UnknownProvider(other.to_string())),
        }
    }
}

/// Response from an AI provider.
#[derive(Debug, Clone, Default)]
pub struct AiProviderResponse {
    /// The main response content from the model.
    pub content: String,
}

/// Errors raised by provider bindings. These never leave the classification
/// engine; they are folded into an `LlmCallResult`.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("API error ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("unexpected response shape: {0}")]
    Parse(String),
    #[error("timed out after {0}s")]
    Timeout(u64),
    #[error("unknown LLM provider '{0}'")]
    UnknownProvider(String),
}

impl From<reqwest::Error> for AiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            AiError::Request(format!("timeout: {}", err))
        } else {
            AiError::Request(err.to_string())
        }
    }
}

/// Uniform outcome of one LLM call, whichever backend served it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LlmCallResult {
    pub success: bool,
    pub response_text: String,
    pub error: Option<String>,
}

impl LlmCallResult {
    pub fn ok(response_text: String) -> Self {
        Self {
            success: true,
            response_text,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            response_text: String::new(),
            error: Some(error.into()),
        }
    }
}
