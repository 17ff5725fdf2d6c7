use crate::model::LlmResponse;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub mod fake;
pub mod openai;

/// A single text-generation request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub system: String,
    pub prompt: String,
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, req: &CompletionRequest) -> Result<LlmResponse, ProviderError>;
    fn provider_name(&self) -> &'static str;
}

/// Provider errors.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("network error: {message}")]
    Network { message: String },

    #[error("rate limited: retry after {retry_after:?}")]
    RateLimited { retry_after: Option<Duration> },

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("invalid response: {message}")]
    InvalidResponse { message: String },

    #[error("configuration error: {message}")]
    Config { message: String },
}

impl ProviderError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network { .. } | Self::RateLimited { .. } | Self::Timeout(_) => true,
            Self::Http { status, .. } => *status >= 500,
            Self::InvalidResponse { .. } | Self::Config { .. } => false,
        }
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::InvalidResponse {
                message: err.to_string(),
            }
        } else if err.is_builder() {
            Self::Config {
                message: err.to_string(),
            }
        } else {
            Self::Network {
                message: err.to_string(),
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    #[default]
    Openai,
    Groq,
}

impl Backend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::Openai),
            "groq" => Some(Self::Groq),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Openai => "openai",
            Self::Groq => "groq",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::Openai => "https://api.openai.com/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
        }
    }

    pub fn default_api_key_env(&self) -> &'static str {
        match self {
            Self::Openai => "OPENAI_API_KEY",
            Self::Groq => "GROQ_API_KEY",
        }
    }

    /// Models offered to operators when creating judges.
    pub fn available_models(&self) -> &'static [&'static str] {
        match self {
            Self::Openai => &["gpt-4.1", "gpt-5", "gpt-5-mini", "gpt-5-nano", "gpt-4o"],
            Self::Groq => &[
                "llama-3.1-8b-instant",
                "llama-3.3-70b-versatile",
                "openai/gpt-oss-120b",
                "openai/gpt-oss-20b",
            ],
        }
    }
}
