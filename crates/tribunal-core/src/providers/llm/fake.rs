use super::{CompletionRequest, LlmClient, ProviderError};
use crate::model::LlmResponse;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

/// Offline client with scripted replies, keyed by model name.
#[derive(Debug, Default)]
pub struct FakeClient {
    fixed_response: Option<String>,
    reasoning: Option<String>,
    by_model: HashMap<String, Result<String, ProviderError>>,
    fail_first: u32,
    fail_with: Option<ProviderError>,
    calls: AtomicU32,
}

impl FakeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, response: impl Into<String>) -> Self {
        self.fixed_response = Some(response.into());
        self
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    /// Reply `response` whenever the request targets `model`.
    pub fn with_model_response(mut self, model: impl Into<String>, response: impl Into<String>) -> Self {
        self.by_model.insert(model.into(), Ok(response.into()));
        self
    }

    /// Fail every request that targets `model`.
    pub fn with_model_error(mut self, model: impl Into<String>, err: ProviderError) -> Self {
        self.by_model.insert(model.into(), Err(err));
        self
    }

    /// Fail the first `n` calls with `err`, then answer normally.
    pub fn failing_first(mut self, n: u32, err: ProviderError) -> Self {
        self.fail_first = n;
        self.fail_with = Some(err);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for FakeClient {
    async fn complete(&self, req: &CompletionRequest) -> Result<LlmResponse, ProviderError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.fail_first {
            if let Some(err) = &self.fail_with {
                return Err(err.clone());
            }
        }

        let text = match self.by_model.get(&req.model) {
            Some(scripted) => scripted.clone()?,
            None => self.fixed_response.clone().unwrap_or_else(|| "pass".to_string()),
        };

        Ok(LlmResponse {
            text,
            reasoning: self.reasoning.clone(),
            provider: "fake".to_string(),
            model: req.model.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        "fake"
    }
}
