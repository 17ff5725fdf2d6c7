use super::{Backend, CompletionRequest, LlmClient, ProviderError};
use crate::model::LlmResponse;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::time::Duration;

/// Chat-completions client for OpenAI and OpenAI-compatible backends (Groq).
pub struct OpenAIClient {
    pub backend: Backend,
    pub base_url: String,
    pub api_key: String,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub client: reqwest::Client,
}

impl OpenAIClient {
    pub fn new(backend: Backend, api_key: String) -> Self {
        Self {
            backend,
            base_url: backend.default_base_url().to_string(),
            api_key,
            temperature: None,
            max_tokens: None,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_sampling(mut self, temperature: Option<f32>, max_tokens: Option<u32>) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }

    fn body(&self, req: &CompletionRequest) -> serde_json::Value {
        let mut body = json!({
            "model": req.model,
            "messages": [
                { "role": "system", "content": req.system },
                { "role": "user", "content": req.prompt },
            ],
        });
        if let Some(t) = self.temperature {
            body["temperature"] = json!(t);
        }
        if let Some(m) = self.max_tokens {
            body["max_tokens"] = json!(m);
        }
        body
    }
}

#[async_trait]
impl LlmClient for OpenAIClient {
    async fn complete(&self, req: &CompletionRequest) -> Result<LlmResponse, ProviderError> {
        let url = format!("{}/chat/completions", self.base_url);

        let resp = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&self.body(req))
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            let retry_after = resp
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| parse_retry_after(v, Utc::now()));
            return Err(ProviderError::RateLimited { retry_after });
        }
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_else(|_| status.to_string());
            return Err(ProviderError::Http {
                status: status.as_u16(),
                message,
            });
        }

        let bytes = resp.bytes().await?;
        let json: serde_json::Value =
            serde_json::from_slice(&bytes).map_err(|e| ProviderError::InvalidResponse {
                message: format!("response body is not JSON: {e}"),
            })?;
        let (text, reasoning) = parse_chat_response(&json)?;

        Ok(LlmResponse {
            text,
            reasoning,
            provider: self.backend.as_str().to_string(),
            model: req.model.clone(),
        })
    }

    fn provider_name(&self) -> &'static str {
        self.backend.as_str()
    }
}

/// `Retry-After` is either delta-seconds or an HTTP-date. A date in the past means now.
pub(crate) fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?;
    Some((at.with_timezone(&Utc) - now).to_std().unwrap_or(Duration::ZERO))
}

/// Extracts `choices[0].message.content` and the optional reasoning channel.
pub(crate) fn parse_chat_response(
    json: &serde_json::Value,
) -> Result<(String, Option<String>), ProviderError> {
    let message = json
        .pointer("/choices/0/message")
        .ok_or_else(|| ProviderError::InvalidResponse {
            message: "response missing choices[0].message".into(),
        })?;

    let text = message
        .get("content")
        .and_then(|v| v.as_str())
        .ok_or_else(|| ProviderError::InvalidResponse {
            message: "response missing content".into(),
        })?
        .to_string();

    let reasoning = ["reasoning", "reasoning_content"]
        .iter()
        .find_map(|k| message.get(*k).and_then(|v| v.as_str()))
        .filter(|s| !s.is_empty())
        .map(str::to_string);

    Ok((text, reasoning))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EvalError;
    use crate::judge::{InvokePolicy, JudgeService};
    use crate::model::{Judge, JudgeQuestion};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn parses_content_and_groq_reasoning() {
        let json = json!({
            "choices": [{ "message": {
                "role": "assistant",
                "content": "pass",
                "reasoning": "The answer matches."
            }}]
        });
        let (text, reasoning) = parse_chat_response(&json).unwrap();
        assert_eq!(text, "pass");
        assert_eq!(reasoning.as_deref(), Some("The answer matches."));
    }

    #[test]
    fn missing_reasoning_is_none() {
        let json = json!({ "choices": [{ "message": { "content": "fail", "reasoning_content": "" } }] });
        let (_, reasoning) = parse_chat_response(&json).unwrap();
        assert!(reasoning.is_none());
    }

    #[test]
    fn missing_content_is_permanent() {
        let err = parse_chat_response(&json!({ "choices": [] })).unwrap_err();
        assert!(!err.is_retryable());
    }

    #[test]
    fn retry_after_accepts_seconds_and_dates() {
        let now = DateTime::parse_from_rfc3339("2015-10-21T07:28:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:30 GMT", now),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
    }

    /// Serves every connection with a fixed `200` reply and counts connections.
    async fn serve_fixed(body: &'static str, hits: Arc<AtomicUsize>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut sock, _)) = listener.accept().await {
                hits.fetch_add(1, Ordering::SeqCst);
                read_request(&mut sock).await;
                let reply = format!(
                    "HTTP/1.1 200 OK\r\ncontent-type: text/plain\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                    body.len(),
                    body
                );
                let _ = sock.write_all(reply.as_bytes()).await;
                let _ = sock.shutdown().await;
            }
        });
        format!("http://{addr}")
    }

    async fn read_request(sock: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let Ok(n) = sock.read(&mut chunk).await else { return };
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            let text = String::from_utf8_lossy(&buf);
            let Some(head_end) = text.find("\r\n\r\n") else { continue };
            let len = text[..head_end]
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length").then(|| v.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + len {
                return;
            }
        }
    }

    #[tokio::test]
    async fn non_json_body_fails_once_without_retry() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = serve_fixed("this is not json", hits.clone()).await;
        let client = OpenAIClient::new(Backend::Openai, "k".into()).with_base_url(url);

        let err = client
            .complete(&CompletionRequest {
                model: "gpt-4o".into(),
                system: "grade it".into(),
                prompt: "{}".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::InvalidResponse { .. }), "got {err:?}");
        assert!(!err.is_retryable());

        let svc = JudgeService::new(
            Arc::new(client),
            InvokePolicy {
                base_backoff: Duration::ZERO,
                ..Default::default()
            },
        );
        let err = svc
            .invoke(
                &Judge::new("j", "gpt-4o", "p"),
                &JudgeQuestion {
                    question_text: "q".into(),
                    answer: serde_json::Value::Null,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, EvalError::Invocation { attempts: 1, .. }), "got {err:?}");
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn body_carries_system_prompt() {
        let client = OpenAIClient::new(Backend::Groq, "k".into()).with_sampling(Some(0.0), None);
        let body = client.body(&CompletionRequest {
            model: "llama-3.1-8b-instant".into(),
            system: "grade it".into(),
            prompt: "{}".into(),
        });
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "grade it");
        assert_eq!(body["temperature"], 0.0);
        assert!(body.get("max_tokens").is_none());
        assert_eq!(client.base_url, "https://api.groq.com/openai/v1");
    }
}
